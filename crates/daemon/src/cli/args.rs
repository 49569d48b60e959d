pub use clap::Parser;

use url::Url;

#[derive(Parser, Debug)]
#[command(name = "w3s")]
#[command(about = "Upload files to content-addressed storage and fetch them back, verified")]
pub struct Args {
    /// Address of a running daemon
    #[arg(long, global = true, env = "W3S_REMOTE", default_value = "http://localhost:3001")]
    pub remote: Url,

    #[command(subcommand)]
    pub command: crate::Command,
}
