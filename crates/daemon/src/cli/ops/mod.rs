pub mod daemon;
pub mod health;
pub mod identity;
pub mod keygen;
pub mod retrieve;
pub mod upload;
pub mod version;

pub use daemon::Daemon;
pub use health::Health;
pub use identity::Identity;
pub use keygen::Keygen;
pub use retrieve::Retrieve;
pub use upload::Upload;
pub use version::Version;
