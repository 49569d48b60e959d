use clap::Args;

use w3s_daemon::http_server::api::client::ApiError;
use w3s_daemon::http_server::api::v0::identity::IdentityRequest;

/// Print the daemon's agent identifier
#[derive(Args, Debug, Clone)]
pub struct Identity;

#[async_trait::async_trait]
impl crate::cli::op::Op for Identity {
    type Error = ApiError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let response = ctx.client.call(IdentityRequest).await?;
        Ok(response.id)
    }
}
