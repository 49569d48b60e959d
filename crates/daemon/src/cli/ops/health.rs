use clap::Args;

#[derive(Args, Debug, Clone)]
pub struct Health;

#[derive(Debug, thiserror::Error)]
pub enum HealthError {
    #[error("Health check failed: {0}")]
    Failed(String),
}

#[async_trait::async_trait]
impl crate::cli::op::Op for Health {
    type Error = HealthError;
    type Output = String;

    async fn execute(&self, ctx: &crate::cli::op::OpContext) -> Result<Self::Output, Self::Error> {
        let base = ctx.client.base_url();
        let client = ctx.client.http_client();

        let mut lines = vec![format!("Daemon ({}):", base)];
        let mut healthy = true;

        for probe in ["livez", "readyz"] {
            let url = format!("{}/_status/{}", base.as_str().trim_end_matches('/'), probe);
            let line = match client.get(&url).send().await {
                Ok(resp) if resp.status().is_success() => format!("  {:<7} OK", probe),
                Ok(resp) => {
                    healthy = false;
                    format!("  {:<7} UNHEALTHY ({})", probe, resp.status())
                }
                Err(_) => {
                    healthy = false;
                    format!("  {:<7} NOT REACHABLE", probe)
                }
            };
            lines.push(line);
        }

        if healthy {
            Ok(lines.join("\n"))
        } else {
            Err(HealthError::Failed(lines.join("\n")))
        }
    }
}
