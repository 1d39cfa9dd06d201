//! Health command - probe the server's /health endpoint

use anyhow::{Context, Result};
use ssemon_client::SseClient;

use crate::output::{OutputContext, OutputFormat};

/// Print the server's health response
pub async fn health(client: &SseClient, ctx: &OutputContext) -> Result<()> {
    let body = client
        .health()
        .await
        .with_context(|| format!("Health check failed for {}", client.base_url()))?;

    match ctx.format {
        OutputFormat::Text => {
            ctx.success(&format!("{} is up", client.base_url()));
            println!("{}", ssemon_client::render::format_payload(&body));
        }
        OutputFormat::Json => println!("{}", body.trim()),
    }

    Ok(())
}
