//! One-shot status derivation.

use anyhow::{Result, ensure};
use console::style;

use buildrelay_core::registry::box_store::BoxRegistryStore;
use buildrelay_core::registry::memory::MemoryRegistryStore;
use buildrelay_types::config::RelayConfig;
use buildrelay_types::status::{BuildStatus, StatusView};
use buildrelay_types::token::CorrelationToken;

use crate::http::response::StatusResponse;
use crate::state::build_relay;

/// Derive the status of `token` straight from CI and print it.
///
/// Uses a throwaway in-memory registry, so the answer never depends on what
/// a running server has cached.
pub async fn status(config: &RelayConfig, token: &str, json: bool) -> Result<()> {
    ensure!(
        !config.ci.owner.trim().is_empty() && !config.ci.repo.trim().is_empty(),
        "REPO_OWNER and REPO_NAME must be set to query CI"
    );
    let token: CorrelationToken = token.parse().map_err(anyhow::Error::msg)?;

    let relay = build_relay(config, BoxRegistryStore::new(MemoryRegistryStore::new()))?;
    let view = relay.resolve(&token).await;

    if json {
        let body = StatusResponse::new(token.as_str(), view);
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    print_view(&token, &view);
    Ok(())
}

fn print_view(token: &CorrelationToken, view: &StatusView) {
    let status = match view.status {
        BuildStatus::Completed => style(view.status.to_string()).green().bold(),
        BuildStatus::Failed => style(view.status.to_string()).red().bold(),
        BuildStatus::NotFound => style(view.status.to_string()).dim(),
        BuildStatus::Queued | BuildStatus::InProgress => style(view.status.to_string()).yellow(),
    };

    println!();
    println!("  {} {}", style("Token").bold(), style(token).cyan());
    println!("  {} {}", style("Status").bold(), status);
    if let Some(conclusion) = &view.conclusion {
        println!("  {} {}", style("Conclusion").bold(), conclusion);
    }
    if let Some(run_id) = view.run_id {
        let url = view.run_url.as_deref().unwrap_or("");
        println!("  {} {} {}", style("Run").bold(), run_id, style(url).dim());
    }
    if let Some(download_url) = &view.download_url {
        println!("  {} {}", style("Download").bold(), style(download_url).underlined());
    }
    println!();
}
