//! Configuration check command.

use std::path::Path;

use anyhow::{Result, bail};
use console::style;

use buildrelay_infra::config::RelaySecrets;
use buildrelay_types::config::RelayConfig;

/// Validate `config` and print the effective settings. Secrets are only
/// reported as present or missing.
pub fn check(config: &RelayConfig, path: &Path, json: bool) -> Result<()> {
    let secrets = RelaySecrets::from_env();
    let validation = config.validate();
    let has_github_token = secrets.github_token.is_some();

    if json {
        let report = serde_json::json!({
            "config_file": path.display().to_string(),
            "config_file_found": path.exists(),
            "valid": validation.is_ok() && has_github_token,
            "error": validation.as_ref().err(),
            "github_token": has_github_token,
            "upload_token": secrets.upload_token.is_some(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_settings(config, path, has_github_token, secrets.upload_token.is_some());
    }

    if let Err(e) = validation {
        bail!("invalid configuration: {e}");
    }
    if !has_github_token {
        bail!("GITHUB_TOKEN is not set");
    }

    if !json {
        println!("  {} Configuration OK", style("✓").green());
        println!();
    }
    Ok(())
}

fn print_settings(config: &RelayConfig, path: &Path, github_token: bool, upload_token: bool) {
    let present = |set: bool| {
        if set {
            style("set".to_string()).green()
        } else {
            style("missing".to_string()).red()
        }
    };
    let strategies: Vec<String> = config.ci.strategies.iter().map(ToString::to_string).collect();

    println!();
    println!(
        "  {} {}{}",
        style("Config").bold(),
        path.display(),
        if path.exists() { "" } else { " (not found, using defaults)" }
    );
    println!();
    println!("  {}", style("Server").bold().underlined());
    println!("    listen          {}:{}", config.server.host, config.server.port);
    println!("    max body        {} bytes", config.server.max_body_bytes);
    println!("    web dir         {}", config.server.web_dir);
    println!();
    println!("  {}", style("CI").bold().underlined());
    println!("    repository      {}/{}", config.ci.owner, config.ci.repo);
    println!("    api             {}", config.ci.api_base);
    println!("    event type      {}", config.ci.event_type);
    println!("    run window      {}", config.ci.run_window);
    println!("    strategies      {}", strategies.join(", "));
    println!("    release tag     {}", config.ci.release_tag);
    println!("    artifact        {} (*{})", config.ci.artifact_name, config.ci.artifact_extension);
    println!("    GITHUB_TOKEN    {}", present(github_token));
    println!();
    println!("  {}", style("Storage").bold().underlined());
    println!("    upload url      {}", config.storage.upload_url);
    println!(
        "    public url      {}",
        config.storage.public_url.as_deref().unwrap_or("(upload url)")
    );
    println!("    max icon        {} bytes", config.storage.max_icon_bytes);
    println!("    upload token    {}", present(upload_token));
    println!();
    println!("  {}", style("Registry").bold().underlined());
    println!("    backend         {:?}", config.registry.backend);
    println!("    database        {}", config.registry.database_url);
    println!("    fresh window    {}s", config.registry.fresh_token_secs);
    println!();
}
