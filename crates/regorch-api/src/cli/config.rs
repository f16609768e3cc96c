//! `regorch config`: print the effective configuration.

use std::path::Path;

use anyhow::Result;
use console::style;
use regorch_types::config::OrchestratorConfig;

/// Credentials are never serialized, so the output is safe to share.
pub fn show_config(config: &OrchestratorConfig, data_dir: &Path, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "data_dir": data_dir.display().to_string(),
            "config": config,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{}", style(format!("# data dir: {}", data_dir.display())).dim());
    let auth = if config.registry.token.is_some() {
        "bearer token"
    } else if config.registry.username.is_some() {
        "basic"
    } else {
        "none"
    };
    println!("{}", style(format!("# registry auth: {auth}")).dim());
    println!();
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
