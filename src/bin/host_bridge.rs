//! Headless host bridge binary for stdin/stdout JSON communication.
//!
//! Loads the configuration, runs an initial discovery pass, then serves
//! command envelopes from stdin until it closes.
//!
//! All tracing/diagnostic output goes to stderr so that stdout remains a
//! clean JSON protocol channel.

use anyhow::Context;
use dragnet::admin::AdminApi;
use dragnet::config::DragnetConfig;
use dragnet::host::stdio::run_stdio_bridge;
use std::path::PathBuf;

/// Config file read when `DRAGNET_CONFIG` is unset.
const DEFAULT_CONFIG_FILE: &str = "dragnet.toml";

fn load_config() -> anyhow::Result<DragnetConfig> {
    let path = match std::env::var_os("DRAGNET_CONFIG") {
        Some(path) => PathBuf::from(path),
        None => {
            let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
            if !fallback.exists() {
                tracing::info!("no {DEFAULT_CONFIG_FILE} found; using defaults");
                return Ok(DragnetConfig::default());
            }
            fallback
        }
    };
    let config = DragnetConfig::from_file(&path)
        .with_context(|| format!("loading config from {}", path.display()))?;
    config.validate().context("validating config")?;
    tracing::info!(path = %path.display(), "config loaded");
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("dragnet=info")),
        )
        .init();

    tracing::info!("dragnet-host starting");

    let config = load_config()?;
    let api = AdminApi::from_config(&config).context("building admin api")?;

    match api.discover().await {
        Ok(report) => tracing::info!(
            registered = report.registered(),
            skipped = report.skipped.len(),
            "initial discovery complete"
        ),
        Err(e) => tracing::warn!(error = %e, "initial discovery failed"),
    }

    run_stdio_bridge(&api).await.map_err(|e| {
        tracing::error!(error = %e, "dragnet-host exited with error");
        anyhow::anyhow!("dragnet-host failed: {e}")
    })?;

    tracing::info!("dragnet-host shut down cleanly");
    Ok(())
}
