use anyhow::{Context, Result};
use hookwatch_core::{DirectoryWatcher, WatchConfig};
use std::path::Path;
use tracing::info;

/// Load the configuration and either report it or run the watcher until Ctrl+C
pub async fn execute(config_path: &Path, check: bool) -> Result<()> {
    let config = WatchConfig::from_file(config_path).with_context(|| {
        format!(
            "Failed to load configuration from {}",
            config_path.display()
        )
    })?;

    if check {
        for line in summary_lines(&config) {
            println!("{line}");
        }
        return Ok(());
    }

    info!("Loaded configuration from {}", config_path.display());
    for line in summary_lines(&config) {
        info!("{}", line);
    }

    let mut watcher = DirectoryWatcher::from_config(config)
        .context("Failed to create file watcher")?;
    watcher.start().context("Failed to start file watcher")?;

    info!("Watcher started. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    info!("Shutdown signal received");
    watcher.stop();
    Ok(())
}

/// Human-readable configuration summary with the credential redacted
pub fn summary_lines(config: &WatchConfig) -> Vec<String> {
    let auth = if config.authentication_header.is_empty() {
        "(none)"
    } else {
        "REDACTED"
    };

    vec![
        format!("Directories: {}", config.directories.join(", ")),
        format!("Event types: {}", config.event_types.join(", ")),
        format!("File pattern: {}", config.effective_pattern()),
        format!("Post URL: {}", config.post_url),
        format!("Authentication header: {}", auth),
        format!("Dispatch mode: {}", config.dispatch_mode()),
    ]
}
