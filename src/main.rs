use anyhow::Context;
use bosswatch::alerts::{AlertEngine, LogSink, NotificationSink, WebhookNotifier};
use bosswatch::collectors::{Fetcher, HttpSnapshotSource};
use bosswatch::config::Config;
use bosswatch::error::ConfigError;
use bosswatch::monitor::Monitor;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Command-line arguments for the spawn timer bot
#[derive(Parser)]
#[command(
    name = "bosswatch",
    about = "Boss and sword spawn timer alerts for chat webhooks",
    long_about = "Polls a JSON endpoint describing boss and sword respawn timers and posts \
                  a role-tagged chat message as each entity approaches or passes its \
                  respawn time. Every alert fires once per death."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Log alerts instead of posting them
    #[arg(long, help = "Log alert messages instead of posting them to the webhook")]
    dry_run: bool,

    /// Run a single poll cycle and exit
    #[arg(long, help = "Run one poll cycle, then exit")]
    once: bool,
}

impl Cli {
    /// Config file path as UTF-8, rejecting directories
    ///
    /// A path that does not exist is accepted; loading falls back to defaults.
    fn config_path(&self) -> Result<Option<&str>, String> {
        let Some(path) = self.config.as_deref() else {
            return Ok(None);
        };

        if path.is_dir() {
            return Err(format!("{} is a directory, expected a TOML file", path.display()));
        }
        if path.extension().is_some_and(|ext| ext != "toml") {
            warn!("Config file {} has no .toml extension", path.display());
        }

        path.to_str()
            .map(Some)
            .ok_or_else(|| format!("Config path is not valid UTF-8: {}", path.display()))
    }
}

/// Load configuration from file, then apply environment overrides
///
/// A missing or unreadable file falls back to defaults. A file that exists but
/// does not parse is an error.
fn load_config(config_path: Option<&str>) -> Result<Config, ConfigError> {
    let mut config = match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            match Config::from_file(std::path::Path::new(path)) {
                Ok(config) => config,
                Err(ConfigError::ReadError(e)) => {
                    warn!("Configuration file not readable ({}), using defaults", e);
                    Config::default()
                }
                Err(e) => return Err(e),
            }
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    };

    config.apply_env_overrides();
    Ok(config)
}

/// Wire the fetcher, engine and sink into a monitor
fn build_monitor(config: &Config, dry_run: bool) -> anyhow::Result<Monitor> {
    let source = HttpSnapshotSource::new(config.source.url.clone(), config.source_timeout())
        .context("failed to build data source client")?;
    info!("Polling {}", source.url());
    let fetcher =
        Fetcher::with_retry_policy(Arc::new(source), config.source.retries, config.retry_delay());

    let sink: Arc<dyn NotificationSink> = if dry_run {
        info!("Dry run: alerts will be logged, not posted");
        Arc::new(LogSink::new(config.notify.role_id.clone()))
    } else {
        let sword_url = config
            .notify
            .sword_webhook_url
            .clone()
            .filter(|url| !url.trim().is_empty());
        Arc::new(
            WebhookNotifier::new(
                config.notify.boss_webhook_url.clone(),
                sword_url,
                config.notify.role_id.clone(),
                config.notify_timeout(),
            )
            .context("failed to build webhook client")?,
        )
    };

    let engine = AlertEngine::new(config.formatter()?)
        .with_invalid_record_alerts(config.monitor.notify_invalid_records);

    Ok(
        Monitor::new(fetcher, engine, sink, config.poll_interval())
            .with_redelivery(config.notify.redeliver_failed),
    )
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::init();

    info!("Starting bosswatch");

    let config_path = match cli.config_path() {
        Ok(path) => path,
        Err(e) => {
            error!("Invalid arguments: {}", e);
            std::process::exit(1);
        }
    };

    let config = match load_config(config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = config.validate(cli.dry_run) {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let mut monitor = match build_monitor(&config, cli.dry_run) {
        Ok(monitor) => monitor,
        Err(e) => {
            error!("Failed to initialize monitor: {:#}", e);
            std::process::exit(1);
        }
    };

    if cli.once {
        let report = monitor.run_once().await;
        info!(
            "Cycle complete: {} entities, {} alerts fired, {} delivered, {} failed",
            report.entities, report.fired, report.delivered, report.failed
        );
        return;
    }

    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<()>();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_tx.send(()) {
            error!("Failed to send shutdown signal: {}", e);
        }
    }) {
        error!("Error setting SIGINT handler: {}", e);
        std::process::exit(1);
    }

    let handle = monitor.start();
    info!("bosswatch is running. Press Ctrl+C to stop.");

    shutdown_rx.recv().await;
    monitor.stop().await;

    if let Err(e) = handle.await {
        error!("Monitor task ended abnormally: {}", e);
        std::process::exit(1);
    }

    info!("bosswatch shutdown complete");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn cli(config: Option<PathBuf>) -> Cli {
        Cli {
            config,
            verbose: false,
            dry_run: false,
            once: false,
        }
    }

    #[test]
    fn test_config_path_existing_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[monitor]\npoll_interval_seconds = 30").unwrap();

        let cli = cli(Some(file.path().to_path_buf()));
        assert_eq!(cli.config_path().unwrap(), file.path().to_str());
    }

    #[test]
    fn test_config_path_missing_file_is_accepted() {
        let cli = cli(Some(PathBuf::from("/nonexistent/bosswatch.toml")));
        assert_eq!(cli.config_path().unwrap(), Some("/nonexistent/bosswatch.toml"));
    }

    #[test]
    fn test_config_path_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(cli(Some(dir.path().to_path_buf())).config_path().is_err());
    }

    #[test]
    fn test_config_path_none() {
        assert_eq!(cli(None).config_path().unwrap(), None);
    }

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from(["bosswatch", "-c", "bot.toml", "--dry-run", "--once"]);
        assert_eq!(cli.config, Some(PathBuf::from("bot.toml")));
        assert!(cli.dry_run);
        assert!(cli.once);
        assert!(!cli.verbose);
    }

    #[test]
    fn test_load_config_missing_file_uses_defaults() {
        let config = load_config(Some("/nonexistent/bosswatch.toml")).unwrap();
        assert_eq!(config.monitor, Config::default().monitor);
    }

    #[test]
    fn test_load_config_invalid_file_is_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[source\nurl = ").unwrap();

        let path = file.path().to_str().unwrap().to_string();
        assert!(matches!(
            load_config(Some(&path)),
            Err(ConfigError::TomlError(_))
        ));
    }

    #[test]
    fn test_build_monitor_dry_run() {
        let mut config = Config::default();
        config.source.url = "http://127.0.0.1:9/.json".to_string();

        let monitor = build_monitor(&config, true).unwrap();
        assert!(!monitor.is_running());
    }
}
