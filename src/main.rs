use anyhow::{bail, Context};
use clap::Parser;
use log::{error, info, LevelFilter};
use query_monitor::alerts::{AlertType, LogNotifier, Notifier, SlackNotifier};
use query_monitor::config::{load_config, Config, Settings, DATABASE_URL, DUNE_API_KEY, SLACK_TOKEN};
use query_monitor::error::AlertError;
use query_monitor::executor::{DuneClient, QueryExecutor};
use query_monitor::monitor::QueryMonitor;
use query_monitor::runner::QueryRunner;
use query_monitor::scheduler::Scheduler;
use query_monitor::store::{MemoryStateBackend, PgStateBackend, StateBackend, StateStore};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Channel reported in dry runs for monitors without a configured channel
const DRY_RUN_CHANNEL: &str = "dry-run";

/// Command-line arguments for the query monitor
#[derive(Parser)]
#[command(
    name = "query-monitor",
    about = "Run analytics queries on a schedule and alert when their results cross a rule",
    long_about = "Executes parameterized queries against the Dune API, evaluates each result \
                  with the monitor rule from its configuration file, and posts alerts to Slack."
)]
struct Cli {
    /// Monitor configuration files
    #[arg(
        short,
        long,
        value_name = "FILE",
        required = true,
        num_args = 1..,
        help = "Monitor configuration file(s) (TOML format)"
    )]
    config: Vec<PathBuf>,

    /// Run every monitor once and exit
    #[arg(long, help = "Run every monitor once and exit; non-zero exit if any run failed")]
    once: bool,

    /// Minutes between runs of the same monitor
    #[arg(long, value_name = "MINUTES", default_value_t = 360)]
    every_minutes: u64,

    /// Keep state in memory and only log alerts
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging output (debug level)")]
    verbose: bool,
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if self.every_minutes == 0 {
            return Err("--every-minutes must be greater than zero".to_string());
        }
        for path in &self.config {
            if path.is_dir() {
                return Err(format!(
                    "Configuration path is a directory, not a file: {}",
                    path.display()
                ));
            }
        }
        Ok(())
    }

    fn every(&self) -> Duration {
        Duration::from_secs(self.every_minutes * 60)
    }
}

fn init_logging(verbose: bool) {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

fn load_configs(paths: &[PathBuf]) -> anyhow::Result<Vec<Config>> {
    let mut configs = Vec::with_capacity(paths.len());
    for path in paths {
        info!("Loading monitor configuration from: {}", path.display());
        let config =
            load_config(path).with_context(|| format!("invalid configuration {}", path.display()))?;
        if config.alert_type == AlertType::Twitter {
            return Err(AlertError::Unsupported(format!(
                "twitter alerts requested by {}",
                path.display()
            ))
            .into());
        }
        configs.push(config);
    }
    Ok(configs)
}

async fn open_store(
    settings: &Settings,
    configs: &[Config],
    dry_run: bool,
) -> anyhow::Result<StateStore> {
    let needs_state = configs
        .iter()
        .any(|c| matches!(c.monitor, QueryMonitor::Interval(_)));

    let backend: Arc<dyn StateBackend> = match (&settings.database_url, dry_run) {
        (Some(url), false) => {
            info!("Using Postgres state table '{}'", settings.state_table);
            Arc::new(PgStateBackend::connect(url, &settings.state_table).await?)
        }
        (None, false) if needs_state => {
            bail!("{} must be set to run interval monitors", DATABASE_URL)
        }
        _ => {
            info!("Keeping monitor state in memory");
            Arc::new(MemoryStateBackend::new())
        }
    };

    Ok(StateStore::open(backend).await?)
}

/// Build everything and run; returns whether every run succeeded
async fn run(cli: &Cli) -> anyhow::Result<bool> {
    let settings = Settings::from_env();
    let configs = load_configs(&cli.config)?;

    let executor: Arc<dyn QueryExecutor> = Arc::new(DuneClient::new(
        Settings::require(&settings.dune_api_key, DUNE_API_KEY)?.to_string(),
    )?);
    let notifier: Arc<dyn Notifier> = if cli.dry_run {
        Arc::new(LogNotifier)
    } else {
        Arc::new(SlackNotifier::new(
            Settings::require(&settings.slack_token, SLACK_TOKEN)?.to_string(),
        )?)
    };

    let store = Arc::new(open_store(&settings, &configs, cli.dry_run).await?);

    let mut scheduler = Scheduler::new(store, cli.every());
    for config in configs {
        let channel = match settings.channel_for(&config) {
            Ok(channel) => channel,
            Err(_) if cli.dry_run => DRY_RUN_CHANNEL.to_string(),
            Err(e) => return Err(e.into()),
        };
        let runner = QueryRunner::new(Arc::clone(&executor), Arc::clone(&notifier), channel)
            .with_ping_frequency(config.ping_frequency)
            .with_max_poll_attempts(config.max_poll_attempts);
        scheduler.add(config.monitor, runner);
    }

    // Set up signal handling for graceful shutdown (SIGINT)
    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("failed to install SIGINT handler")?;

    if cli.once {
        let reports = scheduler.run_all_once(shutdown_receiver).await;
        let failed = reports.iter().filter(|r| r.result.is_err()).count();
        info!(
            "Completed {} run(s), {} failed",
            reports.len(),
            failed
        );
        return Ok(failed == 0);
    }

    info!("Query monitor is running. Press Ctrl+C to stop.");
    scheduler.run(shutdown_receiver).await;
    Ok(true)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting query monitor");

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    match run(&cli).await {
        Ok(true) => info!("Query monitor shutdown complete"),
        Ok(false) => {
            error!("One or more monitor runs failed");
            std::process::exit(1);
        }
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli(config: Vec<PathBuf>, every_minutes: u64) -> Cli {
        Cli {
            config,
            once: false,
            every_minutes,
            dry_run: false,
            verbose: false,
        }
    }

    #[test]
    fn test_cli_parses_multiple_configs() {
        let cli = Cli::try_parse_from([
            "query-monitor",
            "--config",
            "a.toml",
            "b.toml",
            "--once",
            "--dry-run",
        ])
        .unwrap();
        assert_eq!(cli.config.len(), 2);
        assert!(cli.once);
        assert!(cli.dry_run);
        assert_eq!(cli.every_minutes, 360);
        assert_eq!(cli.every(), Duration::from_secs(6 * 60 * 60));
    }

    #[test]
    fn test_cli_requires_config() {
        assert!(Cli::try_parse_from(["query-monitor"]).is_err());
    }

    #[test]
    fn test_cli_validation() {
        let file = tempfile::NamedTempFile::new().unwrap();
        assert!(cli(vec![file.path().to_path_buf()], 360).validate().is_ok());
        assert!(cli(vec![file.path().to_path_buf()], 0).validate().is_err());

        let dir = tempfile::tempdir().unwrap();
        assert!(cli(vec![dir.path().to_path_buf()], 360).validate().is_err());
    }

    #[test]
    fn test_twitter_config_rejected_at_startup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tweet.toml");
        std::fs::write(&path, "name = \"T\"\nid = 1\nalert_type = \"twitter\"\n").unwrap();

        let err = load_configs(&[path]).unwrap_err();
        assert!(err.downcast_ref::<AlertError>().is_some());
    }

    #[tokio::test]
    async fn test_interval_monitor_requires_database() {
        let configs = load_configs(&[]).unwrap();
        assert!(configs.is_empty());

        let config = query_monitor::config::load_config_str(
            "name = \"I\"\nid = 1\ncolumn = \"c\"\nalert_value = \"10%\"\n",
        )
        .unwrap();
        let settings = Settings::from_lookup(|_| None);

        assert!(open_store(&settings, &[config.clone()], false).await.is_err());
        assert!(open_store(&settings, &[config], true).await.is_ok());
    }
}
