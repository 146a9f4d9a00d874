//! dailypost-send - publish the post planned for today
//!
//! Runs the scheduled publication pipeline once (for cron or systemd timers)
//! or stays up and fires once a day at the configured local time.

use chrono::Utc;
use clap::Parser;
use libdailypost::config::Config;
use libdailypost::logging::LoggingConfig;
use libdailypost::publisher::HttpPublisher;
use libdailypost::scheduling::{next_run_after, parse_target_date};
use libdailypost::store::open_store;
use libdailypost::{Result, ScheduledPublishRequest, ScheduledPublishResponse, ScheduledPublisher};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "dailypost-send")]
#[command(version)]
#[command(about = "Publish the post planned for today")]
#[command(long_about = "\
dailypost-send - Publish the post planned for today

DESCRIPTION:
    Looks up the first unpublished post planned for the target day (DD/MM),
    checks that it can be published automatically, sends it to the publish
    endpoint and marks it published. Every run leaves one entry in the
    publication history, except dry runs which write nothing.

    Without --once, runs as a daemon that fires every day at
    [schedule].publish_at in [schedule].timezone.

USAGE:
    # Publish today's post and exit (cron / systemd timer)
    dailypost-send --once

    # See what would be published on 5 December
    dailypost-send --once --date 05/12 --dry-run

    # Machine-readable result
    dailypost-send --once --format json

    # Daemon mode
    dailypost-send

CONFIGURATION:
    Configuration file: ~/.config/dailypost/config.toml
    (override with DAILYPOST_CONFIG)

    [store]
    backend = \"sqlite\"   # or \"local\" for a JSON file
    path = \"~/.local/share/dailypost/posts.db\"

    [publisher]
    endpoint = \"https://<project>.supabase.co/functions/v1/publish-instagram\"
    timeout_secs = 30    # token via DAILYPOST_PUBLISH_TOKEN

    [schedule]
    timezone = \"Europe/Paris\"
    publish_at = \"09:00\"

EXIT CODES:
    0 - Published, skipped, nothing to publish, or dry run
    1 - Publication or store error
    2 - Configuration error
    3 - Invalid input
")]
struct Cli {
    /// Target day in DD/MM form (defaults to today)
    #[arg(long, value_name = "DD/MM", requires = "once")]
    date: Option<String>,

    /// Select and validate only; publish nothing and write nothing
    #[arg(long)]
    dry_run: bool,

    /// Run once and exit instead of staying up as a daemon
    #[arg(long)]
    once: bool,

    /// Output format for run results
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    LoggingConfig::from_env(cli.verbose).init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{}", e);
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let target_date = cli.date.as_deref().map(parse_target_date).transpose()?;

    let config = Config::load()?;
    let scheduler = build_scheduler(&config, cli.dry_run).await?;

    if cli.once {
        let response = scheduler
            .run(ScheduledPublishRequest {
                target_date,
                dry_run: cli.dry_run,
            })
            .await;
        print_response(&response, &cli.format);
        return Ok(if response.success { 0 } else { 1 });
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone())?;

    info!("dailypost-send daemon starting");
    run_daemon_loop(&scheduler, &config, &cli, shutdown).await?;
    info!("dailypost-send daemon stopped");
    Ok(0)
}

/// Wire the configured store and publisher into a scheduler
async fn build_scheduler(config: &Config, dry_run: bool) -> Result<ScheduledPublisher> {
    let store = open_store(&config.store).await?;
    let mut scheduler = ScheduledPublisher::new(store).with_timezone(config.schedule.timezone()?);

    match &config.publisher {
        Some(publisher) => {
            let http = HttpPublisher::new(publisher)?;
            info!(endpoint = http.endpoint(), "Publishing through HTTP endpoint");
            scheduler = scheduler
                .with_publisher(Arc::new(http))
                .with_publish_timeout(Duration::from_secs(publisher.timeout_secs));
        }
        // A dry run never calls the publisher
        None if dry_run => {}
        None => {
            config.require_publisher()?;
        }
    }

    Ok(scheduler)
}

fn print_response(response: &ScheduledPublishResponse, format: &str) {
    if format == "json" {
        match serde_json::to_string_pretty(response) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize response: {}", e),
        }
    } else {
        println!("{}: {}", response.action, response.message);
    }
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM]).map_err(|e| {
        libdailypost::DailypostError::InvalidInput(format!("Signal setup failed: {}", e))
    })?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, stopping gracefully...");
            shutdown.store(true, Ordering::Relaxed);
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) -> Result<()> {
    Ok(())
}

/// Fire once per day at the configured local time until shut down
async fn run_daemon_loop(
    scheduler: &ScheduledPublisher,
    config: &Config,
    cli: &Cli,
    shutdown: Arc<AtomicBool>,
) -> Result<()> {
    let timezone = config.schedule.timezone()?;
    let publish_at = config.schedule.publish_time()?;

    loop {
        let next = next_run_after(Utc::now(), publish_at, timezone);
        info!(next_run = %next, "Waiting for next publication slot");

        // Sleep until the slot, checking for shutdown every second
        while Utc::now() < next {
            if shutdown.load(Ordering::Relaxed) {
                info!("Shutdown requested, stopping daemon loop");
                return Ok(());
            }
            sleep(Duration::from_secs(1)).await;
        }

        let response = scheduler
            .run(ScheduledPublishRequest {
                target_date: None,
                dry_run: cli.dry_run,
            })
            .await;
        print_response(&response, &cli.format);
    }
}
