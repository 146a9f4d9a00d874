use anyhow::{Context, Result};
use clap::Parser;
use libdailypost::config::Config;
use libdailypost::logging::LoggingConfig;
use libdailypost::scheduling::parse_target_date;
use libdailypost::store::open_store;
use libdailypost::types::StoredHistoryEntry;
use libdailypost::PublicationAction;

#[derive(Parser, Debug)]
#[command(name = "dailypost-history")]
#[command(version, about = "Query the publication audit log")]
#[command(long_about = r#"Query the publication audit log, most recent runs first.

Every non dry-run execution of dailypost-send leaves exactly one entry:
published, skipped, no_post or error.

EXAMPLES:
    # Show the last 20 runs (default)
    dailypost-history

    # Only failures
    dailypost-history --action error

    # Everything recorded for 5 December
    dailypost-history --date 05/12 --limit 100

    # JSON output for scripting
    dailypost-history --format json | jq '.[] | select(.action == "skipped") | .message'

    # JSONL output (one JSON object per line)
    dailypost-history --format jsonl

OUTPUT FORMATS:
    text  - One line per run: time, action, target day, message (default)
    json  - JSON array
    jsonl - JSON lines, one object per line

EXIT CODES:
    0 - Success (including empty results)
    1 - Error (store unreadable, bad configuration, malformed --date)
    2 - Invalid command-line arguments
"#)]
struct Args {
    /// Only show entries with this action (published, skipped, no_post, error)
    #[arg(short, long, value_name = "ACTION")]
    action: Option<PublicationAction>,

    /// Only show entries for this target day (DD/MM)
    #[arg(short, long, value_name = "DD/MM")]
    date: Option<String>,

    /// Maximum number of entries to return
    #[arg(short, long, default_value = "20", value_name = "N")]
    limit: usize,

    /// Output format
    #[arg(short, long, default_value = "text", value_name = "FORMAT")]
    #[arg(value_parser = ["text", "json", "jsonl"])]
    format: String,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Filters applied on top of the store's newest-first listing
#[derive(Debug)]
struct HistoryQuery {
    action: Option<PublicationAction>,
    date: Option<String>,
    limit: usize,
}

impl HistoryQuery {
    fn has_filters(&self) -> bool {
        self.action.is_some() || self.date.is_some()
    }

    fn matches(&self, entry: &StoredHistoryEntry) -> bool {
        self.action.map_or(true, |action| entry.entry.action == action)
            && self
                .date
                .as_deref()
                .map_or(true, |date| entry.entry.target_date == date)
    }
}

fn apply_query(entries: Vec<StoredHistoryEntry>, query: &HistoryQuery) -> Vec<StoredHistoryEntry> {
    entries
        .into_iter()
        .filter(|entry| query.matches(entry))
        .take(query.limit)
        .collect()
}

fn format_text(entry: &StoredHistoryEntry) -> String {
    format!(
        "{} | {:<9} | {} | {}",
        entry.recorded_at.format("%Y-%m-%d %H:%M:%S"),
        entry.entry.action.as_str(),
        entry.entry.target_date,
        entry.entry.message
    )
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    LoggingConfig::from_env(args.verbose).init();
    tracing::debug!("dailypost-history started with args: {:?}", args);

    let date = args
        .date
        .as_deref()
        .map(parse_target_date)
        .transpose()
        .context("Invalid --date filter")?;

    let query = HistoryQuery {
        action: args.action,
        date,
        limit: args.limit,
    };

    let config = Config::load().context("Failed to load configuration")?;
    let store = open_store(&config.store)
        .await
        .context("Failed to open store")?;

    // Filters run client-side, so read the whole log when any are set
    let window = if query.has_filters() { usize::MAX } else { query.limit };
    let entries = store
        .list_history(window)
        .await
        .context("Failed to read publication history")?;
    let entries = apply_query(entries, &query);

    match args.format.as_str() {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }
        "jsonl" => {
            for entry in &entries {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
        _ => {
            for entry in &entries {
                println!("{}", format_text(entry));
            }
        }
    }

    Ok(())
}
