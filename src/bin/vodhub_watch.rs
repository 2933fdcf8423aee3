//! Terminal consumer for a running vodhub server.
//!
//! Progress goes to stderr as results stream in; the final view is printed
//! to stdout once the session ends.

use clap::Parser;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use url::Url;
use uuid::Uuid;
use vodhub::HubClient;
use vodhub_search::view::{flat_view, grouped_view};
use vodhub_search::{
    AggregateConfig, AggregationGroup, Aggregator, ResultRecord, SessionController,
    SessionUpdate, SortOrder, ViewFilter,
};

/// Watch a search stream and print the aggregated results.
#[derive(Parser)]
#[command(name = "vodhub-watch", version, about)]
struct Cli {
    /// What to search for.
    query: String,

    /// Server base URL.
    #[arg(short, long, default_value = "http://127.0.0.1:8090/")]
    server: Url,

    /// Client id; a second watch with the same id cancels this one.
    #[arg(long)]
    client: Option<String>,

    /// Print groups instead of individual results.
    #[arg(short, long)]
    grouped: bool,

    /// Ordering: none, asc or desc.
    #[arg(long, default_value = "none")]
    sort: SortOrder,

    /// Only results from this provider key.
    #[arg(long)]
    source: Option<String>,

    /// Only results with exactly this title.
    #[arg(long)]
    title: Option<String>,

    /// Only results from this year (`unknown` for undated).
    #[arg(long)]
    year: Option<String>,

    /// Coalescing window in milliseconds.
    #[arg(long, default_value_t = 100)]
    window_ms: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let filter = ViewFilter {
        source: cli.source.clone(),
        title: cli.title.clone(),
        year: cli.year.clone(),
    };
    let aggregate = AggregateConfig {
        coalesce_window_ms: cli.window_ms,
        ..Default::default()
    };
    aggregate.validate()?;

    let hub = HubClient::new(cli.server.clone(), Duration::from_secs(10))?;
    if hub.config().await?.streaming {
        watch_stream(&hub, &cli, aggregate, &filter).await
    } else {
        eprintln!("streaming disabled on server, waiting for all providers");
        fetch_once(&hub, &cli, &filter).await
    }
}

async fn watch_stream(
    hub: &HubClient,
    cli: &Cli,
    aggregate: AggregateConfig,
    filter: &ViewFilter,
) -> anyhow::Result<()> {
    let client_id = cli
        .client
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let mut controller = SessionController::new(aggregate);
    let session = controller
        .start_with(&cli.query, |query| async move {
            hub.open_stream(&query, &client_id).await
        })
        .await?;

    while let Some(update) = session.next_update().await {
        let progress = session.progress();
        let counter = format!(
            "[{}/{}]",
            progress.completed_sources, progress.total_sources
        );
        match update {
            SessionUpdate::Started { total } => eprintln!("querying {total} sources"),
            SessionUpdate::SourceReported { source, records } => {
                eprintln!("{counter} {source}: {records} results");
            }
            SessionUpdate::SourceFailed { source, error } => {
                eprintln!("{counter} {source} failed: {error}");
            }
            SessionUpdate::Flushed { .. } => {
                eprintln!(
                    "{counter} {} results in {} groups",
                    session.aggregator().len(),
                    session.aggregator().groups().len()
                );
            }
            SessionUpdate::Finished(status) => eprintln!("{status}"),
        }
    }
    if session.malformed_events() > 0 {
        eprintln!("{} events could not be decoded", session.malformed_events());
    }

    if cli.grouped {
        print_groups(&session.grouped_view(filter, cli.sort));
    } else {
        print_records(&session.flat_view(filter, cli.sort));
    }
    Ok(())
}

async fn fetch_once(hub: &HubClient, cli: &Cli, filter: &ViewFilter) -> anyhow::Result<()> {
    let response = hub.search(&cli.query).await?;
    for failure in &response.failed_sources {
        eprintln!("{} failed: {}", failure.source, failure.error);
    }
    eprintln!(
        "[{}/{}] {} results",
        response.completed_sources,
        response.total_sources,
        response.results.len()
    );

    let mut aggregator = Aggregator::new();
    aggregator.ingest(response.results);
    if cli.grouped {
        print_groups(&grouped_view(aggregator.groups(), filter, cli.sort, &cli.query));
    } else {
        print_records(&flat_view(aggregator.records(), filter, cli.sort, &cli.query));
    }
    Ok(())
}

fn print_records(records: &[&ResultRecord]) {
    for record in records {
        println!(
            "{:<40} {:>7} {:>4} eps  {}",
            record.title,
            record.year_or_unknown(),
            record.episode_count(),
            record.source_name
        );
    }
}

fn print_groups(groups: &[&AggregationGroup]) {
    for group in groups {
        let stats = group.stats();
        println!(
            "{:<40} {:>3} results  {:>4} eps  {}",
            group.label(),
            group.len(),
            stats.episodes_mode,
            stats.source_names.join(", ")
        );
    }
}
