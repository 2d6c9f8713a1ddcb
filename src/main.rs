use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use comfy_table::{Attribute, Cell, Table};
use eq_fetch::config::{find_config_file, get_config, load_config, Config};
use eq_fetch::models::{Catalog, OutputFlags, SearchRequest, SortBy};
use eq_fetch::search::SearchResult;
use eq_fetch::{CancelHandle, IscFetcher, SearchController, SearchOutcome, VERSION};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// eq-fetch - Retrieve earthquake hypocenters and bibliographies from the ISC catalog
#[derive(Parser, Debug)]
#[command(name = "eq-fetch")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Retrieve earthquake hypocenters and bibliographies from the ISC catalog", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging (can be used multiple times for more verbosity: -v, -vv)
    #[arg(long, short, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Sort order for bibliography results
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum SortField {
    /// Sort by event origin day
    Day,
    /// Sort by publication year
    Year,
}

impl From<SortField> for SortBy {
    fn from(field: SortField) -> Self {
        match field {
            SortField::Day => SortBy::Day,
            SortField::Year => SortBy::Year,
        }
    }
}

/// Selection shared by every catalog search
#[derive(Args, Debug)]
struct WindowArgs {
    /// Single origin date (YYYY-MM-DD); searches that whole day
    #[arg(long, conflicts_with_all = ["start_date", "end_date"])]
    date: Option<String>,

    /// Start of the origin-time window (inclusive)
    #[arg(long, requires = "end_date")]
    start_date: Option<String>,

    /// End of the origin-time window (exclusive)
    #[arg(long, requires = "start_date")]
    end_date: Option<String>,

    /// Minimum depth in km
    #[arg(long)]
    min_depth: Option<f64>,

    /// Maximum depth in km
    #[arg(long)]
    max_depth: Option<f64>,

    /// Minimum magnitude
    #[arg(long)]
    min_mag: Option<f64>,

    /// Maximum magnitude
    #[arg(long)]
    max_mag: Option<f64>,

    /// Region shape: global, rect, circ, poly, seis or geo
    #[arg(long, requires = "coords")]
    shape: Option<String>,

    /// Region coordinates, comma or space separated
    #[arg(long)]
    coords: Option<String>,

    /// Split overflowing windows into chunks of this many days instead of halving them
    #[arg(long, value_name = "DAYS")]
    iter_search: Option<u32>,

    /// Write JSON rows here (plus a `<stem>_search.json` provenance file) instead of printing a table
    #[arg(long, short)]
    outfile: Option<PathBuf>,
}

impl WindowArgs {
    fn request(&self) -> SearchRequest {
        let mut request = SearchRequest {
            date: self.date.clone(),
            start_date: self.start_date.clone(),
            end_date: self.end_date.clone(),
            shape: self.shape.clone(),
            coords: self.coords.clone(),
            ..Default::default()
        };
        request = request
            .depth(self.min_depth, self.max_depth)
            .magnitude(self.min_mag, self.max_mag);
        request
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Search the ISC event bibliography
    Bibli {
        #[command(flatten)]
        window: WindowArgs,

        /// Author filter
        #[arg(long)]
        author: Option<String>,

        /// Publisher / journal filter
        #[arg(long)]
        publisher: Option<String>,

        /// Earliest publication year
        #[arg(long)]
        min_pub_year: Option<String>,

        /// Latest publication year
        #[arg(long)]
        max_pub_year: Option<String>,

        /// Result order
        #[arg(long, value_enum)]
        sort_by: Option<SortField>,
    },

    /// Search the ISC bulletin for hypocenters
    Hypo {
        #[command(flatten)]
        window: WindowArgs,

        /// Required magnitude type (e.g. mb, MS, Mw)
        #[arg(long)]
        mag_type: Option<String>,

        /// Required magnitude agency
        #[arg(long)]
        mag_agency: Option<String>,

        /// Minimum number of defining phases
        #[arg(long)]
        min_def: Option<u32>,

        /// Maximum number of defining phases
        #[arg(long)]
        max_def: Option<u32>,

        /// Query the reviewed bulletin instead of the comprehensive one
        #[arg(long)]
        reviewed: bool,

        /// Include events without a depth
        #[arg(long)]
        null_depth: bool,

        /// Include events without a magnitude
        #[arg(long)]
        null_mag: bool,

        /// Include events without defining phases
        #[arg(long)]
        null_phases: bool,

        /// Only the prime hypocenter of each event
        #[arg(long)]
        prime_only: bool,
    },

    /// List every citation of a single ISC event
    Bibprint {
        /// ISC event id
        event_id: u64,

        /// Write a JSON array here instead of printing
        #[arg(long, short)]
        outfile: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let log_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };

    let env_filter = if cli.quiet { "error" } else { log_level };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("eq_fetch={}", env_filter)),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Load configuration from file if specified or found in default locations
    let mut config: Config = if let Some(config_path) = &cli.config {
        load_config(config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
    } else if let Some(config_path) = find_config_file() {
        tracing::info!("Using config file: {}", config_path.display());
        load_config(&config_path)
            .with_context(|| format!("loading config {}", config_path.display()))?
    } else {
        get_config().context("reading EQ_FETCH_* environment")?
    };

    if let Commands::Bibli { window, .. } | Commands::Hypo { window, .. } = &cli.command {
        if let Some(days) = window.iter_search {
            config.search.split_step_days = Some(days);
        }
    }

    let fetcher = IscFetcher::new(config.endpoints.clone(), &config.http)?;
    let controller = SearchController::new(Arc::new(fetcher), config.search_options());

    let cancel = CancelHandle::new();
    let signal = cancel.signal();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling search");
            cancel.cancel();
        }
    });

    match cli.command {
        Commands::Bibli {
            window,
            author,
            publisher,
            min_pub_year,
            max_pub_year,
            sort_by,
        } => {
            let request = SearchRequest {
                author,
                publisher,
                published_min_year: min_pub_year,
                published_max_year: max_pub_year,
                sort_by: sort_by.map(SortBy::from),
                ..window.request()
            };
            let outcome = controller.bibliography_search(&request, &signal).await?;
            emit(outcome, window.outfile.as_deref(), cli.quiet)?;
        }
        Commands::Hypo {
            window,
            mag_type,
            mag_agency,
            min_def,
            max_def,
            reviewed,
            null_depth,
            null_mag,
            null_phases,
            prime_only,
        } => {
            let outputs = OutputFlags {
                null_depth,
                null_magnitude: null_mag,
                null_phases,
                prime_only,
                ..Default::default()
            };
            let request = SearchRequest {
                mag_type,
                mag_agency,
                min_defining_phases: min_def,
                max_defining_phases: max_def,
                ..window.request()
            }
            .reviewed(reviewed)
            .outputs(outputs);
            let outcome = controller.hypocenter_search(&request, &signal).await?;
            emit(outcome, window.outfile.as_deref(), cli.quiet)?;
        }
        Commands::Bibprint { event_id, outfile } => {
            let citations = controller.event_bibliography(event_id, &signal).await?;
            match outfile {
                Some(path) => {
                    write_json(&path, &citations)?;
                    tracing::info!("Wrote {} citations to {}", citations.len(), path.display());
                }
                None => {
                    for (i, citation) in citations.iter().enumerate() {
                        println!("{:>4}  {}", i + 1, citation);
                    }
                }
            }
        }
    }

    Ok(())
}

/// Print or save the outcome of a catalog search
fn emit(outcome: SearchOutcome, outfile: Option<&Path>, quiet: bool) -> Result<()> {
    let report = outcome.report();
    tracing::debug!(
        "queries={} splits={} empty_ranges={} skipped={} duplicates={} filtered={}",
        report.queries,
        report.splits,
        report.empty_ranges,
        report.blocks_skipped,
        report.duplicates_dropped,
        report.filtered_out
    );

    let result = match outcome {
        SearchOutcome::Found(result) => result,
        SearchOutcome::Empty { criteria, .. } => {
            if !quiet {
                eprintln!("No events found between {}", criteria.range);
            }
            return Ok(());
        }
    };

    match outfile {
        Some(path) => {
            write_json(path, &result.catalog.rows())?;
            let provenance = provenance_path(path);
            write_json(&provenance, &provenance_record(&result))?;
            tracing::info!(
                "Wrote {} events to {} (search parameters in {})",
                result.catalog.event_count(),
                path.display(),
                provenance.display()
            );
        }
        None => print_table(&result.catalog),
    }
    Ok(())
}

fn provenance_record(result: &SearchResult) -> serde_json::Value {
    serde_json::json!({
        "tool": "eq-fetch",
        "version": VERSION,
        "generated_at": chrono::Utc::now(),
        "criteria": result.criteria,
        "report": result.report,
    })
}

/// `<dir>/<stem>_search.json` next to `outfile`
fn provenance_path(outfile: &Path) -> PathBuf {
    let stem = outfile
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "catalog".to_string());
    outfile.with_file_name(format!("{}_search.json", stem))
}

fn write_json<T: serde::Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn print_table(catalog: &Catalog) {
    let mut table = Table::new();
    table.load_preset(comfy_table::presets::UTF8_FULL);
    table.set_header(vec![
        "Origin time", "Lat", "Lon", "Depth", "Mag", "Agency", "Code", "#", "Article",
    ]);

    for row in catalog.rows() {
        let event = row.event;
        let magnitude = match event.magnitude_value {
            Some(value) => format!("{:.1} {}", value, event.magnitude_type),
            None => String::new(),
        };
        let depth = event.depth.map(|d| format!("{:.1}", d)).unwrap_or_default();
        let article = row.article.map(|a| truncate(a, 60)).unwrap_or_default();

        table.add_row(vec![
            Cell::new(event.origin_time.format("%Y-%m-%d %H:%M:%S%.2f")).add_attribute(Attribute::Bold),
            Cell::new(format!("{:.3}", event.latitude)),
            Cell::new(format!("{:.3}", event.longitude)),
            Cell::new(depth),
            Cell::new(magnitude),
            Cell::new(&event.magnitude_reporting_agency),
            Cell::new(event.event_code.as_deref().unwrap_or("")),
            Cell::new(row.article_number.map(|n| n.to_string()).unwrap_or_default()),
            Cell::new(article),
        ]);
    }
    println!("{table}");
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() > max {
        let head: String = text.chars().take(max - 3).collect();
        format!("{}...", head)
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provenance_path() {
        assert_eq!(
            provenance_path(Path::new("out/events.json")),
            PathBuf::from("out/events_search.json")
        );
        assert_eq!(
            provenance_path(Path::new("events")),
            PathBuf::from("events_search.json")
        );
    }

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_cli_parses_bibli() {
        let cli = Cli::try_parse_from([
            "eq-fetch",
            "bibli",
            "--start-date",
            "2020-01-01",
            "--end-date",
            "2020-02-01",
            "--min-mag",
            "5",
            "--iter-search",
            "7",
        ])
        .unwrap();
        match cli.command {
            Commands::Bibli { window, .. } => {
                assert_eq!(window.iter_search, Some(7));
                let request = window.request();
                assert_eq!(request.min_mag, Some(5.0));
                assert!(request.resolve().is_ok());
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_date_with_window() {
        let parsed = Cli::try_parse_from([
            "eq-fetch",
            "hypo",
            "--date",
            "2020-01-01",
            "--start-date",
            "2020-01-01",
            "--end-date",
            "2020-01-02",
        ]);
        assert!(parsed.is_err());
    }
}
