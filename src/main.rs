//! # Scan Resolver CLI (`scanr`)
//!
//! Command-line interface to the scan identification and confidence
//! resolution engine.
//!
//! ## Usage
//!
//! ```bash
//! scanr --config ./config/scanr.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `scanr init` | Create the SQLite database and run schema migrations |
//! | `scanr resolve "<input>"` | Resolve a raw scan input to a catalog item |
//! | `scanr confirm "<input>" ...` | Record a human-confirmed selection |
//! | `scanr corrections list` | Inspect the correction memory |
//! | `scanr serve` | Start the JSON HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the database
//! scanr init
//!
//! # Resolve with a publisher hint and diagnostics
//! scanr resolve "Amazing Spider-Man #300" --publisher-hint Marvel --diagnostics
//!
//! # Confirm a pick offered by a previous resolve
//! scanr confirm "batman 423" --source-id issue:901 --series "Batman" \
//!     --issue 423 --year 1988 --publisher "DC Comics"
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use scan_resolver::catalog::{CatalogClient, HttpCatalogClient};
use scan_resolver::models::{
    PublisherFilter, ResourceKind, Resolution, ScanContext, ScanFormat, SelectedItem,
};
use scan_resolver::resolve::ResolveOptions;
use scan_resolver::{config, corrections, db, migrate, normalize, resolve, server};

/// Scan Resolver — resolves noisy collectible descriptions to catalog items
/// with explainable confidence scores.
#[derive(Parser)]
#[command(
    name = "scanr",
    about = "Scan identification & confidence resolution engine",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/scanr.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema.
    ///
    /// Creates the SQLite database file and the correction-memory tables.
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Resolve a raw scan input.
    ///
    /// Parses the input, consults correction memory, queries the catalog,
    /// scores candidates, and reports one of: auto-resolved, needs
    /// confirmation, or no match.
    Resolve {
        /// Raw input text (user-typed or OCR output).
        input: String,

        /// Publisher hint to fold into scoring (e.g. `Marvel`).
        #[arg(long)]
        publisher_hint: Option<String>,

        /// Session publisher filter: `marvel`, `dc`, or `indie`.
        /// Re-ranks candidates, never removes any.
        #[arg(long)]
        filter: Option<String>,

        /// Packaging format of the scanned item: `raw` or `slab`.
        #[arg(long, default_value = "raw")]
        format: String,

        /// Candidate reported as a wrong match; it will not be offered
        /// again and the outcome is forced to confirmation.
        #[arg(long)]
        reported_wrong: Option<String>,

        /// Print the full scored/rejected candidate list as JSON.
        #[arg(long)]
        diagnostics: bool,
    },

    /// Record a human-confirmed selection for an input.
    ///
    /// Writes a correction record; any future input normalizing to the same
    /// key resolves instantly at confidence 100.
    Confirm {
        /// The raw input that was being resolved.
        input: String,

        /// Catalog id of the selected item (e.g. `issue:901`).
        #[arg(long)]
        source_id: String,

        /// Series name of the selection.
        #[arg(long)]
        series: String,

        /// Record kind: `volume` or `issue`.
        #[arg(long, default_value = "issue")]
        kind: String,

        #[arg(long)]
        issue: Option<String>,

        #[arg(long)]
        year: Option<i32>,

        #[arg(long)]
        publisher: Option<String>,

        /// Cover image reference of the selection.
        #[arg(long)]
        cover: Option<String>,

        /// Confidence the engine had reached before the human pick.
        #[arg(long, default_value_t = 0.0)]
        confidence: f64,
    },

    /// Inspect the correction memory.
    Corrections {
        #[command(subcommand)]
        action: CorrectionsAction,
    },

    /// Start the JSON HTTP API.
    ///
    /// Binds to `[server].bind` from the config file. Requires the catalog
    /// API credential environment variable to be set.
    Serve,
}

#[derive(Subcommand)]
enum CorrectionsAction {
    /// List correction records, newest first.
    List {
        /// Show only records whose key matches this raw input's
        /// normalized form.
        #[arg(long)]
        key_for: Option<String>,

        /// Maximum number of records to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "scan_resolver=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            pool.close().await;
            println!("Database initialized successfully.");
        }
        Commands::Resolve {
            input,
            publisher_hint,
            filter,
            format,
            reported_wrong,
            diagnostics,
        } => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;
            let catalog: Arc<dyn CatalogClient> =
                Arc::new(HttpCatalogClient::new(&cfg.catalog)?);

            let options = ResolveOptions {
                publisher_hint,
                context: ScanContext {
                    publisher_filter: filter
                        .as_deref()
                        .map(PublisherFilter::parse)
                        .transpose()?,
                    format: ScanFormat::parse(&format)?,
                },
                reported_wrong_source_id: reported_wrong,
                diagnostics,
            };

            let outcome = resolve::resolve_scan(&pool, catalog, &cfg, &input, &options).await;
            print_resolution(&outcome.resolution);

            if let Some(report) = outcome.diagnostics {
                println!("{}", serde_json::to_string_pretty(&report)?);
            }
            pool.close().await;
        }
        Commands::Confirm {
            input,
            source_id,
            series,
            kind,
            issue,
            year,
            publisher,
            cover,
            confidence,
        } => {
            let pool = db::connect(&cfg.db.path).await?;
            migrate::run_migrations(&pool).await?;

            let selected = SelectedItem {
                source_id,
                resource_kind: ResourceKind::parse(&kind)?,
                series_name: series,
                issue_number: issue,
                year,
                publisher,
                cover_image_ref: cover,
            };

            let resolution =
                resolve::confirm_selection(&pool, &input, selected, confidence).await;
            print_resolution(&resolution);
            println!(
                "Correction recorded for key \"{}\".",
                normalize::normalize_key(&input)
            );
            pool.close().await;
        }
        Commands::Corrections { action } => match action {
            CorrectionsAction::List { key_for, limit } => {
                let pool = db::connect(&cfg.db.path).await?;
                migrate::run_migrations(&pool).await?;

                let key = key_for.as_deref().map(normalize::normalize_key);
                let records = corrections::list(&pool, key.as_deref(), limit).await?;

                if records.is_empty() {
                    println!("No corrections.");
                } else {
                    for rec in records {
                        println!(
                            "{}  {}  \"{}\" -> {} {}{}",
                            rec.created_at.format("%Y-%m-%d %H:%M:%S"),
                            rec.normalized_key,
                            rec.source_raw_input,
                            rec.selected.series_name,
                            rec.selected
                                .issue_number
                                .as_deref()
                                .map(|n| format!("#{}", n))
                                .unwrap_or_default(),
                            rec.selected
                                .publisher
                                .as_deref()
                                .map(|p| format!(" ({})", p))
                                .unwrap_or_default(),
                        );
                    }
                }
                pool.close().await;
            }
        },
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}

fn print_resolution(resolution: &Resolution) {
    match resolution {
        Resolution::AutoResolved {
            candidate,
            confidence,
        } => {
            println!(
                "Auto-resolved [{:.1}%] {}{}{}",
                confidence,
                candidate.series_name,
                candidate
                    .issue_number
                    .as_deref()
                    .map(|n| format!(" #{}", n))
                    .unwrap_or_default(),
                candidate
                    .publisher
                    .as_deref()
                    .map(|p| format!(" — {}", p))
                    .unwrap_or_default(),
            );
        }
        Resolution::NeedsConfirmation { candidates } => {
            println!("Needs confirmation — pick one:");
            for (i, c) in candidates.iter().enumerate() {
                let signals: Vec<&str> = c.signals.iter().map(|s| s.label()).collect();
                println!(
                    "{}. [{:.2}] {}{}{}  {}  (id: {})",
                    i + 1,
                    c.candidate.score,
                    c.candidate.series_name,
                    c.candidate
                        .issue_number
                        .as_deref()
                        .map(|n| format!(" #{}", n))
                        .unwrap_or_default(),
                    c.candidate
                        .year
                        .map(|y| format!(" ({})", y))
                        .unwrap_or_default(),
                    if signals.is_empty() {
                        String::new()
                    } else {
                        format!("[{}]", signals.join(", "))
                    },
                    c.candidate.source_id,
                );
            }
            println!("Confirm with: scanr confirm \"<input>\" --source-id <id> --series <name> ...");
        }
        Resolution::NoMatch { reason } => match reason {
            scan_resolver::models::NoMatchReason::SearchFailed => {
                println!("Search failed — the catalog could not be reached. Try again later.");
            }
            _ => {
                println!(
                    "No match found. Adjust the input or enter the title and issue manually."
                );
            }
        },
    }
}
