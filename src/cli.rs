use crate::config::{AppConfig, AppContext};
use crate::export;
use crate::index::service::IndexService;
use crate::market_data::ingest::Ingestor;
use crate::market_data::sp500;
use crate::market_data::yahoo::QuoteClient;
use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "index-monitor")]
#[command(about = "Equal-weighted index monitor", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create database tables if they do not exist
    InitDb,

    /// Build index composition and performance for a date range
    Build {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,
    },

    /// Show index performance for a date range
    Performance {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,
    },

    /// Show index composition for a date
    Composition {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,
    },

    /// Show day-over-day composition changes for a date range
    Changes {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,
    },

    /// Export performance, changes and compositions as CSV files
    Export {
        /// Start date (YYYY-MM-DD)
        #[arg(long)]
        start_date: NaiveDate,

        /// End date (YYYY-MM-DD)
        #[arg(long)]
        end_date: NaiveDate,

        /// Output directory
        #[arg(long, default_value = "export")]
        output: PathBuf,
    },

    /// One-time populate: constituents, metadata and historical prices
    Bootstrap {
        /// Days of price history to fetch
        #[arg(long, default_value_t = 30)]
        days: i64,
    },

    /// Fetch and store closes for a single day (defaults to today)
    IngestDaily {
        /// Date (YYYY-MM-DD)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

/// Execute a command from the CLI.
pub async fn execute_command(command: Commands) -> Result<()> {
    let config = AppConfig::from_env()?;
    let ctx = AppContext::connect(&config).await?;

    match command {
        Commands::InitDb => {
            ctx.store.init_schema().await?;
            println!("Database schema initialized.");
        }

        Commands::Build { start_date, end_date } => {
            let report = IndexService::new(&ctx).build(start_date, end_date).await?;
            println!("Index built for {}..{}", start_date, end_date);
            println!(
                "Days: {} computed, {} skipped, {} aborted",
                report.computed, report.skipped, report.aborted
            );
        }

        Commands::Performance { start_date, end_date } => {
            let records = IndexService::new(&ctx)
                .performance_range(start_date, end_date)
                .await?;

            println!("{:<12} | {:>14} | {:>18}", "Date", "Daily Return", "Cumulative Return");
            println!("{:-<12}-+-{:-<14}-+-{:-<18}", "", "", "");
            for record in records {
                println!(
                    "{:<12} | {:>13.4}% | {:>17.4}%",
                    record.date,
                    record.daily_return * 100.0,
                    record.cumulative_return * 100.0
                );
            }
        }

        Commands::Composition { date } => {
            let entries = IndexService::new(&ctx).composition(date).await?;
            if entries.is_empty() {
                println!("No composition for {}", date);
            } else {
                println!("Composition for {} ({} members):", date, entries.len());
                for entry in entries {
                    println!("{:<8} {:>8.4}%", entry.ticker, entry.weight * 100.0);
                }
            }
        }

        Commands::Changes { start_date, end_date } => {
            let changes = IndexService::new(&ctx)
                .composition_changes(start_date, end_date)
                .await?;

            if changes.is_empty() {
                println!("No composition changes in {}..{}", start_date, end_date);
            }
            for (date, delta) in changes {
                println!("{}:", date);
                for ticker in &delta.added {
                    println!("  ADDED   {}", ticker);
                }
                for ticker in &delta.removed {
                    println!("  REMOVED {}", ticker);
                }
            }
        }

        Commands::Export { start_date, end_date, output } => {
            let service = IndexService::new(&ctx);
            let summary = export::export_range(&service, start_date, end_date, &output).await?;
            println!(
                "Exported to {}: {} performance rows, {} change rows, {} composition rows",
                output.display(),
                summary.performance_rows,
                summary.change_rows,
                summary.composition_rows
            );
        }

        Commands::Bootstrap { days } => {
            let tickers = sp500::fetch_constituents().await?;
            println!("Fetched {} constituent symbols", tickers.len());

            let ingestor = Ingestor::new(Arc::clone(&ctx.store), Arc::new(QuoteClient::new()?));
            ingestor
                .bootstrap(&tickers, Utc::now().date_naive(), days)
                .await?;
            println!("Bootstrap complete.");
        }

        Commands::IngestDaily { date } => {
            let date = date.unwrap_or_else(|| Utc::now().date_naive());
            let ingestor = Ingestor::new(Arc::clone(&ctx.store), Arc::new(QuoteClient::new()?));
            let inserted = ingestor.ingest_daily(date).await?;
            println!("Inserted {} price rows for {}", inserted, date);
        }
    }

    Ok(())
}
