use crate::index::service::IndexService;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::fs;
use std::path::Path;

use crate::index::chain::calendar_days;

#[derive(Debug, Serialize)]
struct PerformanceRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Daily_Return")]
    daily_return: f64,
    #[serde(rename = "Cumulative_Return")]
    cumulative_return: f64,
}

#[derive(Debug, Serialize)]
struct ChangeRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Change")]
    change: &'static str,
}

#[derive(Debug, Serialize)]
struct CompositionRow {
    #[serde(rename = "Date")]
    date: NaiveDate,
    #[serde(rename = "Ticker")]
    ticker: String,
    #[serde(rename = "Weight")]
    weight: f64,
}

#[derive(Debug, Default)]
pub struct ExportSummary {
    pub performance_rows: usize,
    pub change_rows: usize,
    pub composition_rows: usize,
}

/// Weight as a percentage, rounded to four decimal places.
fn weight_percent(weight: f64) -> f64 {
    (weight * 100.0 * 10_000.0).round() / 10_000.0
}

/// Writes the range's performance, composition changes, and daily
/// compositions as three CSV files under `dir`.
pub async fn export_range(
    service: &IndexService,
    start: NaiveDate,
    end: NaiveDate,
    dir: &Path,
) -> Result<ExportSummary> {
    fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory {}", dir.display()))?;

    let mut summary = ExportSummary::default();

    let mut writer = csv::Writer::from_path(dir.join("index_performance.csv"))?;
    for record in service.performance_range(start, end).await? {
        writer.serialize(PerformanceRow {
            date: record.date,
            daily_return: record.daily_return,
            cumulative_return: record.cumulative_return,
        })?;
        summary.performance_rows += 1;
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(dir.join("composition_changes.csv"))?;
    for (date, delta) in service.composition_changes(start, end).await? {
        for ticker in &delta.added {
            writer.serialize(ChangeRow {
                date,
                ticker: ticker.clone(),
                change: "ADDED",
            })?;
            summary.change_rows += 1;
        }
        for ticker in &delta.removed {
            writer.serialize(ChangeRow {
                date,
                ticker: ticker.clone(),
                change: "REMOVED",
            })?;
            summary.change_rows += 1;
        }
    }
    writer.flush()?;

    let mut writer = csv::Writer::from_path(dir.join("daily_compositions.csv"))?;
    for date in calendar_days(start, end) {
        for entry in service.composition(date).await? {
            writer.serialize(CompositionRow {
                date,
                ticker: entry.ticker,
                weight: weight_percent(entry.weight),
            })?;
            summary.composition_rows += 1;
        }
    }
    writer.flush()?;

    Ok(summary)
}
