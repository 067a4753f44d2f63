use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One closing price observation. Unique per (date, ticker).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PriceObservation {
    pub date: NaiveDate,
    pub ticker: String,
    pub close_price: f64,
    pub market_cap: f64,
}

/// Per-ticker metadata, one row per ticker, upserted by ingestion.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TickerMetadata {
    pub ticker: String,
    pub company_name: String,
    pub exchange: String,
    pub active: bool,
    pub shares_outstanding: f64,
    pub weight: f64,
}

/// One member of the index on one day. A valid composition for a date has
/// exactly `index_size` entries, each with weight 1/index_size.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexCompositionEntry {
    pub date: NaiveDate,
    pub ticker: String,
    pub weight: f64,
}

/// Daily and compounded cumulative return for one date. At most one per date;
/// exists only if that date's chain computation succeeded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct IndexPerformanceRecord {
    pub date: NaiveDate,
    pub daily_return: f64,
    pub cumulative_return: f64,
}

/// Day-over-day ticker set delta between two composition snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompositionDelta {
    pub added: BTreeSet<String>,
    pub removed: BTreeSet<String>,
}
