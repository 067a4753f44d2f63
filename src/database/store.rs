use crate::database::models::{
    IndexCompositionEntry, IndexPerformanceRecord, PriceObservation, TickerMetadata,
};
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Store contract the index engine relies on. Implemented by
/// `PostgresManager` for production and `MemoryStore` for tests.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Create tables and indices if they do not exist.
    async fn init_schema(&self) -> Result<()>;

    async fn upsert_ticker_metadata(&self, rows: &[TickerMetadata]) -> Result<()>;
    async fn get_ticker_metadata(&self) -> Result<Vec<TickerMetadata>>;

    async fn upsert_prices(&self, rows: &[PriceObservation]) -> Result<()>;
    async fn get_prices_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>>;

    /// Deletes every composition row in the table, not a date range.
    async fn delete_all_composition(&self) -> Result<()>;
    async fn insert_composition(&self, rows: &[IndexCompositionEntry]) -> Result<()>;
    async fn get_composition(&self, date: NaiveDate) -> Result<Vec<IndexCompositionEntry>>;

    /// Nearest earlier date that has any composition rows.
    async fn prev_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>>;

    /// Close prices for one ticker on (date, prev_date); None unless both exist.
    async fn get_close_pair(
        &self,
        ticker: &str,
        date: NaiveDate,
        prev_date: NaiveDate,
    ) -> Result<Option<(f64, f64)>>;

    async fn upsert_performance(&self, record: &IndexPerformanceRecord) -> Result<()>;
    async fn get_performance(&self, date: NaiveDate) -> Result<Option<IndexPerformanceRecord>>;
    async fn delete_all_performance(&self) -> Result<()>;
}

#[derive(Default)]
struct MemoryStoreInner {
    tickers: BTreeMap<String, TickerMetadata>,
    prices: BTreeMap<(NaiveDate, String), PriceObservation>,
    composition: BTreeMap<NaiveDate, Vec<IndexCompositionEntry>>,
    performance: BTreeMap<NaiveDate, IndexPerformanceRecord>,
}

/// In-memory store with the same upsert semantics as the Postgres
/// implementation. Used by the test suite.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryStoreInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for MemoryStore {
    async fn init_schema(&self) -> Result<()> {
        Ok(())
    }

    async fn upsert_ticker_metadata(&self, rows: &[TickerMetadata]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for row in rows {
            inner.tickers.insert(row.ticker.clone(), row.clone());
        }
        Ok(())
    }

    async fn get_ticker_metadata(&self) -> Result<Vec<TickerMetadata>> {
        let inner = self.inner.lock().await;
        Ok(inner.tickers.values().cloned().collect())
    }

    async fn upsert_prices(&self, rows: &[PriceObservation]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for row in rows {
            inner
                .prices
                .insert((row.date, row.ticker.clone()), row.clone());
        }
        Ok(())
    }

    async fn get_prices_in_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PriceObservation>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .prices
            .values()
            .filter(|p| p.date >= start && p.date <= end)
            .cloned()
            .collect())
    }

    async fn delete_all_composition(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.composition.clear();
        Ok(())
    }

    async fn insert_composition(&self, rows: &[IndexCompositionEntry]) -> Result<()> {
        let mut inner = self.inner.lock().await;
        for row in rows {
            inner
                .composition
                .entry(row.date)
                .or_default()
                .push(row.clone());
        }
        Ok(())
    }

    async fn get_composition(&self, date: NaiveDate) -> Result<Vec<IndexCompositionEntry>> {
        let inner = self.inner.lock().await;
        Ok(inner.composition.get(&date).cloned().unwrap_or_default())
    }

    async fn prev_trading_date(&self, date: NaiveDate) -> Result<Option<NaiveDate>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .composition
            .range(..date)
            .next_back()
            .map(|(d, _)| *d))
    }

    async fn get_close_pair(
        &self,
        ticker: &str,
        date: NaiveDate,
        prev_date: NaiveDate,
    ) -> Result<Option<(f64, f64)>> {
        let inner = self.inner.lock().await;
        let today = inner.prices.get(&(date, ticker.to_string()));
        let prev = inner.prices.get(&(prev_date, ticker.to_string()));
        Ok(match (today, prev) {
            (Some(t), Some(p)) => Some((t.close_price, p.close_price)),
            _ => None,
        })
    }

    async fn upsert_performance(&self, record: &IndexPerformanceRecord) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.performance.insert(record.date, record.clone());
        Ok(())
    }

    async fn get_performance(&self, date: NaiveDate) -> Result<Option<IndexPerformanceRecord>> {
        let inner = self.inner.lock().await;
        Ok(inner.performance.get(&date).cloned())
    }

    async fn delete_all_performance(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.performance.clear();
        Ok(())
    }
}
