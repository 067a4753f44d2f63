use crate::database::models::IndexCompositionEntry;
use crate::database::store::IndexStore;
use crate::index::ranking::RankedTicker;
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Turns per-day rankings into equal-weight composition rows and owns the
/// full-replace rebuild of the composition table.
pub struct CompositionBuilder {
    store: Arc<dyn IndexStore>,
}

impl CompositionBuilder {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self { store }
    }

    /// Every selected ticker gets weight 1/count for its day, independent of
    /// its market cap. Market cap only decided membership.
    pub fn build_rows(
        rankings: &BTreeMap<NaiveDate, Vec<RankedTicker>>,
    ) -> Vec<IndexCompositionEntry> {
        let mut rows = Vec::new();
        for (date, tickers) in rankings {
            if tickers.is_empty() {
                continue;
            }
            let weight = 1.0 / tickers.len() as f64;
            for ranked in tickers {
                rows.push(IndexCompositionEntry {
                    date: *date,
                    ticker: ranked.ticker.clone(),
                    weight,
                });
            }
        }
        rows
    }

    /// Replaces the composition table wholesale: deletes every existing row,
    /// not just the rebuilt range, then inserts the new rows. Callers must
    /// not read composition data until this returns.
    pub async fn rebuild(
        &self,
        rankings: &BTreeMap<NaiveDate, Vec<RankedTicker>>,
    ) -> Result<usize> {
        let rows = Self::build_rows(rankings);

        self.store.delete_all_composition().await?;
        self.store.insert_composition(&rows).await?;

        info!(
            "Rebuilt index composition: {} rows over {} days",
            rows.len(),
            rankings.len()
        );
        Ok(rows.len())
    }
}
