use crate::cache::memo::{cached_fetch, flush_pattern, IndexCache};
use crate::config::AppContext;
use crate::database::models::{CompositionDelta, IndexCompositionEntry, IndexPerformanceRecord};
use crate::database::store::IndexStore;
use crate::index::chain::{calendar_days, ReturnChainCalculator, RunReport};
use crate::index::composition::CompositionBuilder;
use crate::index::differ;
use crate::index::ranking::{RankingEngine, DEFAULT_INDEX_SIZE};
use anyhow::Result;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Orchestrates the build sequence and the cached read paths.
pub struct IndexService {
    store: Arc<dyn IndexStore>,
    cache: Arc<dyn IndexCache>,
    index_size: usize,
}

impl IndexService {
    pub fn new(ctx: &AppContext) -> Self {
        Self::with_index_size(
            Arc::clone(&ctx.store),
            Arc::clone(&ctx.cache),
            DEFAULT_INDEX_SIZE,
        )
    }

    pub fn with_index_size(
        store: Arc<dyn IndexStore>,
        cache: Arc<dyn IndexCache>,
        index_size: usize,
    ) -> Self {
        Self {
            store,
            cache,
            index_size,
        }
    }

    /// Builds the index for `[start, end]`: rank tickers, rebuild the
    /// composition table (global replace), wipe the performance table, run
    /// the return chain, then flush the domain's cache keys.
    ///
    /// The steps are not one transaction; a crash mid-sequence leaves the
    /// tables mutually inconsistent until the next successful build.
    pub async fn build(&self, start: NaiveDate, end: NaiveDate) -> Result<RunReport> {
        info!("Building index for {}..{}", start, end);

        let prices = self.store.get_prices_in_range(start, end).await?;
        let rankings = RankingEngine::new(self.index_size).rank(&prices);

        CompositionBuilder::new(Arc::clone(&self.store))
            .rebuild(&rankings)
            .await?;

        self.store.delete_all_performance().await?;

        let report = ReturnChainCalculator::with_index_size(
            Arc::clone(&self.store),
            self.index_size,
        )
        .run(start, end)
        .await?;

        // Everything cached before this point describes the old history.
        match self.cache.scan_delete(&flush_pattern()).await {
            Ok(count) => info!("Flushed {} cached index keys", count),
            Err(e) => warn!("Cache flush failed after rebuild: {}", e),
        }

        Ok(report)
    }

    /// Composition for a date, through the cache. Empty when the date has no
    /// composition rows.
    pub async fn composition(&self, date: NaiveDate) -> Result<Vec<IndexCompositionEntry>> {
        let store = Arc::clone(&self.store);
        let rows = cached_fetch(self.cache.as_ref(), "composition", date, move || async move {
            let rows = store.get_composition(date).await?;
            Ok((!rows.is_empty()).then_some(rows))
        })
        .await?;

        Ok(rows.unwrap_or_default())
    }

    /// Performance record for a date, through the cache. Absence is
    /// ambiguous: no trading that day, or that day's computation aborted.
    pub async fn performance_for(
        &self,
        date: NaiveDate,
    ) -> Result<Option<IndexPerformanceRecord>> {
        let store = Arc::clone(&self.store);
        cached_fetch(self.cache.as_ref(), "performance", date, move || async move {
            store.get_performance(date).await
        })
        .await
    }

    /// Performance rows over `[start, end]`, one per date that has a record.
    pub async fn performance_range(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<IndexPerformanceRecord>> {
        let mut records = Vec::new();
        for date in calendar_days(start, end) {
            if let Some(record) = self.performance_for(date).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Day-over-day membership changes over `[start, end]`. A date appears
    /// only when it and its previous trading date both have compositions and
    /// the ticker sets differ.
    pub async fn composition_changes(
        &self,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<BTreeMap<NaiveDate, CompositionDelta>> {
        let mut changes = BTreeMap::new();

        for date in calendar_days(start, end) {
            let current = self.composition(date).await?;
            if current.is_empty() {
                continue;
            }

            let prev_date = match self.store.prev_trading_date(date).await? {
                Some(prev) => prev,
                None => continue,
            };

            let previous = self.composition(prev_date).await?;
            if previous.is_empty() {
                continue;
            }

            if let Some(delta) = differ::diff(&current, &previous) {
                changes.insert(date, delta);
            }
        }

        Ok(changes)
    }
}
