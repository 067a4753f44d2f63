use crate::database::models::IndexPerformanceRecord;
use crate::database::store::IndexStore;
use crate::index::ranking::DEFAULT_INDEX_SIZE;
use anyhow::Result;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{debug, info};

/// Why a date was skipped without an abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No composition rows for the date, or not exactly index_size of them.
    NoComposition,
}

/// Why a date's computation was discarded wholesale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    /// A required close-price pair was missing, or fewer than index_size
    /// tickers contributed.
    IncompleteData,
    /// The previous trading date has no stored performance record, so the
    /// chain cannot extend to this date.
    MissingPredecessor,
}

/// Outcome of processing one calendar date. Only `Computed` writes a row;
/// the other variants leave the performance table untouched for that date.
#[derive(Debug, Clone, PartialEq)]
pub enum DayOutcome {
    Computed(IndexPerformanceRecord),
    Skipped(SkipReason),
    Aborted(AbortReason),
}

/// Per-run tally of day outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunReport {
    pub computed: usize,
    pub skipped: usize,
    pub aborted: usize,
}

impl RunReport {
    fn record(&mut self, outcome: &DayOutcome) {
        match outcome {
            DayOutcome::Computed(_) => self.computed += 1,
            DayOutcome::Skipped(_) => self.skipped += 1,
            DayOutcome::Aborted(_) => self.aborted += 1,
        }
    }
}

/// Lazily produced sequence of every calendar day in `[start, end]`,
/// trading day or not.
pub fn calendar_days(start: NaiveDate, end: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    start.iter_days().take_while(move |d| *d <= end)
}

/// Walks calendar dates in ascending order, computing daily and compounded
/// cumulative returns under all-or-nothing completeness rules.
///
/// The chain is inherently sequential: a date's cumulative return reads the
/// previous trading date's stored record, so one logical pass must visit the
/// dates in increasing order.
pub struct ReturnChainCalculator {
    store: Arc<dyn IndexStore>,
    index_size: usize,
}

impl ReturnChainCalculator {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self::with_index_size(store, DEFAULT_INDEX_SIZE)
    }

    pub fn with_index_size(store: Arc<dyn IndexStore>, index_size: usize) -> Self {
        Self { store, index_size }
    }

    /// Runs the chain over every calendar day in `[start, end]`.
    pub async fn run(&self, start: NaiveDate, end: NaiveDate) -> Result<RunReport> {
        let mut report = RunReport::default();

        for date in calendar_days(start, end) {
            let outcome = self.compute_day(date).await?;
            debug!("Chain outcome for {}: {:?}", date, outcome);
            report.record(&outcome);
        }

        info!(
            "Return chain {}..{}: {} computed, {} skipped, {} aborted",
            start, end, report.computed, report.skipped, report.aborted
        );
        Ok(report)
    }

    /// Processes a single date. Writing happens only for `Computed`; an
    /// aborted day discards everything, never a partial record.
    pub async fn compute_day(&self, date: NaiveDate) -> Result<DayOutcome> {
        let composition = self.store.get_composition(date).await?;
        if composition.len() != self.index_size {
            return Ok(DayOutcome::Skipped(SkipReason::NoComposition));
        }

        let prev_date = match self.store.prev_trading_date(date).await? {
            Some(prev) => prev,
            None => {
                // First trading day of the built history anchors the chain.
                let record = IndexPerformanceRecord {
                    date,
                    daily_return: 0.0,
                    cumulative_return: 0.0,
                };
                self.store.upsert_performance(&record).await?;
                return Ok(DayOutcome::Computed(record));
            }
        };

        let mut daily_return = 0.0;
        let mut contributions = 0usize;

        for entry in &composition {
            let (today_close, prev_close) = match self
                .store
                .get_close_pair(&entry.ticker, date, prev_date)
                .await?
            {
                Some(pair) => pair,
                None => return Ok(DayOutcome::Aborted(AbortReason::IncompleteData)),
            };

            // A close of zero (or worse) cannot anchor a return; the pair is
            // as unusable as a missing one.
            if prev_close <= 0.0 || !prev_close.is_finite() || !today_close.is_finite() {
                return Ok(DayOutcome::Aborted(AbortReason::IncompleteData));
            }

            daily_return += entry.weight * (today_close / prev_close - 1.0);
            contributions += 1;
        }

        if contributions != self.index_size {
            return Ok(DayOutcome::Aborted(AbortReason::IncompleteData));
        }

        let prev_record = match self.store.get_performance(prev_date).await? {
            Some(record) => record,
            None => return Ok(DayOutcome::Aborted(AbortReason::MissingPredecessor)),
        };

        // Geometric compounding, never additive.
        let cumulative_return =
            (1.0 + prev_record.cumulative_return) * (1.0 + daily_return) - 1.0;

        let record = IndexPerformanceRecord {
            date,
            daily_return,
            cumulative_return,
        };
        self.store.upsert_performance(&record).await?;

        Ok(DayOutcome::Computed(record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::models::{IndexCompositionEntry, PriceObservation};
    use crate::database::store::MemoryStore;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    async fn seed_composition(store: &MemoryStore, d: &str, tickers: &[&str]) {
        let weight = 1.0 / tickers.len() as f64;
        let rows: Vec<IndexCompositionEntry> = tickers
            .iter()
            .map(|t| IndexCompositionEntry {
                date: date(d),
                ticker: t.to_string(),
                weight,
            })
            .collect();
        store.insert_composition(&rows).await.unwrap();
    }

    async fn seed_price(store: &MemoryStore, d: &str, ticker: &str, close: f64) {
        store
            .upsert_prices(&[PriceObservation {
                date: date(d),
                ticker: ticker.to_string(),
                close_price: close,
                market_cap: 0.0,
            }])
            .await
            .unwrap();
    }

    fn calc(store: &Arc<MemoryStore>, index_size: usize) -> ReturnChainCalculator {
        ReturnChainCalculator::with_index_size(
            Arc::clone(store) as Arc<dyn IndexStore>,
            index_size,
        )
    }

    #[test]
    fn calendar_days_cover_every_day_inclusive() {
        let days: Vec<NaiveDate> =
            calendar_days(date("2024-01-30"), date("2024-02-02")).collect();
        assert_eq!(
            days,
            vec![
                date("2024-01-30"),
                date("2024-01-31"),
                date("2024-02-01"),
                date("2024-02-02"),
            ]
        );
    }

    #[tokio::test]
    async fn date_without_composition_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        let outcome = calc(&store, 2).compute_day(date("2024-01-02")).await.unwrap();

        assert_eq!(outcome, DayOutcome::Skipped(SkipReason::NoComposition));
        assert!(store.get_performance(date("2024-01-02")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn undersized_composition_is_skipped() {
        let store = Arc::new(MemoryStore::new());
        seed_composition(&store, "2024-01-02", &["AAPL"]).await;

        let outcome = calc(&store, 2).compute_day(date("2024-01-02")).await.unwrap();
        assert_eq!(outcome, DayOutcome::Skipped(SkipReason::NoComposition));
    }

    #[tokio::test]
    async fn first_trading_day_writes_zeroes() {
        let store = Arc::new(MemoryStore::new());
        seed_composition(&store, "2024-01-02", &["AAPL", "MSFT"]).await;

        let outcome = calc(&store, 2).compute_day(date("2024-01-02")).await.unwrap();

        match outcome {
            DayOutcome::Computed(record) => {
                assert_eq!(record.daily_return, 0.0);
                assert_eq!(record.cumulative_return, 0.0);
            }
            other => panic!("expected Computed, got {:?}", other),
        }
        let stored = store.get_performance(date("2024-01-02")).await.unwrap();
        assert!(stored.is_some());
    }

    #[tokio::test]
    async fn normal_day_compounds_on_previous_cumulative() {
        let store = Arc::new(MemoryStore::new());
        let calc = calc(&store, 2);

        seed_composition(&store, "2024-01-02", &["AAPL", "MSFT"]).await;
        seed_composition(&store, "2024-01-03", &["AAPL", "MSFT"]).await;
        seed_composition(&store, "2024-01-04", &["AAPL", "MSFT"]).await;

        // +2% then +3% for both tickers.
        seed_price(&store, "2024-01-02", "AAPL", 100.0).await;
        seed_price(&store, "2024-01-02", "MSFT", 200.0).await;
        seed_price(&store, "2024-01-03", "AAPL", 102.0).await;
        seed_price(&store, "2024-01-03", "MSFT", 204.0).await;
        seed_price(&store, "2024-01-04", "AAPL", 105.06).await;
        seed_price(&store, "2024-01-04", "MSFT", 210.12).await;

        let report = calc.run(date("2024-01-02"), date("2024-01-04")).await.unwrap();
        assert_eq!(report.computed, 3);

        let day2 = store
            .get_performance(date("2024-01-03"))
            .await
            .unwrap()
            .unwrap();
        assert!((day2.daily_return - 0.02).abs() < 1e-9);
        assert!((day2.cumulative_return - 0.02).abs() < 1e-9);

        let day3 = store
            .get_performance(date("2024-01-04"))
            .await
            .unwrap()
            .unwrap();
        assert!((day3.daily_return - 0.03).abs() < 1e-9);
        // (1 + r1) * (1 + r2) - 1
        assert!((day3.cumulative_return - (1.02 * 1.03 - 1.0)).abs() < 1e-9);
    }

    #[tokio::test]
    async fn missing_price_pair_aborts_whole_day() {
        let store = Arc::new(MemoryStore::new());
        let calc = calc(&store, 2);

        seed_composition(&store, "2024-01-02", &["AAPL", "MSFT"]).await;
        seed_composition(&store, "2024-01-03", &["AAPL", "MSFT"]).await;

        seed_price(&store, "2024-01-02", "AAPL", 100.0).await;
        seed_price(&store, "2024-01-02", "MSFT", 200.0).await;
        seed_price(&store, "2024-01-03", "AAPL", 101.0).await;
        // MSFT close missing on 2024-01-03.

        let report = calc.run(date("2024-01-02"), date("2024-01-03")).await.unwrap();
        assert_eq!(report.computed, 1);
        assert_eq!(report.aborted, 1);

        // Aborted day has no row at all, not a partial one.
        assert!(store.get_performance(date("2024-01-03")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn zero_close_aborts_instead_of_compounding_infinity() {
        let store = Arc::new(MemoryStore::new());
        let calc = calc(&store, 2);

        seed_composition(&store, "2024-01-02", &["AAPL", "MSFT"]).await;
        seed_composition(&store, "2024-01-03", &["AAPL", "MSFT"]).await;

        // A corrupt ingested row: previous close of zero would divide into
        // an infinite return.
        seed_price(&store, "2024-01-02", "AAPL", 0.0).await;
        seed_price(&store, "2024-01-02", "MSFT", 200.0).await;
        seed_price(&store, "2024-01-03", "AAPL", 101.0).await;
        seed_price(&store, "2024-01-03", "MSFT", 202.0).await;

        let report = calc.run(date("2024-01-02"), date("2024-01-03")).await.unwrap();
        assert_eq!(report.computed, 1); // the first trading day only
        assert_eq!(report.aborted, 1);

        assert!(store.get_performance(date("2024-01-03")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn missing_predecessor_record_aborts() {
        let store = Arc::new(MemoryStore::new());
        let calc = calc(&store, 2);

        // The previous trading date has composition rows but no performance
        // record, so the chain has nothing to compound on.
        seed_composition(&store, "2024-01-02", &["AAPL", "MSFT"]).await;
        seed_composition(&store, "2024-01-03", &["AAPL", "MSFT"]).await;
        seed_price(&store, "2024-01-02", "AAPL", 100.0).await;
        seed_price(&store, "2024-01-02", "MSFT", 200.0).await;
        seed_price(&store, "2024-01-03", "AAPL", 101.0).await;
        seed_price(&store, "2024-01-03", "MSFT", 202.0).await;

        let outcome = calc.compute_day(date("2024-01-03")).await.unwrap();
        assert_eq!(outcome, DayOutcome::Aborted(AbortReason::MissingPredecessor));
    }

    #[tokio::test]
    async fn recomputing_a_day_overwrites_its_record() {
        let store = Arc::new(MemoryStore::new());
        let calc = calc(&store, 1);

        seed_composition(&store, "2024-01-02", &["AAPL"]).await;
        seed_composition(&store, "2024-01-03", &["AAPL"]).await;
        seed_price(&store, "2024-01-02", "AAPL", 100.0).await;
        seed_price(&store, "2024-01-03", "AAPL", 110.0).await;

        calc.run(date("2024-01-02"), date("2024-01-03")).await.unwrap();

        // Corrected close arrives; re-running the same date overwrites.
        seed_price(&store, "2024-01-03", "AAPL", 105.0).await;
        let outcome = calc.compute_day(date("2024-01-03")).await.unwrap();

        match outcome {
            DayOutcome::Computed(record) => {
                assert!((record.daily_return - 0.05).abs() < 1e-9);
            }
            other => panic!("expected Computed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn run_report_tallies_every_calendar_day() {
        let store = Arc::new(MemoryStore::new());
        let calc = calc(&store, 1);

        // 2024-01-05 (Fri) trading, 06..07 weekend gap, 08 trading.
        seed_composition(&store, "2024-01-05", &["AAPL"]).await;
        seed_composition(&store, "2024-01-08", &["AAPL"]).await;
        seed_price(&store, "2024-01-05", "AAPL", 100.0).await;
        seed_price(&store, "2024-01-08", "AAPL", 101.0).await;

        let report = calc.run(date("2024-01-05"), date("2024-01-08")).await.unwrap();
        assert_eq!(report.computed, 2);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.aborted, 0);
    }
}
