use crate::database::models::PriceObservation;
use chrono::NaiveDate;
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Number of index members on a valid trading day.
pub const DEFAULT_INDEX_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct RankedTicker {
    pub ticker: String,
    pub market_cap: f64,
}

/// Ranks tickers by market cap per calendar day from raw price observations.
pub struct RankingEngine {
    top_n: usize,
}

impl RankingEngine {
    pub fn new(top_n: usize) -> Self {
        Self { top_n }
    }

    /// For each distinct date present, the top `top_n` tickers by market cap
    /// descending (fewer if fewer tickers have data that day). Ties break on
    /// ticker symbol ascending so repeated runs rank identically.
    pub fn rank(&self, prices: &[PriceObservation]) -> BTreeMap<NaiveDate, Vec<RankedTicker>> {
        let mut by_date: BTreeMap<NaiveDate, Vec<RankedTicker>> = BTreeMap::new();
        for price in prices {
            by_date.entry(price.date).or_default().push(RankedTicker {
                ticker: price.ticker.clone(),
                market_cap: price.market_cap,
            });
        }

        // Each day ranks independently.
        by_date
            .into_iter()
            .par_bridge()
            .map(|(date, mut tickers)| {
                tickers.sort_unstable_by(|a, b| {
                    b.market_cap
                        .partial_cmp(&a.market_cap)
                        .unwrap_or(Ordering::Equal)
                        .then_with(|| a.ticker.cmp(&b.ticker))
                });
                tickers.truncate(self.top_n);
                (date, tickers)
            })
            .collect()
    }
}

impl Default for RankingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_INDEX_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    fn obs(d: &str, ticker: &str, market_cap: f64) -> PriceObservation {
        PriceObservation {
            date: date(d),
            ticker: ticker.to_string(),
            close_price: 1.0,
            market_cap,
        }
    }

    #[test]
    fn ranks_by_market_cap_descending() {
        let prices = vec![
            obs("2024-01-02", "SMALL", 10.0),
            obs("2024-01-02", "BIG", 300.0),
            obs("2024-01-02", "MID", 50.0),
        ];

        let ranked = RankingEngine::new(2).rank(&prices);
        let day = &ranked[&date("2024-01-02")];

        assert_eq!(day.len(), 2);
        assert_eq!(day[0].ticker, "BIG");
        assert_eq!(day[1].ticker, "MID");
    }

    #[test]
    fn equal_market_caps_rank_by_ticker_ascending() {
        let prices = vec![
            obs("2024-01-02", "ZZZ", 100.0),
            obs("2024-01-02", "AAA", 100.0),
            obs("2024-01-02", "MMM", 100.0),
        ];

        let ranked = RankingEngine::new(3).rank(&prices);
        let tickers: Vec<&str> = ranked[&date("2024-01-02")]
            .iter()
            .map(|r| r.ticker.as_str())
            .collect();

        assert_eq!(tickers, vec!["AAA", "MMM", "ZZZ"]);
    }

    #[test]
    fn days_with_fewer_tickers_keep_what_they_have() {
        let prices = vec![
            obs("2024-01-02", "AAPL", 100.0),
            obs("2024-01-02", "MSFT", 90.0),
            obs("2024-01-03", "AAPL", 100.0),
        ];

        let ranked = RankingEngine::new(100).rank(&prices);

        assert_eq!(ranked[&date("2024-01-02")].len(), 2);
        assert_eq!(ranked[&date("2024-01-03")].len(), 1);
    }

    #[test]
    fn dates_without_observations_are_absent() {
        let prices = vec![obs("2024-01-02", "AAPL", 100.0)];
        let ranked = RankingEngine::default().rank(&prices);

        assert!(!ranked.contains_key(&date("2024-01-03")));
    }
}
