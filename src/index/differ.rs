use crate::database::models::{CompositionDelta, IndexCompositionEntry};
use std::collections::BTreeSet;

/// Ticker set delta between two composition snapshots. Returns `None` when
/// the membership did not change, so gap days never emit an entry.
pub fn diff(
    current: &[IndexCompositionEntry],
    previous: &[IndexCompositionEntry],
) -> Option<CompositionDelta> {
    let current_tickers: BTreeSet<&str> =
        current.iter().map(|e| e.ticker.as_str()).collect();
    let previous_tickers: BTreeSet<&str> =
        previous.iter().map(|e| e.ticker.as_str()).collect();

    let added: BTreeSet<String> = current_tickers
        .difference(&previous_tickers)
        .map(|t| t.to_string())
        .collect();
    let removed: BTreeSet<String> = previous_tickers
        .difference(&current_tickers)
        .map(|t| t.to_string())
        .collect();

    if added.is_empty() && removed.is_empty() {
        None
    } else {
        Some(CompositionDelta { added, removed })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn composition(tickers: &[&str]) -> Vec<IndexCompositionEntry> {
        tickers
            .iter()
            .map(|t| IndexCompositionEntry {
                date: "2024-01-02".parse().unwrap(),
                ticker: t.to_string(),
                weight: 1.0 / tickers.len() as f64,
            })
            .collect()
    }

    #[test]
    fn reports_added_and_removed() {
        let current = composition(&["AAPL", "MSFT", "GOOG"]);
        let previous = composition(&["AAPL", "MSFT", "AMZN"]);

        let delta = diff(&current, &previous).unwrap();
        assert_eq!(delta.added, BTreeSet::from(["GOOG".to_string()]));
        assert_eq!(delta.removed, BTreeSet::from(["AMZN".to_string()]));
    }

    #[test]
    fn identical_membership_yields_no_entry() {
        let current = composition(&["AAPL", "MSFT"]);
        let previous = composition(&["MSFT", "AAPL"]);

        assert!(diff(&current, &previous).is_none());
    }

    #[test]
    fn weights_are_ignored() {
        let mut current = composition(&["AAPL", "MSFT"]);
        current[0].weight = 0.9;
        current[1].weight = 0.1;
        let previous = composition(&["AAPL", "MSFT"]);

        assert!(diff(&current, &previous).is_none());
    }
}
