use crate::database::models::{PriceObservation, TickerMetadata};
use crate::database::store::IndexStore;
use crate::market_data::yahoo::QuoteFetcher;
use anyhow::Result;
use chrono::{Duration, NaiveDate};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

/// Concurrent quote requests in flight at once.
const FETCH_CONCURRENCY: usize = 8;

/// Fetches market data and upserts it into the store. A ticker whose fetch
/// fails is dropped from the batch; the batch proceeds.
pub struct Ingestor {
    store: Arc<dyn IndexStore>,
    quotes: Arc<dyn QuoteFetcher>,
}

impl Ingestor {
    pub fn new(store: Arc<dyn IndexStore>, quotes: Arc<dyn QuoteFetcher>) -> Self {
        Self { store, quotes }
    }

    /// One-time bootstrap: metadata for every ticker, then `days` of closes
    /// ending at `end`, with market caps derived from shares outstanding.
    pub async fn bootstrap(&self, tickers: &[String], end: NaiveDate, days: i64) -> Result<()> {
        let mut metadata = Vec::with_capacity(tickers.len());
        for ticker in tickers {
            match self.quotes.metadata(ticker).await {
                Ok(row) => {
                    info!(
                        "Fetched metadata for {}: {}, {}, {} shares",
                        ticker, row.company_name, row.exchange, row.shares_outstanding
                    );
                    metadata.push(row);
                }
                Err(e) => warn!("Dropping {} from batch, metadata fetch failed: {}", ticker, e),
            }
        }
        self.store.upsert_ticker_metadata(&metadata).await?;

        let start = end - Duration::days(days);
        let prices = self.fetch_prices(&metadata, start, end).await;

        info!(
            "Bootstrap: inserting {} price rows for {} tickers",
            prices.len(),
            metadata.len()
        );
        self.store.upsert_prices(&prices).await?;
        Ok(())
    }

    /// Daily batch: closes for `date` for every known ticker. Returns the
    /// number of rows inserted; zero means the market was closed.
    pub async fn ingest_daily(&self, date: NaiveDate) -> Result<usize> {
        let metadata = self.store.get_ticker_metadata().await?;
        info!("Fetching prices for {} ({} tickers)", date, metadata.len());

        let prices = self.fetch_prices(&metadata, date, date).await;
        if prices.is_empty() {
            info!("No data fetched for {}. Market closed.", date);
            return Ok(0);
        }

        self.store.upsert_prices(&prices).await?;
        info!("Inserted {} price rows for {}", prices.len(), date);
        Ok(prices.len())
    }

    async fn fetch_prices(
        &self,
        metadata: &[TickerMetadata],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<PriceObservation> {
        let fetched: Vec<(String, f64, _)> = stream::iter(metadata)
            .map(|row| async move {
                let closes = self.quotes.daily_closes(&row.ticker, start, end).await;
                (row.ticker.clone(), row.shares_outstanding, closes)
            })
            .buffered(FETCH_CONCURRENCY)
            .collect()
            .await;

        let mut prices = Vec::new();
        for (ticker, outstanding, closes) in fetched {
            let closes = match closes {
                Ok(closes) => closes,
                Err(e) => {
                    warn!("Dropping {} from batch, price fetch failed: {}", ticker, e);
                    continue;
                }
            };

            for (date, close) in closes {
                prices.push(PriceObservation {
                    date,
                    ticker: ticker.clone(),
                    close_price: close,
                    // Market cap on the day is shares outstanding times close.
                    market_cap: outstanding * close,
                });
            }
        }

        prices
    }
}
