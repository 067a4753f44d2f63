//! Yahoo Finance quote client.
//!
//! Fetches daily closes from the v8 chart API and per-ticker metadata from
//! the quoteSummary API. Yahoo has no official API and response shapes change
//! without notice, hence the dedicated format error.

use crate::database::models::TickerMetadata;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("symbol not found: {0}")]
    SymbolNotFound(String),
    #[error("unexpected response shape: {0}")]
    ResponseFormat(String),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    close: Vec<Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResponse {
    #[serde(rename = "quoteSummary")]
    quote_summary: QuoteSummaryResult,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryResult {
    result: Option<Vec<QuoteSummaryData>>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct QuoteSummaryData {
    price: Option<PriceModule>,
    #[serde(rename = "defaultKeyStatistics")]
    key_statistics: Option<KeyStatisticsModule>,
}

#[derive(Debug, Deserialize)]
struct PriceModule {
    #[serde(rename = "longName")]
    long_name: Option<String>,
    #[serde(rename = "shortName")]
    short_name: Option<String>,
    #[serde(rename = "exchangeName")]
    exchange_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct KeyStatisticsModule {
    #[serde(rename = "sharesOutstanding")]
    shares_outstanding: Option<RawValue>,
}

#[derive(Debug, Deserialize)]
struct RawValue {
    raw: Option<f64>,
}

/// Quote source the ingestor works against. Implemented by `QuoteClient`
/// for production and by fakes in the ingestion tests.
#[async_trait]
pub trait QuoteFetcher: Send + Sync {
    /// Metadata for one ticker: company name, exchange, shares outstanding.
    async fn metadata(&self, symbol: &str) -> Result<TickerMetadata, FetchError>;

    /// Daily closes for `[start, end]`.
    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FetchError>;
}

/// HTTP client for Yahoo's quote endpoints with a bounded request timeout.
pub struct QuoteClient {
    client: reqwest::Client,
}

impl QuoteClient {
    pub fn new() -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self { client })
    }

    fn chart_url(symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        let start_ts = start
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        let end_ts = end
            .and_hms_opt(23, 59, 59)
            .map(|dt| dt.and_utc().timestamp())
            .unwrap_or_default();
        format!(
            "https://query2.finance.yahoo.com/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d"
        )
    }

    fn quote_summary_url(symbol: &str) -> String {
        format!(
            "https://query2.finance.yahoo.com/v10/finance/quoteSummary/{symbol}\
             ?modules=price,defaultKeyStatistics"
        )
    }
}

#[async_trait]
impl QuoteFetcher for QuoteClient {
    /// Days Yahoo reports without a close (halts, partial sessions) are
    /// dropped.
    async fn daily_closes(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, FetchError> {
        let url = Self::chart_url(symbol, start, end);
        let resp: ChartResponse = self.client.get(&url).send().await?.json().await?;

        let result = resp.chart.result.ok_or_else(|| match resp.chart.error {
            Some(err) if err.code == "Not Found" => {
                FetchError::SymbolNotFound(symbol.to_string())
            }
            Some(err) => {
                FetchError::ResponseFormat(format!("{}: {}", err.code, err.description))
            }
            None => FetchError::ResponseFormat("empty result with no error".into()),
        })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormat("result array is empty".into()))?;

        let timestamps = data
            .timestamp
            .ok_or_else(|| FetchError::ResponseFormat("no timestamps".into()))?;

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormat("no quote data".into()))?;

        let mut closes = Vec::with_capacity(timestamps.len());
        for (i, &ts) in timestamps.iter().enumerate() {
            let date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    FetchError::ResponseFormat(format!("invalid timestamp: {ts}"))
                })?;

            if let Some(Some(close)) = quote.close.get(i) {
                closes.push((date, *close));
            }
        }

        Ok(closes)
    }

    async fn metadata(&self, symbol: &str) -> Result<TickerMetadata, FetchError> {
        let url = Self::quote_summary_url(symbol);
        let resp: QuoteSummaryResponse = self.client.get(&url).send().await?.json().await?;

        let result = resp
            .quote_summary
            .result
            .ok_or_else(|| match resp.quote_summary.error {
                Some(err) if err.code == "Not Found" => {
                    FetchError::SymbolNotFound(symbol.to_string())
                }
                Some(err) => {
                    FetchError::ResponseFormat(format!("{}: {}", err.code, err.description))
                }
                None => FetchError::ResponseFormat("empty result with no error".into()),
            })?;

        let data = result
            .into_iter()
            .next()
            .ok_or_else(|| FetchError::ResponseFormat("result array is empty".into()))?;

        let price = data
            .price
            .ok_or_else(|| FetchError::ResponseFormat("no price module".into()))?;

        let company_name = price
            .long_name
            .or(price.short_name)
            .unwrap_or_default();
        let exchange = price.exchange_name.unwrap_or_default();
        let shares_outstanding = data
            .key_statistics
            .and_then(|stats| stats.shares_outstanding)
            .and_then(|value| value.raw)
            .unwrap_or(0.0);

        Ok(TickerMetadata {
            ticker: symbol.to_string(),
            company_name,
            exchange,
            // Constituents come off the live index list, so they are active.
            active: true,
            shares_outstanding,
            weight: 0.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chart_url_spans_the_whole_range() {
        let url = QuoteClient::chart_url(
            "AAPL",
            "2024-01-02".parse().unwrap(),
            "2024-01-03".parse().unwrap(),
        );
        assert!(url.contains("/chart/AAPL"));
        assert!(url.contains("interval=1d"));
        // period2 falls on the end of 2024-01-03, after period1.
        assert!(url.contains("period1=1704153600"));
    }

    #[test]
    fn chart_response_parses_closes_and_skips_nulls() {
        let body = r#"{
            "chart": {
                "result": [{
                    "timestamp": [1704153600, 1704240000],
                    "indicators": { "quote": [{ "close": [185.64, null] }] }
                }],
                "error": null
            }
        }"#;

        let resp: ChartResponse = serde_json::from_str(body).unwrap();
        let data = resp.chart.result.unwrap().into_iter().next().unwrap();
        assert_eq!(data.timestamp.unwrap().len(), 2);
        let quote = data.indicators.quote.into_iter().next().unwrap();
        assert_eq!(quote.close[0], Some(185.64));
        assert_eq!(quote.close[1], None);
    }

    #[test]
    fn quote_summary_response_parses_shares_outstanding() {
        let body = r#"{
            "quoteSummary": {
                "result": [{
                    "price": {
                        "longName": "Apple Inc.",
                        "shortName": "Apple",
                        "exchangeName": "NasdaqGS"
                    },
                    "defaultKeyStatistics": {
                        "sharesOutstanding": { "raw": 15550000000, "fmt": "15.55B" }
                    }
                }],
                "error": null
            }
        }"#;

        let resp: QuoteSummaryResponse = serde_json::from_str(body).unwrap();
        let data = resp.quote_summary.result.unwrap().into_iter().next().unwrap();
        assert_eq!(data.price.unwrap().long_name.as_deref(), Some("Apple Inc."));
        let shares = data
            .key_statistics
            .unwrap()
            .shares_outstanding
            .unwrap()
            .raw
            .unwrap();
        assert_eq!(shares, 15_550_000_000.0);
    }
}
