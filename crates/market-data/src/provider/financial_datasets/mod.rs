//! FinancialDatasets.ai provider implementation.
//!
//! # API Endpoints
//!
//! - Daily prices: `https://api.financialdatasets.ai/prices?ticker={t}&interval=day&interval_multiplier=1&start_date={d-10}&end_date={d}`
//! - Company facts: `https://api.financialdatasets.ai/company/facts?ticker={t}`
//!
//! Authentication uses the `X-API-KEY` header.
//!
//! # Response Format
//!
//! Prices come back oldest first as `{"prices": [{"close", "volume", "time"}, ...]}`.
//! Rows with zero volume are non-trading days and are skipped. The last
//! remaining close is the price as of the requested date, and the 1-day and
//! 5-day returns are computed against the 2nd and 6th closes from the end.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, NaiveDate};
use log::{debug, warn};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::errors::MarketDataError;
use crate::models::normalize_ticker;
use crate::models::{EquitySnapshot, PriceSnapshot};
use crate::provider::MarketDataSource;

const BASE_URL: &str = "https://api.financialdatasets.ai";
const PROVIDER_ID: &str = "FINANCIAL_DATASETS";

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Calendar days requested so that at least six trading days come back.
const LOOKBACK_DAYS: i64 = 10;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PricesResponse {
    Wrapped { prices: Vec<PriceRow> },
    Bare(Vec<PriceRow>),
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    close: Option<f64>,
    #[serde(default)]
    volume: Option<f64>,
    #[serde(default)]
    time: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CompanyFactsResponse {
    company_facts: Option<CompanyFacts>,
}

#[derive(Debug, Default, Deserialize)]
struct CompanyFacts {
    #[serde(default)]
    market_cap: Option<f64>,
    #[serde(default)]
    sector: Option<String>,
    #[serde(default)]
    industry: Option<String>,
}

/// FinancialDatasets.ai source for daily equity prices and company facts.
pub struct FinancialDatasetsProvider {
    client: Client,
    api_key: String,
    base_url: String,
}

impl FinancialDatasetsProvider {
    /// Create a provider with the given API key.
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    /// Create a provider against a different host (staging, local mock).
    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// GET a JSON document. `Ok(None)` on HTTP 404.
    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Option<T>, MarketDataError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .client
            .get(&url)
            .header("X-API-KEY", &self.api_key)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    MarketDataError::timeout(PROVIDER_ID)
                } else {
                    MarketDataError::Network(e)
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            StatusCode::TOO_MANY_REQUESTS => {
                return Err(MarketDataError::RateLimited {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(MarketDataError::Unauthorized {
                    provider: PROVIDER_ID.to_string(),
                })
            }
            status if !status.is_success() => {
                return Err(MarketDataError::provider(
                    PROVIDER_ID,
                    format!("HTTP error: {}", status),
                ))
            }
            _ => {}
        }

        let text = response.text().await.map_err(MarketDataError::Network)?;
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, format!("Failed to parse response: {}", e)))
    }

    /// Trading-day closes up to `as_of`, oldest first.
    async fn fetch_closes(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Vec<(NaiveDate, f64)>, MarketDataError> {
        let start = as_of - ChronoDuration::days(LOOKBACK_DAYS);
        let params = [
            ("ticker", ticker.to_string()),
            ("interval", "day".to_string()),
            ("interval_multiplier", "1".to_string()),
            ("start_date", start.format("%Y-%m-%d").to_string()),
            ("end_date", as_of.format("%Y-%m-%d").to_string()),
            ("limit", LOOKBACK_DAYS.to_string()),
        ];
        let response: Option<PricesResponse> = self.fetch("/prices", &params).await?;
        Ok(response
            .map(|r| trading_closes(r, as_of))
            .unwrap_or_default())
    }

    async fn fetch_company_facts(&self, ticker: &str) -> Result<CompanyFacts, MarketDataError> {
        let response: Option<CompanyFactsResponse> = self
            .fetch("/company/facts", &[("ticker", ticker.to_string())])
            .await?;
        Ok(response.and_then(|r| r.company_facts).unwrap_or_default())
    }
}

/// Keeps rows with a positive close and volume. Rows without a parsable
/// date take `fallback`.
fn trading_closes(response: PricesResponse, fallback: NaiveDate) -> Vec<(NaiveDate, f64)> {
    let rows = match response {
        PricesResponse::Wrapped { prices } => prices,
        PricesResponse::Bare(prices) => prices,
    };
    rows.into_iter()
        .filter(|row| row.volume.unwrap_or(0.0) > 0.0)
        .filter_map(|row| {
            let close = row.close.filter(|c| *c > 0.0)?;
            let date = row
                .time
                .as_deref()
                .and_then(|t| t.get(..10))
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .unwrap_or(fallback);
            Some((date, close))
        })
        .collect()
}

fn returns_from_closes(closes: &[(NaiveDate, f64)]) -> (f64, f64) {
    let n = closes.len();
    let price = match closes.last() {
        Some((_, p)) => *p,
        None => return (1.0, 1.0),
    };
    let return_1d = if n >= 2 && closes[n - 2].1 > 0.0 {
        price / closes[n - 2].1
    } else {
        1.0
    };
    let return_5d = if n >= 6 && closes[n - 6].1 > 0.0 {
        price / closes[n - 6].1
    } else {
        1.0
    };
    (return_1d, return_5d)
}

#[async_trait]
impl MarketDataSource for FinancialDatasetsProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_price(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<PriceSnapshot>, MarketDataError> {
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(MarketDataError::InvalidRequest("empty ticker".to_string()));
        }

        let closes = self.fetch_closes(&ticker, as_of).await?;
        debug!("{}: {} trading closes for {} up to {}", PROVIDER_ID, closes.len(), ticker, as_of);
        Ok(closes
            .last()
            .map(|(date, price)| PriceSnapshot::new(&ticker, *price, *date, PROVIDER_ID)))
    }

    async fn get_snapshot(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<EquitySnapshot>, MarketDataError> {
        let ticker = normalize_ticker(ticker);
        let closes = self.fetch_closes(&ticker, as_of).await?;
        let (date, price) = match closes.last() {
            Some(last) => *last,
            None => return Ok(None),
        };

        let facts = match self.fetch_company_facts(&ticker).await {
            Ok(facts) => facts,
            Err(e) => {
                warn!("{}: company facts unavailable for {}: {}", PROVIDER_ID, ticker, e);
                CompanyFacts::default()
            }
        };

        let (return_1d, return_5d) = returns_from_closes(&closes);
        Ok(Some(EquitySnapshot {
            ticker,
            price,
            return_1d,
            return_5d,
            market_cap: facts.market_cap.unwrap_or(0.0),
            sector: facts.sector.unwrap_or_else(|| "Unknown".to_string()),
            industry: facts.industry.filter(|s| !s.is_empty()),
            date,
            source: PROVIDER_ID.to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_trading_closes_skips_zero_volume() {
        let json = r#"{"prices": [
            {"close": 100.0, "volume": 1000, "time": "2024-06-13T00:00:00Z"},
            {"close": 100.5, "volume": 0, "time": "2024-06-15T00:00:00Z"},
            {"close": 101.0, "volume": 900, "time": "2024-06-14"}
        ]}"#;
        let response: PricesResponse = serde_json::from_str(json).unwrap();
        let closes = trading_closes(response, date(2024, 6, 17));

        assert_eq!(closes, vec![(date(2024, 6, 13), 100.0), (date(2024, 6, 14), 101.0)]);
    }

    #[test]
    fn test_bare_list_response() {
        let json = r#"[{"close": 42.0, "volume": 1}]"#;
        let response: PricesResponse = serde_json::from_str(json).unwrap();
        assert_eq!(trading_closes(response, date(2024, 6, 17)), vec![(date(2024, 6, 17), 42.0)]);
    }

    #[test]
    fn test_returns_need_enough_history() {
        let d = date(2024, 6, 17);
        assert_eq!(returns_from_closes(&[]), (1.0, 1.0));
        assert_eq!(returns_from_closes(&[(d, 100.0)]), (1.0, 1.0));

        let closes: Vec<(NaiveDate, f64)> =
            [100.0, 101.0, 102.0, 103.0, 104.0, 105.0].iter().map(|p| (d, *p)).collect();
        let (r1, r5) = returns_from_closes(&closes);
        assert!((r1 - 105.0 / 104.0).abs() < 1e-12);
        assert!((r5 - 1.05).abs() < 1e-12);
    }
}
