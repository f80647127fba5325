//! Deterministic in-memory market data source.
//!
//! Prices are keyed by ticker and date. Lookups can optionally fall back to
//! the latest price on or before the requested date within a lookback
//! window. Failures can be injected per ticker, and every call is counted,
//! which makes this source the test double for validators and the
//! orchestrator as well as the backing store for `--prices` files.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::errors::MarketDataError;
use crate::models::normalize_ticker;
use crate::models::{EquitySnapshot, PriceSnapshot, Ticker};
use crate::provider::MarketDataSource;

const PROVIDER_ID: &str = "STATIC";

/// How an injected failure presents itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InjectedFailure {
    /// Rate-limit style error, retryable.
    Transient,
    /// Provider error, not retryable.
    Permanent,
}

struct FailurePlan {
    kind: InjectedFailure,
    remaining: AtomicUsize,
}

/// One row of a static price file.
#[derive(Debug, Deserialize)]
struct PriceRecord {
    ticker: String,
    date: NaiveDate,
    price: f64,
}

/// In-memory [`MarketDataSource`].
///
/// # Example
///
/// ```ignore
/// let source = StaticMarketData::new()
///     .with_price("AAPL", date(2024, 6, 17), 151.0)
///     .with_failure("MSFT", InjectedFailure::Transient, 1);
/// ```
#[derive(Default)]
pub struct StaticMarketData {
    prices: HashMap<Ticker, BTreeMap<NaiveDate, f64>>,
    snapshots: HashMap<Ticker, EquitySnapshot>,
    failures: HashMap<Ticker, FailurePlan>,
    lookback_days: i64,
    delay: Option<Duration>,
    calls: AtomicUsize,
}

impl StaticMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads prices from a JSON list of `{ticker, date, price}` records.
    pub fn from_json_str(json: &str) -> Result<Self, MarketDataError> {
        let records: Vec<PriceRecord> = serde_json::from_str(json)
            .map_err(|e| MarketDataError::provider(PROVIDER_ID, e.to_string()))?;
        Ok(records
            .into_iter()
            .fold(Self::new(), |source, r| source.with_price(&r.ticker, r.date, r.price)))
    }

    pub fn with_price(mut self, ticker: &str, date: NaiveDate, price: f64) -> Self {
        self.prices
            .entry(normalize_ticker(ticker))
            .or_default()
            .insert(date, price);
        self
    }

    /// Overrides the snapshot returned for `ticker` regardless of date.
    pub fn with_snapshot(mut self, snapshot: EquitySnapshot) -> Self {
        self.snapshots
            .insert(normalize_ticker(&snapshot.ticker), snapshot);
        self
    }

    /// Fails the next `times` calls for `ticker`. `usize::MAX` fails forever.
    pub fn with_failure(mut self, ticker: &str, kind: InjectedFailure, times: usize) -> Self {
        self.failures.insert(
            normalize_ticker(ticker),
            FailurePlan {
                kind,
                remaining: AtomicUsize::new(times),
            },
        );
        self
    }

    /// Accept a price up to `days` calendar days before the requested date.
    pub fn with_lookback_days(mut self, days: i64) -> Self {
        self.lookback_days = days.max(0);
        self
    }

    /// Sleep before answering every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `get_price` / `get_snapshot` calls served so far.
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn take_failure(&self, ticker: &str) -> Option<MarketDataError> {
        let plan = self.failures.get(ticker)?;
        let mut remaining = plan.remaining.load(Ordering::SeqCst);
        loop {
            if remaining == 0 {
                return None;
            }
            let next = if remaining == usize::MAX {
                remaining
            } else {
                remaining - 1
            };
            match plan.remaining.compare_exchange(
                remaining,
                next,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break,
                Err(actual) => remaining = actual,
            }
        }
        Some(match plan.kind {
            InjectedFailure::Transient => MarketDataError::RateLimited {
                provider: PROVIDER_ID.to_string(),
            },
            InjectedFailure::Permanent => {
                MarketDataError::provider(PROVIDER_ID, format!("injected failure for {}", ticker))
            }
        })
    }

    /// Closes on or before `as_of` within the lookback window, oldest first.
    fn closes_until(&self, ticker: &str, as_of: NaiveDate) -> Vec<(NaiveDate, f64)> {
        self.prices
            .get(ticker)
            .map(|series| series.range(..=as_of).map(|(d, p)| (*d, *p)).collect())
            .unwrap_or_default()
    }

    fn lookup(&self, ticker: &str, as_of: NaiveDate) -> Option<(NaiveDate, f64)> {
        let (date, price) = *self.closes_until(ticker, as_of).last()?;
        if (as_of - date).num_days() <= self.lookback_days {
            Some((date, price))
        } else {
            None
        }
    }

    async fn begin_call(&self, ticker: &str) -> Result<Ticker, MarketDataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let ticker = normalize_ticker(ticker);
        if ticker.is_empty() {
            return Err(MarketDataError::InvalidRequest("empty ticker".to_string()));
        }
        match self.take_failure(&ticker) {
            Some(err) => Err(err),
            None => Ok(ticker),
        }
    }
}

#[async_trait]
impl MarketDataSource for StaticMarketData {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    async fn get_price(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<PriceSnapshot>, MarketDataError> {
        let ticker = self.begin_call(ticker).await?;
        Ok(self
            .lookup(&ticker, as_of)
            .map(|(date, price)| PriceSnapshot::new(&ticker, price, date, PROVIDER_ID)))
    }

    async fn get_snapshot(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<EquitySnapshot>, MarketDataError> {
        let ticker = self.begin_call(ticker).await?;
        if let Some(snapshot) = self.snapshots.get(&ticker) {
            return Ok(Some(snapshot.clone()));
        }
        let (date, price) = match self.lookup(&ticker, as_of) {
            Some(found) => found,
            None => return Ok(None),
        };
        let closes: Vec<f64> = self
            .closes_until(&ticker, as_of)
            .into_iter()
            .map(|(_, p)| p)
            .collect();

        let mut snapshot =
            EquitySnapshot::from_price(&PriceSnapshot::new(&ticker, price, date, PROVIDER_ID));
        let n = closes.len();
        if n >= 2 && closes[n - 2] > 0.0 {
            snapshot.return_1d = price / closes[n - 2];
        }
        if n >= 6 && closes[n - 6] > 0.0 {
            snapshot.return_5d = price / closes[n - 6];
        }
        Ok(Some(snapshot))
    }
}
