//! Shared market data cache.
//!
//! [`CachedMarketData`] wraps any [`MarketDataSource`] and memoizes answers
//! by `(ticker, date)`. It is safe to share across tasks:
//!
//! ```text
//! task A ─┐                       ┌─ first caller runs the fetch
//! task B ─┼─> DashMap<PriceKey, ──┤
//! task C ─┘     OnceCell<..>>     └─ others await the same cell
//! ```
//!
//! - Concurrent lookups for one key issue a single remote call.
//! - Found and not-found answers are cached for the lifetime of the cache.
//! - Errors are never cached, so a later attempt fetches again.
//! - Every remote call is bounded by a per-call timeout. An expired call
//!   surfaces as [`MarketDataError::Timeout`].
//!
//! The cache is unbounded. One orchestrator run touches tens to hundreds of
//! keys, so entries are not evicted.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use dashmap::DashMap;
use log::debug;
use tokio::sync::OnceCell;

use crate::errors::MarketDataError;
use crate::models::{EquitySnapshot, PriceKey, PriceSnapshot};
use crate::provider::MarketDataSource;

type Slot<T> = Arc<OnceCell<Option<T>>>;

/// Memoizing, timeout-bounded wrapper around a [`MarketDataSource`].
pub struct CachedMarketData {
    inner: Arc<dyn MarketDataSource>,
    timeout: Duration,
    prices: DashMap<PriceKey, Slot<PriceSnapshot>>,
    snapshots: DashMap<PriceKey, Slot<EquitySnapshot>>,
    remote_calls: AtomicUsize,
}

impl CachedMarketData {
    pub fn new(inner: Arc<dyn MarketDataSource>, timeout: Duration) -> Self {
        Self {
            inner,
            timeout,
            prices: DashMap::new(),
            snapshots: DashMap::new(),
            remote_calls: AtomicUsize::new(0),
        }
    }

    /// Number of calls forwarded to the wrapped source.
    pub fn remote_calls(&self) -> usize {
        self.remote_calls.load(Ordering::SeqCst)
    }

    /// Number of `(ticker, date)` price keys with a cached answer.
    pub fn cached_prices(&self) -> usize {
        self.prices.iter().filter(|e| e.value().initialized()).count()
    }

    fn slot<T>(map: &DashMap<PriceKey, Slot<T>>, key: &PriceKey) -> Slot<T> {
        map.entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn bounded<T, F>(&self, key: &PriceKey, call: F) -> Result<Option<T>, MarketDataError>
    where
        F: std::future::Future<Output = Result<Option<T>, MarketDataError>>,
    {
        self.remote_calls.fetch_add(1, Ordering::SeqCst);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                debug!(
                    "{}: fetch for {} on {} exceeded {:?}",
                    self.inner.id(),
                    key.ticker,
                    key.date,
                    self.timeout
                );
                Err(MarketDataError::timeout(self.inner.id()))
            }
        }
    }
}

#[async_trait]
impl MarketDataSource for CachedMarketData {
    fn id(&self) -> &'static str {
        self.inner.id()
    }

    async fn get_price(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<PriceSnapshot>, MarketDataError> {
        let key = PriceKey::new(ticker, as_of);
        let slot = Self::slot(&self.prices, &key);
        slot.get_or_try_init(|| self.bounded(&key, self.inner.get_price(&key.ticker, key.date)))
            .await
            .cloned()
    }

    async fn get_snapshot(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<EquitySnapshot>, MarketDataError> {
        let key = PriceKey::new(ticker, as_of);
        let slot = Self::slot(&self.snapshots, &key);
        slot.get_or_try_init(|| self.bounded(&key, self.inner.get_snapshot(&key.ticker, key.date)))
            .await
            .cloned()
    }
}
