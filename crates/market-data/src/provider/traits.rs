//! Market data source trait definition.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::errors::MarketDataError;
use crate::models::{EquitySnapshot, PriceSnapshot};

/// A source of reference prices and equity snapshots.
///
/// `Ok(None)` means the source answered and has nothing for the ticker on
/// that date. `Err` means the answer is unknown (network, rate limit,
/// timeout, bad payload); see [`MarketDataError::retry_class`].
///
/// # Example
///
/// ```ignore
/// let source: Arc<dyn MarketDataSource> = Arc::new(StaticMarketData::new());
/// match source.get_price("AAPL", as_of).await? {
///     Some(snapshot) => println!("{} @ {}", snapshot.ticker, snapshot.price),
///     None => println!("no market data"),
/// }
/// ```
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// Unique identifier for this source, used in logs and enriched output.
    fn id(&self) -> &'static str;

    /// Fetch the reference price for `ticker` as of `as_of`.
    async fn get_price(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<PriceSnapshot>, MarketDataError>;

    /// Fetch price, returns and company facts for `ticker` as of `as_of`.
    ///
    /// The default builds a snapshot from [`get_price`](Self::get_price)
    /// with flat returns and unknown facts.
    async fn get_snapshot(
        &self,
        ticker: &str,
        as_of: NaiveDate,
    ) -> Result<Option<EquitySnapshot>, MarketDataError> {
        Ok(self
            .get_price(ticker, as_of)
            .await?
            .map(|price| EquitySnapshot::from_price(&price)))
    }
}
