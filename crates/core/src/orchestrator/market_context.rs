//! Market backdrop for the report: snapshots of the tickers the scenario
//! trades or marks.

use chrono::NaiveDate;
use deskagent_market_data::{EquitySnapshot, MarketDataError, MarketDataSource};
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::report::{MarketContext, MarketMovements};
use super::scenario::Scenario;

/// Tickers traded or marked in `scenario`, upper-cased, sorted, unique.
pub fn key_tickers(scenario: &Scenario) -> Vec<String> {
    let mut tickers: Vec<String> = scenario
        .trades
        .iter()
        .filter_map(|t| t.ticker_symbol())
        .chain(scenario.marks.iter().map(|m| m.symbol()))
        .filter(|t| !t.is_empty())
        .collect();
    tickers.sort();
    tickers.dedup();
    tickers
}

/// Latest trade or mark date in `scenario`.
pub fn context_date(scenario: &Scenario) -> Option<NaiveDate> {
    scenario
        .trades
        .iter()
        .filter_map(|t| t.trade_dt)
        .chain(scenario.marks.iter().map(|m| m.as_of_date))
        .max()
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

impl MarketMovements {
    pub fn from_snapshots(snapshots: &[EquitySnapshot]) -> Self {
        Self {
            avg_return_1d: mean(snapshots.iter().map(EquitySnapshot::return_1d_pct)),
            avg_return_5d: mean(snapshots.iter().map(EquitySnapshot::return_5d_pct)),
        }
    }
}

/// Per-ticker snapshot outcomes, in `tickers` order.
pub type SnapshotOutcomes = Vec<(String, Result<Option<EquitySnapshot>, MarketDataError>)>;

/// Fetches a snapshot per ticker as of `as_of`, keeping `tickers` order.
pub async fn fetch_snapshots(
    market: &dyn MarketDataSource,
    tickers: &[String],
    as_of: NaiveDate,
    concurrency: usize,
) -> SnapshotOutcomes {
    stream::iter(tickers)
        .map(|ticker| async move { (ticker.clone(), market.get_snapshot(ticker, as_of).await) })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

/// Folds snapshot outcomes into the report section. Failed and missing
/// tickers are listed as unavailable.
pub fn build_context(tickers: Vec<String>, outcomes: SnapshotOutcomes) -> MarketContext {
    let mut snapshots = Vec::new();
    let mut unavailable = Vec::new();
    for (ticker, outcome) in outcomes {
        match outcome {
            Ok(Some(snapshot)) => snapshots.push(snapshot),
            Ok(None) => {
                debug!("No snapshot for {}", ticker);
                unavailable.push(ticker);
            }
            Err(e) => {
                warn!("Snapshot for {} failed: {}", ticker, e);
                unavailable.push(ticker);
            }
        }
    }
    MarketContext {
        key_tickers: tickers,
        market_movements: MarketMovements::from_snapshots(&snapshots),
        snapshots,
        unavailable,
    }
}
