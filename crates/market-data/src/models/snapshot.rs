use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::types::Ticker;

/// Cache and lookup key: an upper-cased ticker on a calendar date.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PriceKey {
    pub ticker: Ticker,
    pub date: NaiveDate,
}

impl PriceKey {
    pub fn new(ticker: &str, date: NaiveDate) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            date,
        }
    }
}

/// Reference price for a ticker as of a date.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceSnapshot {
    pub ticker: Ticker,

    /// Closing price
    pub price: f64,

    /// Date the price was observed. May precede the requested date when the
    /// source falls back to the last trading day.
    pub date: NaiveDate,

    /// Source of the price (FINANCIAL_DATASETS, STATIC, etc.)
    pub source: String,
}

impl PriceSnapshot {
    pub fn new(ticker: &str, price: f64, date: NaiveDate, source: impl Into<String>) -> Self {
        Self {
            ticker: normalize_ticker(ticker),
            price,
            date,
            source: source.into(),
        }
    }
}

/// Price, short-horizon returns and company facts for a ticker.
///
/// Returns are multipliers: `1.01` means up 1%, `0.99` means down 1%.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub ticker: Ticker,
    pub price: f64,
    pub return_1d: f64,
    pub return_5d: f64,
    pub market_cap: f64,
    pub sector: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    pub date: NaiveDate,
    pub source: String,
}

impl EquitySnapshot {
    /// Snapshot with no return history and unknown company facts.
    pub fn from_price(price: &PriceSnapshot) -> Self {
        Self {
            ticker: price.ticker.clone(),
            price: price.price,
            return_1d: 1.0,
            return_5d: 1.0,
            market_cap: 0.0,
            sector: "Unknown".to_string(),
            industry: None,
            date: price.date,
            source: price.source.clone(),
        }
    }

    /// 1-day return as a signed percentage (1.012 -> 1.2).
    pub fn return_1d_pct(&self) -> f64 {
        (self.return_1d - 1.0) * 100.0
    }

    /// 5-day return as a signed percentage.
    pub fn return_5d_pct(&self) -> f64 {
        (self.return_5d - 1.0) * 100.0
    }
}

pub(crate) fn normalize_ticker(ticker: &str) -> Ticker {
    ticker.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_price_key_normalizes_ticker() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        assert_eq!(PriceKey::new(" aapl ", date), PriceKey::new("AAPL", date));
    }

    #[test]
    fn test_return_percentages() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        let mut snapshot = EquitySnapshot::from_price(&PriceSnapshot::new("MSFT", 400.0, date, "STATIC"));
        snapshot.return_1d = 1.02;
        snapshot.return_5d = 0.95;
        assert!((snapshot.return_1d_pct() - 2.0).abs() < 1e-9);
        assert!((snapshot.return_5d_pct() + 5.0).abs() < 1e-9);
        assert_eq!(snapshot.sector, "Unknown");
    }
}
