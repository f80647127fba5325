//! Trade and trade-validation models.

use chrono::NaiveDate;
use deskagent_market_data::PriceLookup;
use serde::{Deserialize, Serialize};

use crate::issues::ValidationResult;

// =============================================================================
// Trade
// =============================================================================

/// A booked trade as found in a scenario.
///
/// Required fields are optional here so the required-field check can see
/// what is missing instead of the parser rejecting the record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub counterparty: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trade_dt: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settle_dt: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub side: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Trade {
    /// A fully populated trade.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        ticker: &str,
        quantity: f64,
        price: f64,
        currency: &str,
        counterparty: &str,
        trade_dt: NaiveDate,
        settle_dt: NaiveDate,
    ) -> Self {
        Self {
            trade_id: None,
            ticker: Some(ticker.to_string()),
            quantity: Some(quantity),
            price: Some(price),
            currency: Some(currency.to_string()),
            counterparty: Some(counterparty.to_string()),
            trade_dt: Some(trade_dt),
            settle_dt: Some(settle_dt),
            side: None,
            notes: None,
        }
    }

    pub fn with_id(mut self, trade_id: &str) -> Self {
        self.trade_id = Some(trade_id.to_string());
        self
    }

    /// Trimmed, upper-cased ticker when present and non-empty.
    pub fn ticker_symbol(&self) -> Option<String> {
        non_empty(self.ticker.as_deref()).map(|t| t.to_uppercase())
    }
}

/// Trimmed value when present and non-empty.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

// =============================================================================
// Trade Validation
// =============================================================================

/// Validation result for one trade plus the market lookup behind it.
#[derive(Debug, Clone, PartialEq)]
pub struct TradeValidation {
    pub result: ValidationResult,
    pub market: PriceLookup,
}
