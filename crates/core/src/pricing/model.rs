//! Mark and enriched mark models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::issues::Severity;

// =============================================================================
// Mark
// =============================================================================

/// An internally recorded price for a position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mark {
    pub ticker: String,
    pub internal_mark: f64,
    pub as_of_date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub portfolio_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instrument_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
}

impl Mark {
    pub fn new(ticker: &str, internal_mark: f64, as_of_date: NaiveDate) -> Self {
        Self {
            ticker: ticker.to_string(),
            internal_mark,
            as_of_date,
            source: None,
            notes: None,
            position_id: None,
            portfolio_id: None,
            instrument_type: None,
            currency: None,
        }
    }

    /// Trimmed, upper-cased ticker used for lookups and overrides.
    pub fn symbol(&self) -> String {
        self.ticker.trim().to_uppercase()
    }
}

// =============================================================================
// Classification
// =============================================================================

/// Outcome of comparing a mark with the market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Classification {
    Ok,
    ReviewNeeded,
    OutOfTolerance,
    StaleMark,
    NoMarketData,
}

impl Classification {
    pub const ALL: [Classification; 5] = [
        Classification::Ok,
        Classification::ReviewNeeded,
        Classification::OutOfTolerance,
        Classification::StaleMark,
        Classification::NoMarketData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::Ok => "OK",
            Classification::ReviewNeeded => "REVIEW_NEEDED",
            Classification::OutOfTolerance => "OUT_OF_TOLERANCE",
            Classification::StaleMark => "STALE_MARK",
            Classification::NoMarketData => "NO_MARKET_DATA",
        }
    }

    /// Ordering used when listing flagged tickers, most severe first.
    /// Not used to classify.
    pub fn report_rank(&self) -> u8 {
        match self {
            Classification::NoMarketData => 4,
            Classification::OutOfTolerance => 3,
            Classification::StaleMark => 2,
            Classification::ReviewNeeded => 1,
            Classification::Ok => 0,
        }
    }

    /// Status a classification contributes to the scenario fold.
    pub fn severity(&self) -> Severity {
        match self {
            Classification::Ok => Severity::Ok,
            Classification::ReviewNeeded | Classification::StaleMark => Severity::Warning,
            Classification::OutOfTolerance | Classification::NoMarketData => Severity::Error,
        }
    }

    pub fn is_flagged(&self) -> bool {
        *self != Classification::Ok
    }
}

impl std::fmt::Display for Classification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Enriched Mark
// =============================================================================

/// A mark with its market comparison and classification.
///
/// `market_price` is `None` exactly when the classification is
/// `NO_MARKET_DATA`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMark {
    #[serde(flatten)]
    pub mark: Mark,
    pub market_price: Option<f64>,
    pub deviation_absolute: Option<f64>,
    pub deviation_percentage: Option<f64>,
    pub classification: Classification,
    pub status: Severity,
    pub market_data_date: Option<NaiveDate>,
    pub market_data_source: Option<String>,
    #[serde(default)]
    pub tolerance_override_applied: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub explanation: String,
}

impl EnrichedMark {
    /// A mark that could not be compared with the market.
    pub fn no_market_data(mark: Mark, cause: &str, error: Option<String>) -> Self {
        let explanation = format!(
            "NO_MARKET_DATA: no market price for {} as of {} ({})",
            mark.symbol(),
            mark.as_of_date,
            cause
        );
        Self {
            mark,
            market_price: None,
            deviation_absolute: None,
            deviation_percentage: None,
            classification: Classification::NoMarketData,
            status: Classification::NoMarketData.severity(),
            market_data_date: None,
            market_data_source: None,
            tolerance_override_applied: false,
            error,
            explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_serializes_screaming_snake() {
        let json = serde_json::to_string(&Classification::OutOfTolerance).unwrap();
        assert_eq!(json, "\"OUT_OF_TOLERANCE\"");
        for c in Classification::ALL {
            assert_eq!(serde_json::to_string(&c).unwrap(), format!("\"{}\"", c.as_str()));
        }
    }

    #[test]
    fn test_report_rank_order() {
        let mut all = Classification::ALL.to_vec();
        all.sort_by_key(|c| std::cmp::Reverse(c.report_rank()));
        assert_eq!(
            all,
            vec![
                Classification::NoMarketData,
                Classification::OutOfTolerance,
                Classification::StaleMark,
                Classification::ReviewNeeded,
                Classification::Ok,
            ]
        );
    }

    #[test]
    fn test_enriched_mark_json_is_flat() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        let enriched = EnrichedMark::no_market_data(Mark::new("XYZ", 10.0, date), "not found", None);
        let value = serde_json::to_value(&enriched).unwrap();
        assert_eq!(value["ticker"], "XYZ");
        assert_eq!(value["classification"], "NO_MARKET_DATA");
        assert_eq!(value["status"], "ERROR");
        assert!(value["market_price"].is_null());
        assert!(value.get("error").is_none());
    }
}
