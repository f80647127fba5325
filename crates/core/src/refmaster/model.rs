//! Reference master domain models.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// Equity Reference
// =============================================================================

/// A canonical equity record from the reference master.
///
/// Identity is `symbol`, unique within a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityReference {
    pub symbol: String,
    pub isin: String,
    pub cusip: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cik: Option<String>,
    pub currency: String,
    pub exchange: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
    pub pricing_source: String,
}

impl EquityReference {
    /// Minimal record, mostly for tests and fixtures.
    pub fn new(symbol: &str, isin: &str, cusip: &str, exchange: &str) -> Self {
        Self {
            symbol: symbol.to_uppercase(),
            isin: isin.to_uppercase(),
            cusip: cusip.to_uppercase(),
            cik: None,
            currency: "USD".to_string(),
            exchange: exchange.to_uppercase(),
            name: None,
            country: Some("US".to_string()),
            sector: None,
            industry: None,
            pricing_source: "financialdatasets".to_string(),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_cik(mut self, cik: &str) -> Self {
        self.cik = Some(cik.to_string());
        self
    }

    pub fn with_currency(mut self, currency: &str) -> Self {
        self.currency = currency.to_uppercase();
        self
    }

    pub fn with_country(mut self, country: Option<&str>) -> Self {
        self.country = country.map(|c| c.to_uppercase());
        self
    }

    /// CIK zero-padded to 10 digits.
    pub fn padded_cik(&self) -> Option<String> {
        self.cik
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty() && c.chars().all(|ch| ch.is_ascii_digit()))
            .map(pad_cik)
    }
}

/// Zero-pads a numeric CIK to 10 digits.
pub fn pad_cik(cik: &str) -> String {
    format!("{:0>10}", cik.trim())
}

// =============================================================================
// Match Reason
// =============================================================================

/// Why a candidate matched. Serialized as snake_case tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    IsinExact,
    CusipExact,
    CikExact,
    SymbolExact,
    ExchangeMatch,
    CountryMatch,
    SymbolInText,
    NameMatch,
    ExchangeOnly,
    CountryOnly,
}

impl MatchReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchReason::IsinExact => "isin_exact",
            MatchReason::CusipExact => "cusip_exact",
            MatchReason::CikExact => "cik_exact",
            MatchReason::SymbolExact => "symbol_exact",
            MatchReason::ExchangeMatch => "exchange_match",
            MatchReason::CountryMatch => "country_match",
            MatchReason::SymbolInText => "symbol_in_text",
            MatchReason::NameMatch => "name_match",
            MatchReason::ExchangeOnly => "exchange_only",
            MatchReason::CountryOnly => "country_only",
        }
    }

    /// Reasons that count as exchange/country context for tie-breaking.
    pub fn is_context(&self) -> bool {
        matches!(
            self,
            MatchReason::ExchangeMatch
                | MatchReason::CountryMatch
                | MatchReason::ExchangeOnly
                | MatchReason::CountryOnly
        )
    }
}

// =============================================================================
// Normalization Result
// =============================================================================

/// A ranked candidate for a free-form identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationResult {
    pub equity: EquityReference,
    pub confidence: f64,
    pub reasons: BTreeSet<MatchReason>,
    pub ambiguous: bool,
}

impl NormalizationResult {
    pub fn symbol(&self) -> &str {
        &self.equity.symbol
    }

    pub fn has_reason(&self, reason: MatchReason) -> bool {
        self.reasons.contains(&reason)
    }

    pub(crate) fn has_context_match(&self) -> bool {
        self.reasons.iter().any(MatchReason::is_context)
    }
}

// =============================================================================
// Load Report
// =============================================================================

/// A reference row that failed to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    /// 1-based data row (header excluded for CSV, array index + 1 for JSON)
    pub row: usize,
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for RowError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "row {} field '{}': {}", self.row, self.field, self.message)
    }
}

/// Result of loading a reference table: good rows plus rejected ones.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    pub equities: Vec<EquityReference>,
    pub rejected: Vec<RowError>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_padded_cik() {
        let eq = EquityReference::new("AAPL", "US0378331005", "037833100", "NASDAQ").with_cik("320193");
        assert_eq!(eq.padded_cik().as_deref(), Some("0000320193"));
        assert_eq!(
            EquityReference::new("X", "US0000000000", "000000000", "NYSE").padded_cik(),
            None
        );
    }

    #[test]
    fn test_reason_serialization() {
        let json = serde_json::to_string(&MatchReason::SymbolInText).unwrap();
        assert_eq!(json, "\"symbol_in_text\"");
        assert_eq!(MatchReason::ExchangeMatch.as_str(), "exchange_match");
        assert!(MatchReason::CountryMatch.is_context());
        assert!(!MatchReason::SymbolExact.is_context());
    }
}
