//! Keyword intent classification and ticker extraction.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static TICKER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b([A-Z]{1,5})\b").expect("valid ticker regex"));

/// Single capital letters that read as words, not tickers.
const NOT_TICKERS: &[&str] = &["I", "A"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    DividendOverview,
    PricePerformanceSummary,
    VolatilityComparisonConvertible,
    FinancialsRevenueSummary,
    GenericUnhandled,
}

/// Checked in order; the first intent with a matching keyword wins.
const KEYWORDS: &[(Intent, &[&str])] = &[
    (Intent::DividendOverview, &["dividend", "yield", "ex-div", "payout"]),
    (
        Intent::PricePerformanceSummary,
        &["performance", "return", "ytd", "1m", "3m", "month", "quarter"],
    ),
    (Intent::VolatilityComparisonConvertible, &["vol", "risk"]),
    (
        Intent::FinancialsRevenueSummary,
        &["revenue", "fundamentals", "market cap", "sector"],
    ),
];

impl Intent {
    pub fn classify(question: &str) -> Intent {
        let lower = question.to_lowercase();
        KEYWORDS
            .iter()
            .find(|(_, words)| words.iter().any(|w| lower.contains(w)))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::GenericUnhandled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::DividendOverview => "dividend_overview",
            Intent::PricePerformanceSummary => "price_performance_summary",
            Intent::VolatilityComparisonConvertible => "volatility_comparison_convertible",
            Intent::FinancialsRevenueSummary => "financials_revenue_summary",
            Intent::GenericUnhandled => "generic_unhandled",
        }
    }
}

/// First ticker-looking token (1-5 capitals) in `question`.
pub fn extract_ticker(question: &str) -> Option<String> {
    TICKER_RE
        .captures_iter(question)
        .map(|c| c[1].to_string())
        .find(|t| !NOT_TICKERS.contains(&t.as_str()))
}
