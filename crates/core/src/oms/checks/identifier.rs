//! Identifier resolution check.

use async_trait::async_trait;

use crate::errors::Result;
use crate::issues::{Issue, IssueType};
use crate::oms::traits::{TradeCheck, TradeContext};

/// Flags tickers that do not resolve cleanly against the reference master.
///
/// - No candidate: ERROR (unknown ticker)
/// - Ambiguous top candidate: WARNING
/// - Top confidence below the configured floor: WARNING
pub struct IdentifierCheck;

#[async_trait]
impl TradeCheck for IdentifierCheck {
    fn id(&self) -> &'static str {
        "identifier"
    }

    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>> {
        let Some(ticker) = ctx.trade.ticker_symbol() else {
            return Ok(Vec::new());
        };

        let Some(top) = ctx.top_candidate() else {
            return Ok(vec![Issue::error(
                IssueType::IdentifierMismatch,
                format!("Unknown ticker: {} not found in reference master", ticker),
            )
            .on_field("ticker")]);
        };

        let mut issues = Vec::new();
        if top.ambiguous {
            let candidates: Vec<&str> = ctx
                .candidates
                .iter()
                .filter(|c| c.ambiguous)
                .map(|c| c.symbol())
                .collect();
            issues.push(
                Issue::warning(
                    IssueType::IdentifierMismatch,
                    format!("Ambiguous ticker {}: candidates {}", ticker, candidates.join(", ")),
                )
                .on_field("ticker"),
            );
        }
        if top.confidence < ctx.config.identifier_confidence_floor {
            issues.push(
                Issue::warning(
                    IssueType::IdentifierMismatch,
                    format!(
                        "Low-confidence match for {}: {} ({:.2})",
                        ticker,
                        top.symbol(),
                        top.confidence
                    ),
                )
                .on_field("ticker"),
            );
        }
        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OmsConfig;
    use crate::issues::Severity;
    use crate::oms::model::Trade;
    use deskagent_market_data::PriceLookup;
    use crate::refmaster::{EquityReference, NormalizationResult};
    use std::collections::BTreeSet;

    fn candidate(symbol: &str, confidence: f64, ambiguous: bool) -> NormalizationResult {
        NormalizationResult {
            equity: EquityReference::new(symbol, "US0000000000", "000000000", "NYSE"),
            confidence,
            reasons: BTreeSet::new(),
            ambiguous,
        }
    }

    async fn run(ticker: Option<&str>, candidates: &[NormalizationResult]) -> Vec<Issue> {
        let config = OmsConfig::default();
        let trade = Trade {
            ticker: ticker.map(str::to_string),
            ..Trade::default()
        };
        let ctx = TradeContext {
            trade: &trade,
            candidates,
            market: &PriceLookup::NotRequested,
            config: &config,
        };
        IdentifierCheck.run(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_missing_ticker_is_skipped() {
        assert!(run(None, &[]).await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_ticker_is_error() {
        let issues = run(Some("ZZZZ"), &[]).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("ZZZZ"));
    }

    #[tokio::test]
    async fn test_clean_match_passes() {
        assert!(run(Some("AAPL"), &[candidate("AAPL", 0.95, false)]).await.is_empty());
    }

    #[tokio::test]
    async fn test_ambiguous_and_low_confidence() {
        let candidates = [candidate("ABC", 0.7, true), candidate("ABCD", 0.7, true)];
        let issues = run(Some("AB"), &candidates).await;
        assert_eq!(issues.len(), 2);
        assert!(issues.iter().all(|i| i.severity == Severity::Warning));
        assert!(issues[0].message.contains("ABC, ABCD"));
        assert!(issues[1].message.starts_with("Low-confidence"));
    }
}
