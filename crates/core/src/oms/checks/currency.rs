//! Currency consistency check.

use async_trait::async_trait;

use crate::errors::Result;
use crate::issues::{Issue, IssueType};
use crate::oms::model::non_empty;
use crate::oms::traits::{TradeCheck, TradeContext};

/// Compares the trade currency with the instrument's reference currency,
/// falling back to the configured default when the ticker is unresolved.
pub struct CurrencyCheck;

#[async_trait]
impl TradeCheck for CurrencyCheck {
    fn id(&self) -> &'static str {
        "currency"
    }

    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>> {
        let Some(currency) = non_empty(ctx.trade.currency.as_deref()) else {
            return Ok(Vec::new());
        };
        let expected = ctx
            .top_candidate()
            .map(|c| c.equity.currency.as_str())
            .unwrap_or(ctx.config.default_currency.as_str());

        if currency.eq_ignore_ascii_case(expected) {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::warning(
            IssueType::CurrencyMismatch,
            format!(
                "Trade currency {} does not match reference currency {}",
                currency.to_uppercase(),
                expected.to_uppercase()
            ),
        )
        .on_field("currency")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OmsConfig;
    use crate::oms::model::Trade;
    use crate::refmaster::{EquityReference, NormalizationResult};
    use deskagent_market_data::PriceLookup;
    use std::collections::BTreeSet;

    async fn run(currency: &str, reference: Option<&str>) -> Vec<Issue> {
        let config = OmsConfig::default();
        let trade = Trade {
            currency: Some(currency.to_string()),
            ..Trade::default()
        };
        let candidates: Vec<NormalizationResult> = reference
            .map(|ccy| NormalizationResult {
                equity: EquityReference::new("SAP", "DE0007164600", "D66992104", "XETRA")
                    .with_currency(ccy),
                confidence: 0.95,
                reasons: BTreeSet::new(),
                ambiguous: false,
            })
            .into_iter()
            .collect();
        let ctx = TradeContext {
            trade: &trade,
            candidates: &candidates,
            market: &PriceLookup::NotRequested,
            config: &config,
        };
        CurrencyCheck.run(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_matches_reference_case_insensitively() {
        assert!(run("eur", Some("EUR")).await.is_empty());
    }

    #[tokio::test]
    async fn test_mismatch_is_warning() {
        let issues = run("USD", Some("EUR")).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(
            issues[0].message,
            "Trade currency USD does not match reference currency EUR"
        );
    }

    #[tokio::test]
    async fn test_unresolved_ticker_uses_default_currency() {
        assert!(run("USD", None).await.is_empty());
        assert_eq!(run("GBP", None).await.len(), 1);
    }
}
