//! Counterparty allow-list check.

use async_trait::async_trait;

use crate::errors::Result;
use crate::issues::{Issue, IssueType};
use crate::oms::model::non_empty;
use crate::oms::traits::{TradeCheck, TradeContext};

pub struct CounterpartyCheck;

#[async_trait]
impl TradeCheck for CounterpartyCheck {
    fn id(&self) -> &'static str {
        "counterparty"
    }

    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>> {
        let Some(counterparty) = non_empty(ctx.trade.counterparty.as_deref()) else {
            return Ok(Vec::new());
        };
        let allowed = ctx
            .config
            .allowed_counterparties
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(counterparty));
        if allowed {
            return Ok(Vec::new());
        }
        Ok(vec![Issue::warning(
            IssueType::Counterparty,
            format!("Counterparty {} is not on the approved list", counterparty),
        )
        .on_field("counterparty")])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OmsConfig;
    use crate::oms::model::Trade;
    use deskagent_market_data::PriceLookup;

    async fn run(counterparty: &str) -> Vec<Issue> {
        let config = OmsConfig::default();
        let trade = Trade {
            counterparty: Some(counterparty.to_string()),
            ..Trade::default()
        };
        let ctx = TradeContext {
            trade: &trade,
            candidates: &[],
            market: &PriceLookup::NotRequested,
            config: &config,
        };
        CounterpartyCheck.run(&ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_allow_list_is_case_insensitive() {
        assert!(run("ms").await.is_empty());
        assert!(run("JPM").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_counterparty_warns() {
        let issues = run("ACME").await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field.as_deref(), Some("counterparty"));
    }
}
