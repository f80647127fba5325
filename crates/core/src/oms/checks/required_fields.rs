//! Required-field and value-domain check.

use async_trait::async_trait;

use crate::errors::Result;
use crate::issues::{Issue, IssueType};
use crate::oms::model::non_empty;
use crate::oms::traits::{TradeCheck, TradeContext};

/// Flags absent fields, then non-positive quantity or price.
pub struct RequiredFieldsCheck;

impl RequiredFieldsCheck {
    fn missing(field: &str) -> Issue {
        Issue::error(IssueType::MissingField, format!("Missing required field: {}", field))
            .on_field(field)
    }
}

#[async_trait]
impl TradeCheck for RequiredFieldsCheck {
    fn id(&self) -> &'static str {
        "required_fields"
    }

    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>> {
        let trade = ctx.trade;
        let mut issues = Vec::new();

        let present = [
            ("ticker", non_empty(trade.ticker.as_deref()).is_some()),
            ("quantity", trade.quantity.is_some()),
            ("price", trade.price.is_some()),
            ("currency", non_empty(trade.currency.as_deref()).is_some()),
            ("counterparty", non_empty(trade.counterparty.as_deref()).is_some()),
            ("trade_dt", trade.trade_dt.is_some()),
            ("settle_dt", trade.settle_dt.is_some()),
        ];
        issues.extend(
            present
                .iter()
                .filter(|(_, ok)| !ok)
                .map(|(field, _)| Self::missing(field)),
        );

        for (field, value) in [("quantity", trade.quantity), ("price", trade.price)] {
            if let Some(value) = value {
                if !value.is_finite() || value <= 0.0 {
                    issues.push(
                        Issue::error(
                            IssueType::InvalidValue,
                            format!("{} must be positive, got {}", field, value),
                        )
                        .on_field(field),
                    );
                }
            }
        }
        Ok(issues)
    }
}
