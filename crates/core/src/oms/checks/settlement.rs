//! Settlement date check.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Datelike;

use crate::errors::{Error, Result};
use crate::issues::{Issue, IssueType};
use crate::oms::calendar::SettlementCalendar;
use crate::oms::traits::{TradeCheck, TradeContext};

/// Validates the settlement date against the trade date.
///
/// Emits at most one issue, first match wins:
/// 1. settlement before trade date: ERROR
/// 2. settlement on a non-business day: ERROR
/// 3. settlement other than T+N business days: WARNING
pub struct SettlementCheck {
    calendar: Arc<dyn SettlementCalendar>,
}

impl SettlementCheck {
    pub fn new(calendar: Arc<dyn SettlementCalendar>) -> Self {
        Self { calendar }
    }
}

#[async_trait]
impl TradeCheck for SettlementCheck {
    fn id(&self) -> &'static str {
        "settlement"
    }

    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>> {
        let (Some(trade_dt), Some(settle_dt)) = (ctx.trade.trade_dt, ctx.trade.settle_dt) else {
            return Ok(Vec::new());
        };
        let issue = |found: Issue| Ok(vec![found.on_field("settle_dt")]);

        if settle_dt < trade_dt {
            return issue(Issue::error(
                IssueType::SettlementDate,
                format!("Settlement date {} is before trade date {}", settle_dt, trade_dt),
            ));
        }
        if !self.calendar.is_business_day(settle_dt) {
            return issue(Issue::error(
                IssueType::SettlementDate,
                format!(
                    "Settlement date {} falls on a non-business day ({})",
                    settle_dt,
                    settle_dt.weekday()
                ),
            ));
        }

        let days = ctx.config.settlement_days;
        let expected = self.calendar.add_business_days(trade_dt, days).ok_or_else(|| {
            Error::Unexpected(format!("cannot compute T+{} from {}", days, trade_dt))
        })?;
        if settle_dt != expected {
            return issue(Issue::warning(
                IssueType::SettlementDate,
                format!(
                    "Non-standard settlement: expected T+{} on {}, got {}",
                    days, expected, settle_dt
                ),
            ));
        }
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OmsConfig;
    use crate::issues::Severity;
    use crate::oms::calendar::WeekendCalendar;
    use crate::oms::model::Trade;
    use deskagent_market_data::PriceLookup;
    use chrono::NaiveDate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    async fn run(trade_dt: NaiveDate, settle_dt: NaiveDate) -> Vec<Issue> {
        let config = OmsConfig::default();
        let trade = Trade::new("AAPL", 1.0, 1.0, "USD", "MS", trade_dt, settle_dt);
        let ctx = TradeContext {
            trade: &trade,
            candidates: &[],
            market: &PriceLookup::NotRequested,
            config: &config,
        };
        SettlementCheck::new(Arc::new(WeekendCalendar))
            .run(&ctx)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_standard_settlement_passes() {
        assert!(run(date(2024, 6, 17), date(2024, 6, 19)).await.is_empty());
        // Friday trade settles the following Tuesday.
        assert!(run(date(2024, 6, 21), date(2024, 6, 25)).await.is_empty());
    }

    #[tokio::test]
    async fn test_settlement_before_trade_wins_over_weekend() {
        // 2024-06-16 is a Sunday and before the trade date.
        let issues = run(date(2024, 6, 17), date(2024, 6, 16)).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("before trade date"));
    }

    #[tokio::test]
    async fn test_weekend_settlement_is_error() {
        let issues = run(date(2024, 6, 20), date(2024, 6, 22)).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Error);
        assert!(issues[0].message.contains("Sat"));
    }

    #[tokio::test]
    async fn test_non_standard_cycle_is_warning() {
        let issues = run(date(2024, 6, 17), date(2024, 6, 18)).await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].severity, Severity::Warning);
        assert!(issues[0].message.starts_with("Non-standard settlement"));
    }
}
