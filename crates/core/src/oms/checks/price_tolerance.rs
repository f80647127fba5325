//! Price tolerance check against the market reference price.

use async_trait::async_trait;

use deskagent_market_data::PriceLookup;

use crate::errors::{Error, Result};
use crate::issues::{Issue, IssueType, Severity};
use crate::oms::traits::{TradeCheck, TradeContext};

/// Relative deviation `|price - market| / market`.
pub fn price_deviation(price: f64, market: f64) -> Option<f64> {
    (market > 0.0 && market.is_finite() && price.is_finite())
        .then(|| (price - market).abs() / market)
}

/// Compares the trade price with the market price as of the trade date.
pub struct PriceToleranceCheck;

impl PriceToleranceCheck {
    fn unavailable(ctx: &TradeContext<'_>, ticker: &str, reason: &str) -> Vec<Issue> {
        let severity = ctx.config.market_data_unavailable_severity;
        if severity == Severity::Ok {
            return Vec::new();
        }
        vec![Issue::new(
            IssueType::MarketDataUnavailable,
            severity,
            format!("No market price for {}: {}", ticker, reason),
        )
        .on_field("price")]
    }
}

#[async_trait]
impl TradeCheck for PriceToleranceCheck {
    fn id(&self) -> &'static str {
        "price_tolerance"
    }

    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>> {
        let trade = ctx.trade;
        let (Some(ticker), Some(price), Some(_)) = (trade.ticker_symbol(), trade.price, trade.trade_dt)
        else {
            return Ok(Vec::new());
        };
        // Non-positive prices are reported as invalid values.
        if price <= 0.0 {
            return Ok(Vec::new());
        }

        let market = match ctx.market {
            PriceLookup::NotRequested => return Ok(Vec::new()),
            PriceLookup::NotFound => return Ok(Self::unavailable(ctx, &ticker, "not found")),
            PriceLookup::Failed { message, .. } => {
                return Ok(Self::unavailable(ctx, &ticker, message))
            }
            PriceLookup::Found(snapshot) if snapshot.price <= 0.0 => {
                return Ok(Self::unavailable(ctx, &ticker, "non-positive market price"))
            }
            PriceLookup::Found(snapshot) => snapshot.price,
        };

        let deviation = price_deviation(price, market).ok_or_else(|| {
            Error::Unexpected(format!("cannot compare price {} with market {}", price, market))
        })?;
        let severity = if deviation > ctx.config.price_error_threshold {
            Severity::Error
        } else if deviation > ctx.config.price_warning_threshold {
            Severity::Warning
        } else {
            return Ok(Vec::new());
        };
        Ok(vec![Issue::new(
            IssueType::PriceTolerance,
            severity,
            format!(
                "deviates {:.2}% from market (trade {:.2} vs market {:.2})",
                deviation * 100.0,
                price,
                market
            ),
        )
        .on_field("price")])
    }
}
