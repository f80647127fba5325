//! Trade check traits.
//!
//! - `TradeContext` - Everything a check may look at for one trade
//! - `TradeCheck` - One independent rule over a trade

use async_trait::async_trait;
use deskagent_market_data::PriceLookup;

use super::model::Trade;
use crate::config::OmsConfig;
use crate::errors::Result;
use crate::issues::Issue;
use crate::refmaster::NormalizationResult;

// =============================================================================
// Trade Context
// =============================================================================

/// Inputs gathered once per trade and shared by every check.
///
/// Collaborator I/O (normalization, market price) happens before the checks
/// run, so checks stay pure over this context.
#[derive(Debug, Clone, Copy)]
pub struct TradeContext<'a> {
    pub trade: &'a Trade,

    /// Ranked reference candidates for the trade's ticker. Empty when the
    /// ticker is missing or unknown.
    pub candidates: &'a [NormalizationResult],

    /// Market reference price as of the trade date
    pub market: &'a PriceLookup,

    pub config: &'a OmsConfig,
}

impl<'a> TradeContext<'a> {
    /// Best reference candidate, if any.
    pub fn top_candidate(&self) -> Option<&'a NormalizationResult> {
        self.candidates.first()
    }
}

// =============================================================================
// Trade Check Trait
// =============================================================================

/// A single rule applied to a trade.
///
/// Checks are independent: each one returns its own issues and skips
/// itself when the fields it needs are absent. The validator runs every
/// check on every trade, in a fixed order, with no early exit.
#[async_trait]
pub trait TradeCheck: Send + Sync {
    /// Identifier used in logs and in `validation_error` issues.
    fn id(&self) -> &'static str;

    /// Issues found by this check; empty when the trade passes.
    async fn run(&self, ctx: &TradeContext<'_>) -> Result<Vec<Issue>>;
}
