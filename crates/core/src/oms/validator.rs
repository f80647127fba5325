//! Trade validator.
//!
//! Gathers the collaborator inputs for a trade (reference candidates and
//! market price), then runs every registered check over them and folds the
//! issues into a single [`ValidationResult`].

use std::sync::Arc;

use deskagent_market_data::{MarketDataSource, PriceLookup};
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::calendar::{SettlementCalendar, WeekendCalendar};
use super::checks::{
    CounterpartyCheck, CurrencyCheck, IdentifierCheck, PriceToleranceCheck, RequiredFieldsCheck,
    SettlementCheck,
};
use super::model::{Trade, TradeValidation};
use super::traits::{TradeCheck, TradeContext};
use crate::config::OmsConfig;
use crate::issues::{Issue, IssueType, ValidationResult};
use crate::refmaster::{EquityNormalizer, NormalizationResult};

/// Validates trades against the reference master, market data and desk rules.
pub struct TradeValidator {
    normalizer: Arc<dyn EquityNormalizer>,
    market: Arc<dyn MarketDataSource>,
    config: OmsConfig,
    checks: Vec<Box<dyn TradeCheck>>,
}

impl TradeValidator {
    /// Validator with the standard checks and a weekend-only calendar.
    pub fn new(
        normalizer: Arc<dyn EquityNormalizer>,
        market: Arc<dyn MarketDataSource>,
        config: OmsConfig,
    ) -> Self {
        Self {
            normalizer,
            market,
            config,
            checks: standard_checks(Arc::new(WeekendCalendar)),
        }
    }

    /// Replaces the settlement calendar.
    pub fn with_calendar(mut self, calendar: Arc<dyn SettlementCalendar>) -> Self {
        self.checks = standard_checks(calendar);
        self
    }

    /// Appends a desk-specific check after the standard ones.
    pub fn with_check(mut self, check: Box<dyn TradeCheck>) -> Self {
        self.checks.push(check);
        self
    }

    pub fn config(&self) -> &OmsConfig {
        &self.config
    }

    /// Validates one trade. Never fails: problems become issues.
    pub async fn validate(&self, trade: &Trade) -> ValidationResult {
        self.validate_detailed(trade).await.result
    }

    /// Validates one trade and keeps the market lookup outcome.
    pub async fn validate_detailed(&self, trade: &Trade) -> TradeValidation {
        let candidates = match trade.ticker_symbol() {
            Some(ticker) => self
                .normalizer
                .normalize(&ticker, self.normalizer.default_top_k()),
            None => Vec::new(),
        };
        let market = self.lookup_market(trade, &candidates).await;

        let ctx = TradeContext {
            trade,
            candidates: &candidates,
            market: &market,
            config: &self.config,
        };

        let mut issues = Vec::new();
        for check in &self.checks {
            match check.run(&ctx).await {
                Ok(found) => issues.extend(found),
                Err(e) => {
                    warn!("Trade check '{}' failed: {}", check.id(), e);
                    issues.push(Issue::error(
                        IssueType::ValidationError,
                        format!("Check {} failed: {}", check.id(), e),
                    ));
                }
            }
        }

        let result = ValidationResult::from_issues(issues);
        debug!(
            "Trade {} validated: {}",
            trade.trade_id.as_deref().unwrap_or("<unnamed>"),
            result.status
        );
        TradeValidation { result, market }
    }

    /// Validates trades with bounded concurrency. Results keep input order.
    pub async fn validate_batch(&self, trades: &[Trade], concurrency: usize) -> Vec<TradeValidation> {
        let mut results: Vec<(usize, TradeValidation)> = stream::iter(trades.iter().enumerate())
            .map(|(index, trade)| async move { (index, self.validate_detailed(trade).await) })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, validation)| validation).collect()
    }

    /// Market price as of the trade date for the resolved symbol, or for the
    /// raw ticker when it did not resolve.
    async fn lookup_market(
        &self,
        trade: &Trade,
        candidates: &[NormalizationResult],
    ) -> PriceLookup {
        let (Some(ticker), Some(trade_dt)) = (trade.ticker_symbol(), trade.trade_dt) else {
            return PriceLookup::NotRequested;
        };
        let symbol = candidates
            .first()
            .map(|c| c.symbol().to_string())
            .unwrap_or(ticker);

        let lookup = PriceLookup::from(self.market.get_price(&symbol, trade_dt).await);
        if let PriceLookup::Failed { message, .. } = &lookup {
            warn!("Market price lookup for {} on {} failed: {}", symbol, trade_dt, message);
        }
        lookup
    }
}

fn standard_checks(calendar: Arc<dyn SettlementCalendar>) -> Vec<Box<dyn TradeCheck>> {
    vec![
        Box::new(RequiredFieldsCheck),
        Box::new(IdentifierCheck),
        Box::new(CurrencyCheck),
        Box::new(PriceToleranceCheck),
        Box::new(CounterpartyCheck),
        Box::new(SettlementCheck::new(calendar)),
    ]
}
