//! Mark validator.
//!
//! Compares internal marks with market reference prices and classifies the
//! result. Classification precedence, first match wins:
//!
//! 1. `NO_MARKET_DATA` - fetch failed, not found, or non-positive price
//! 2. `STALE_MARK` - mark older than `stale_days` on the run date
//! 3. `OUT_OF_TOLERANCE` - deviation above the review threshold
//! 4. `REVIEW_NEEDED` - deviation above the OK threshold
//! 5. `OK`

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use deskagent_market_data::{MarketDataSource, PriceKey, PriceLookup};
use futures::stream::{self, StreamExt};
use log::{debug, warn};

use super::model::{Classification, EnrichedMark, Mark};
use crate::config::PricingConfig;
use crate::constants::DEFAULT_MAX_CONCURRENCY;

/// Classification for a deviation with staleness already ruled out.
pub fn classify_deviation(deviation_percentage: f64, ok_threshold: f64, review_threshold: f64) -> Classification {
    if deviation_percentage > review_threshold {
        Classification::OutOfTolerance
    } else if deviation_percentage > ok_threshold {
        Classification::ReviewNeeded
    } else {
        Classification::Ok
    }
}

/// An enriched mark plus the lookup it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkValidation {
    pub mark: EnrichedMark,
    pub lookup: PriceLookup,
}

pub struct MarkValidator {
    market: Arc<dyn MarketDataSource>,
    config: PricingConfig,
    run_date: Option<NaiveDate>,
}

impl MarkValidator {
    pub fn new(market: Arc<dyn MarketDataSource>, config: PricingConfig) -> Self {
        Self {
            market,
            config,
            run_date: None,
        }
    }

    /// Pins the date staleness is measured against.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = Some(run_date);
        self
    }

    /// Pinned run date, or today (UTC).
    pub fn run_date(&self) -> NaiveDate {
        self.run_date.unwrap_or_else(|| Utc::now().date_naive())
    }

    pub fn config(&self) -> &PricingConfig {
        &self.config
    }

    pub async fn validate(&self, mark: &Mark) -> EnrichedMark {
        self.validate_detailed(mark).await.mark
    }

    /// Fetches the market price for one mark and classifies it.
    pub async fn validate_detailed(&self, mark: &Mark) -> MarkValidation {
        let lookup = self.fetch(&mark.symbol(), mark.as_of_date).await;
        MarkValidation {
            mark: self.classify(mark, &lookup),
            lookup,
        }
    }

    /// Enriches a batch. Each `(ticker, date)` pair is fetched once.
    pub async fn enrich_marks(&self, marks: &[Mark]) -> Vec<EnrichedMark> {
        self.enrich_marks_detailed(marks, DEFAULT_MAX_CONCURRENCY)
            .await
            .into_iter()
            .map(|v| v.mark)
            .collect()
    }

    /// Like [`enrich_marks`](Self::enrich_marks), keeping each lookup.
    /// Results keep input order.
    pub async fn enrich_marks_detailed(&self, marks: &[Mark], concurrency: usize) -> Vec<MarkValidation> {
        let keys: BTreeSet<PriceKey> = marks
            .iter()
            .map(|m| PriceKey::new(&m.ticker, m.as_of_date))
            .collect();
        debug!("Enriching {} marks with {} distinct lookups", marks.len(), keys.len());

        let lookups: HashMap<PriceKey, PriceLookup> = stream::iter(keys)
            .map(|key| async move {
                let lookup = self.fetch(&key.ticker, key.date).await;
                (key, lookup)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        marks
            .iter()
            .map(|mark| {
                let lookup = lookups
                    .get(&PriceKey::new(&mark.ticker, mark.as_of_date))
                    .cloned()
                    .unwrap_or_default();
                MarkValidation {
                    mark: self.classify(mark, &lookup),
                    lookup,
                }
            })
            .collect()
    }

    async fn fetch(&self, ticker: &str, as_of: NaiveDate) -> PriceLookup {
        if ticker.trim().is_empty() {
            return PriceLookup::NotRequested;
        }
        let lookup = PriceLookup::from(self.market.get_price(ticker, as_of).await);
        if let PriceLookup::Failed { message, .. } = &lookup {
            warn!("Market price lookup for {} on {} failed: {}", ticker, as_of, message);
        }
        lookup
    }

    /// Classifies a mark against a finished lookup. Pure.
    pub fn classify(&self, mark: &Mark, lookup: &PriceLookup) -> EnrichedMark {
        let snapshot = match lookup {
            PriceLookup::NotRequested => {
                return EnrichedMark::no_market_data(mark.clone(), "missing ticker", None)
            }
            PriceLookup::NotFound => {
                return EnrichedMark::no_market_data(mark.clone(), "ticker not found", None)
            }
            PriceLookup::Failed { message, .. } => {
                return EnrichedMark::no_market_data(
                    mark.clone(),
                    "market data fetch failed",
                    Some(message.clone()),
                )
            }
            PriceLookup::Found(snapshot) if snapshot.price <= 0.0 || !snapshot.price.is_finite() => {
                return EnrichedMark::no_market_data(
                    mark.clone(),
                    "non-positive market price",
                    None,
                )
            }
            PriceLookup::Found(snapshot) => snapshot,
        };

        let market_price = snapshot.price;
        let deviation_absolute = mark.internal_mark - market_price;
        let deviation_percentage = deviation_absolute.abs() / market_price;
        let (ok_threshold, review_threshold, override_applied) =
            self.config.thresholds_for(&mark.symbol());

        let age_days = (self.run_date() - mark.as_of_date).num_days();
        let classification = if age_days > self.config.stale_days {
            Classification::StaleMark
        } else {
            classify_deviation(deviation_percentage, ok_threshold, review_threshold)
        };

        let comparison = format!(
            "{:.1}% deviation from market (${:.2} vs internal ${:.2})",
            deviation_percentage * 100.0,
            market_price,
            mark.internal_mark
        );
        let mut explanation = match classification {
            Classification::StaleMark => format!(
                "STALE_MARK: mark is {} days old (limit {}); {}",
                age_days, self.config.stale_days, comparison
            ),
            other => format!("{}: {}", other, comparison),
        };
        if override_applied {
            explanation.push_str("; instrument tolerance override applied");
        }

        EnrichedMark {
            mark: mark.clone(),
            market_price: Some(market_price),
            deviation_absolute: Some(deviation_absolute),
            deviation_percentage: Some(deviation_percentage),
            classification,
            status: classification.severity(),
            market_data_date: Some(snapshot.date),
            market_data_source: Some(snapshot.source.clone()),
            tolerance_override_applied: override_applied,
            error: None,
            explanation,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ToleranceOverride;
    use crate::issues::Severity;
    use deskagent_market_data::{InjectedFailure, StaticMarketData};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn validator(market: StaticMarketData) -> MarkValidator {
        MarkValidator::new(Arc::new(market), PricingConfig::default()).with_run_date(date(2024, 6, 17))
    }

    #[tokio::test]
    async fn test_out_of_tolerance_mark() {
        let market = StaticMarketData::new().with_price("AAPL", date(2024, 6, 17), 195.71);
        let enriched = validator(market)
            .validate(&Mark::new("AAPL", 150.0, date(2024, 6, 17)))
            .await;

        assert_eq!(enriched.classification, Classification::OutOfTolerance);
        assert_eq!(enriched.status, Severity::Error);
        assert_eq!(enriched.market_price, Some(195.71));
        assert!((enriched.deviation_percentage.unwrap() - 0.2335).abs() < 1e-3);
        assert!((enriched.deviation_absolute.unwrap() + 45.71).abs() < 1e-9);
        assert_eq!(
            enriched.explanation,
            "OUT_OF_TOLERANCE: 23.4% deviation from market ($195.71 vs internal $150.00)"
        );
    }

    #[tokio::test]
    async fn test_unknown_ticker_has_no_market_data() {
        let enriched = validator(StaticMarketData::new())
            .validate(&Mark::new("XYZ", 10.0, date(2024, 6, 17)))
            .await;
        assert_eq!(enriched.classification, Classification::NoMarketData);
        assert_eq!(enriched.market_price, None);
        assert!(enriched.explanation.contains("ticker not found"));
    }

    #[tokio::test]
    async fn test_fetch_failure_has_no_market_data() {
        let market = StaticMarketData::new()
            .with_price("XYZ", date(2024, 6, 17), 10.0)
            .with_failure("XYZ", InjectedFailure::Permanent, 1);
        let validation = validator(market)
            .validate_detailed(&Mark::new("XYZ", 10.0, date(2024, 6, 17)))
            .await;
        assert_eq!(validation.mark.classification, Classification::NoMarketData);
        assert!(validation.mark.error.is_some());
        assert!(validation.lookup.failure_class().is_some());
    }

    #[tokio::test]
    async fn test_zero_market_price_has_no_market_data() {
        let market = StaticMarketData::new().with_price("AAPL", date(2024, 6, 17), 0.0);
        let enriched = validator(market)
            .validate(&Mark::new("AAPL", 10.0, date(2024, 6, 17)))
            .await;
        assert_eq!(enriched.classification, Classification::NoMarketData);
        assert_eq!(enriched.market_price, None);
    }

    #[tokio::test]
    async fn test_staleness_outranks_deviation() {
        let market = StaticMarketData::new().with_price("AAPL", date(2024, 6, 10), 195.71);
        let enriched = validator(market)
            .validate(&Mark::new("AAPL", 150.0, date(2024, 6, 10)))
            .await;
        assert_eq!(enriched.classification, Classification::StaleMark);
        assert_eq!(enriched.status, Severity::Warning);
        assert!(enriched.explanation.starts_with("STALE_MARK: mark is 7 days old (limit 5)"));
    }

    #[tokio::test]
    async fn test_review_band_and_ok() {
        let market = StaticMarketData::new().with_price("MSFT", date(2024, 6, 17), 100.0);
        let v = validator(market);
        let review = v.validate(&Mark::new("MSFT", 97.0, date(2024, 6, 17))).await;
        assert_eq!(review.classification, Classification::ReviewNeeded);
        let ok = v.validate(&Mark::new("MSFT", 101.0, date(2024, 6, 17))).await;
        assert_eq!(ok.classification, Classification::Ok);
        assert_eq!(ok.market_data_source.as_deref(), Some("STATIC"));
    }

    #[tokio::test]
    async fn test_instrument_override_widens_tolerance() {
        let mut config = PricingConfig::default();
        config.instrument_overrides.insert(
            "TSLA".to_string(),
            ToleranceOverride {
                ok_threshold: 0.05,
                review_threshold: 0.10,
            },
        );
        let market = StaticMarketData::new().with_price("TSLA", date(2024, 6, 17), 100.0);
        let v = MarkValidator::new(Arc::new(market), config).with_run_date(date(2024, 6, 17));
        let enriched = v.validate(&Mark::new("tsla", 96.0, date(2024, 6, 17))).await;
        assert_eq!(enriched.classification, Classification::Ok);
        assert!(enriched.tolerance_override_applied);
        assert!(enriched.explanation.ends_with("override applied"));
    }

    #[tokio::test]
    async fn test_batch_dedupes_lookups_and_isolates_failures() {
        let market = Arc::new(
            StaticMarketData::new()
                .with_price("AAPL", date(2024, 6, 17), 100.0)
                .with_price("MSFT", date(2024, 6, 17), 100.0)
                .with_failure("MSFT", InjectedFailure::Transient, usize::MAX),
        );
        let v = MarkValidator::new(market.clone(), PricingConfig::default())
            .with_run_date(date(2024, 6, 17));
        let marks = vec![
            Mark::new("AAPL", 100.0, date(2024, 6, 17)),
            Mark::new("MSFT", 100.0, date(2024, 6, 17)),
            Mark::new("aapl", 110.0, date(2024, 6, 17)),
        ];
        let enriched = v.enrich_marks(&marks).await;

        assert_eq!(market.call_count(), 2);
        let classes: Vec<Classification> = enriched.iter().map(|m| m.classification).collect();
        assert_eq!(
            classes,
            vec![
                Classification::Ok,
                Classification::NoMarketData,
                Classification::OutOfTolerance
            ]
        );
        assert_eq!(enriched[2].mark.ticker, "aapl");
    }

    #[test]
    fn test_classify_deviation_boundaries() {
        assert_eq!(classify_deviation(0.02, 0.02, 0.05), Classification::Ok);
        assert_eq!(classify_deviation(0.0201, 0.02, 0.05), Classification::ReviewNeeded);
        assert_eq!(classify_deviation(0.05, 0.02, 0.05), Classification::ReviewNeeded);
        assert_eq!(classify_deviation(0.0501, 0.02, 0.05), Classification::OutOfTolerance);
    }
}
