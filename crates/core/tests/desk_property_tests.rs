//! Property-based integration tests for the validators and report math.
//!
//! These tests verify that universal properties hold across all valid inputs,
//! using the `proptest` crate for random test case generation.

use std::sync::Arc;

use chrono::NaiveDate;
use deskagent_core::config::{NormalizerThresholds, OmsConfig, PricingConfig};
use deskagent_core::issues::{Issue, IssueType, Severity, ValidationResult};
use deskagent_core::oms::{Trade, TradeValidator};
use deskagent_core::orchestrator::percentage;
use deskagent_core::pricing::{Classification, Mark, MarkValidator};
use deskagent_core::refmaster::{EquityNormalizer, EquityReference, Normalizer};
use deskagent_market_data::{PriceLookup, PriceSnapshot, StaticMarketData};
use proptest::prelude::*;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

// =============================================================================
// Generators
// =============================================================================

fn arb_severity() -> impl Strategy<Value = Severity> {
    prop_oneof![
        Just(Severity::Ok),
        Just(Severity::Warning),
        Just(Severity::Error),
    ]
}

fn arb_issue_type() -> impl Strategy<Value = IssueType> {
    prop_oneof![
        Just(IssueType::MissingField),
        Just(IssueType::IdentifierMismatch),
        Just(IssueType::PriceTolerance),
        Just(IssueType::Counterparty),
        Just(IssueType::SettlementDate),
    ]
}

fn arb_issue() -> impl Strategy<Value = Issue> {
    (arb_issue_type(), arb_severity(), "[a-z ]{5,30}")
        .prop_map(|(issue_type, severity, message)| Issue::new(issue_type, severity, message))
}

/// An issue list together with a permutation of itself.
fn arb_issue_permutation() -> impl Strategy<Value = (Vec<Issue>, Vec<Issue>)> {
    proptest::collection::vec(arb_issue(), 0..12)
        .prop_flat_map(|issues| (Just(issues.clone()), Just(issues).prop_shuffle()))
}

/// A reference table of distinct symbols with unique identifiers.
fn arb_table() -> impl Strategy<Value = Vec<EquityReference>> {
    proptest::collection::btree_set("[A-Z]{1,5}", 1..12).prop_map(|symbols| {
        symbols
            .into_iter()
            .enumerate()
            .map(|(i, symbol)| {
                EquityReference::new(
                    &symbol,
                    &format!("US{:010}", i),
                    &format!("{:09}", i),
                    if i % 2 == 0 { "NYSE" } else { "NASDAQ" },
                )
            })
            .collect()
    })
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// =============================================================================
// Property Tests
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    /// Status fold: ERROR iff any ERROR, WARNING iff no ERROR and any
    /// WARNING, OK otherwise, for every permutation of the issues.
    #[test]
    fn prop_status_fold_is_order_independent((issues, shuffled) in arb_issue_permutation()) {
        let a = ValidationResult::from_issues(issues.clone());
        let b = ValidationResult::from_issues(shuffled);
        prop_assert_eq!(a.status, b.status);

        let any_error = issues.iter().any(|i| i.severity == Severity::Error);
        let any_warning = issues.iter().any(|i| i.severity == Severity::Warning);
        let expected = if any_error {
            Severity::Error
        } else if any_warning {
            Severity::Warning
        } else {
            Severity::Ok
        };
        prop_assert_eq!(a.status, expected);
    }

    /// Every independent violation yields exactly one issue.
    #[test]
    fn prop_no_early_exit(
        bad_counterparty in any::<bool>(),
        weekend_settlement in any::<bool>(),
        missing_currency in any::<bool>(),
        negative_quantity in any::<bool>(),
    ) {
        let mut trade = Trade::new("AAPL", 100.0, 150.0, "USD", "MS", date(17), date(19));
        if bad_counterparty {
            trade.counterparty = Some("ZZZ".to_string());
        }
        if weekend_settlement {
            trade.settle_dt = Some(date(22));
        }
        if missing_currency {
            trade.currency = None;
        }
        if negative_quantity {
            trade.quantity = Some(-100.0);
        }
        let expected = [bad_counterparty, weekend_settlement, missing_currency, negative_quantity]
            .iter()
            .filter(|f| **f)
            .count();

        let normalizer = Arc::new(Normalizer::with_defaults(vec![
            EquityReference::new("AAPL", "US0378331005", "037833100", "NASDAQ"),
        ]));
        let market = Arc::new(StaticMarketData::new().with_price("AAPL", date(17), 150.5));
        let validator = TradeValidator::new(normalizer, market, OmsConfig::default());
        let result = runtime().block_on(validator.validate(&trade));

        prop_assert_eq!(result.issues.len(), expected, "issues: {:?}", result.issues);
    }

    /// For a fixed market price, a larger deviation never yields a less
    /// severe classification.
    #[test]
    fn prop_classification_is_monotone(
        market_price in 1.0f64..1000.0,
        d1 in 0.0f64..0.5,
        extra in 0.0f64..0.5,
        above in any::<bool>(),
    ) {
        let d2 = d1 + extra;
        let sign = if above { 1.0 } else { -1.0 };
        let validator = MarkValidator::new(Arc::new(StaticMarketData::new()), PricingConfig::default())
            .with_run_date(date(17));
        let lookup = PriceLookup::Found(PriceSnapshot::new("AAPL", market_price, date(17), "STATIC"));

        let rank = |deviation: f64| {
            let mark = Mark::new("AAPL", market_price * (1.0 + sign * deviation), date(17));
            validator.classify(&mark, &lookup).classification
        };
        let (near, far) = (rank(d1), rank(d2));
        prop_assert!(near != Classification::NoMarketData && near != Classification::StaleMark);
        prop_assert!(near.report_rank() <= far.report_rank(), "{:?} then {:?}", near, far);
    }

    /// Normalization is deterministic, and nothing is ambiguous once a
    /// candidate clears the upper band.
    #[test]
    fn prop_normalizer_is_deterministic(
        table in arb_table(),
        pick in any::<proptest::sample::Index>(),
        noise in "[A-Z]{1,6}( US| NYSE)?",
        use_symbol in any::<bool>(),
    ) {
        let input = if use_symbol {
            table[pick.index(table.len())].symbol.clone()
        } else {
            noise
        };
        let normalizer = Normalizer::with_defaults(table);
        let first = normalizer.normalize(&input, 5);
        let second = normalizer.normalize(&input, 5);
        prop_assert_eq!(&first, &second);

        let high = NormalizerThresholds::default().ambiguous_high;
        if first.iter().any(|r| r.confidence > high) {
            prop_assert!(first.iter().all(|r| !r.ambiguous));
        }
        prop_assert!(first.windows(2).all(|w| w[0].confidence >= w[1].confidence));
    }

    /// Percentages are finite ratios and zero totals give 0.0.
    #[test]
    fn prop_percentage_is_safe(total in 0usize..10_000, count_seed in 0usize..10_000) {
        let count = if total == 0 { 0 } else { count_seed % (total + 1) };
        let value = percentage(count, total);
        prop_assert!(value.is_finite());
        prop_assert!((0.0..=1.0).contains(&value));
        if total == 0 {
            prop_assert_eq!(value, 0.0);
        }
    }
}
