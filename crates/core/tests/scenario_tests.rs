//! Literal desk scenarios and end-to-end orchestrator runs.

use std::sync::Arc;

use chrono::NaiveDate;
use deskagent_core::config::{DeskConfig, OmsConfig, PricingConfig};
use deskagent_core::issues::{IssueType, Severity};
use deskagent_core::oms::{Trade, TradeValidator};
use deskagent_core::orchestrator::{DeskOrchestrator, Step, StepStatus};
use deskagent_core::pricing::{Classification, Mark, MarkValidator};
use deskagent_core::refmaster::{EquityNormalizer, EquityReference, Normalizer};
use deskagent_market_data::{InjectedFailure, StaticMarketData};
use serde_json::json;

fn date(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
}

fn apple() -> EquityReference {
    EquityReference::new("AAPL", "US0378331005", "037833100", "NASDAQ")
        .with_name("Apple Inc.")
        .with_cik("320193")
}

fn desk_normalizer() -> Arc<dyn EquityNormalizer> {
    Arc::new(Normalizer::with_defaults(vec![
        apple(),
        EquityReference::new("MSFT", "US5949181045", "594918104", "NASDAQ")
            .with_name("Microsoft Corporation"),
        EquityReference::new("SAP", "DE0007164600", "D66992104", "XETRA")
            .with_currency("EUR")
            .with_country(Some("DE")),
    ]))
}

fn trade_validator(market: StaticMarketData) -> TradeValidator {
    TradeValidator::new(desk_normalizer(), Arc::new(market), OmsConfig::default())
}

fn mark_validator(market: StaticMarketData) -> MarkValidator {
    MarkValidator::new(Arc::new(market), PricingConfig::default()).with_run_date(date(17))
}

// =============================================================================
// Literal examples
// =============================================================================

#[tokio::test]
async fn test_clean_trade_passes() {
    let validator = trade_validator(StaticMarketData::new().with_price("AAPL", date(17), 151.0));
    let trade = Trade::new("AAPL", 100.0, 150.0, "USD", "MS", date(17), date(19));

    let result = validator.validate(&trade).await;
    assert_eq!(result.status, Severity::Ok);
    assert!(result.issues.is_empty());
    assert_eq!(result.explanation, "All checks passed.");
}

#[tokio::test]
async fn test_saturday_settlement_is_an_error() {
    let validator = trade_validator(StaticMarketData::new().with_price("AAPL", date(17), 151.0));
    let trade = Trade::new("AAPL", 100.0, 150.0, "USD", "MS", date(17), date(22));

    let result = validator.validate(&trade).await;
    assert_eq!(result.status, Severity::Error);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].issue_type, IssueType::SettlementDate);
    assert_eq!(result.issues[0].severity, Severity::Error);
}

#[tokio::test]
async fn test_mark_far_from_market_is_out_of_tolerance() {
    let validator = mark_validator(StaticMarketData::new().with_price("AAPL", date(17), 195.71));
    let enriched = validator.validate(&Mark::new("AAPL", 150.0, date(17))).await;

    let deviation = enriched.deviation_percentage.unwrap();
    assert!((deviation - 0.2335).abs() < 1e-3, "deviation {}", deviation);
    assert_eq!(enriched.classification, Classification::OutOfTolerance);
    assert_eq!(enriched.status, Severity::Error);
}

#[tokio::test]
async fn test_failed_fetch_means_no_market_data() {
    let market = StaticMarketData::new().with_failure("XYZ", InjectedFailure::Permanent, usize::MAX);
    let enriched = mark_validator(market)
        .validate(&Mark::new("XYZ", 10.0, date(17)))
        .await;

    assert_eq!(enriched.classification, Classification::NoMarketData);
    assert_eq!(enriched.market_price, None);
    assert!(enriched.error.is_some());

    let not_found = mark_validator(StaticMarketData::new())
        .validate(&Mark::new("XYZ", 10.0, date(17)))
        .await;
    assert_eq!(not_found.classification, Classification::NoMarketData);
    assert_eq!(not_found.market_price, None);
}

#[test]
fn test_symbol_with_country_resolves_confidently() {
    let normalizer = Normalizer::with_defaults(vec![apple()]);
    let results = normalizer.normalize("AAPL US", 5);

    assert_eq!(results.len(), 1);
    assert_eq!(results[0].symbol(), "AAPL");
    assert!(results[0].confidence >= 0.9);
    assert!(!results[0].ambiguous);
}

#[test]
fn test_prefix_sibling_is_ranked_below_exact_symbol() {
    let normalizer = Normalizer::with_defaults(vec![
        EquityReference::new("ABC", "US0000000AB1", "00000AB11", "NYSE"),
        EquityReference::new("ABCD", "US0000000AB2", "00000AB12", "NYSE"),
    ]);
    let results = normalizer.normalize("ABC", 5);

    assert_eq!(results.len(), 2);
    assert_eq!(results[0].symbol(), "ABC");
    assert!((results[0].confidence - 0.90).abs() < 1e-9);
    assert!((results[1].confidence - 0.70).abs() < 1e-9);
    // Departs from the literal walkthrough, which marks ABCD ambiguous: the
    // exact match clears the upper band, so nothing is ambiguous.
    assert!(results.iter().all(|r| !r.ambiguous));
}

// =============================================================================
// Orchestrated runs
// =============================================================================

fn desk_day() -> serde_json::Value {
    json!({
        "name": "desk_day",
        "description": "Mixed trades, marks and questions",
        "trades": [
            {"trade_id": "T1", "ticker": "AAPL", "quantity": 100, "price": 150.0, "currency": "USD",
             "counterparty": "MS", "trade_dt": "2024-06-17", "settle_dt": "2024-06-19"},
            {"trade_id": "T2", "ticker": "AAPL", "quantity": 100, "price": 150.0, "currency": "USD",
             "counterparty": "MS", "trade_dt": "2024-06-17", "settle_dt": "2024-06-22"},
            {"trade_id": "T3", "ticker": "SAP", "quantity": 10, "price": 170.0, "currency": "USD",
             "counterparty": "NEWCO", "trade_dt": "2024-06-17", "settle_dt": "2024-06-19"}
        ],
        "marks": [
            {"ticker": "AAPL", "internal_mark": 150.0, "as_of_date": "2024-06-17"},
            {"ticker": "MSFT", "internal_mark": 400.0, "as_of_date": "2024-06-17"},
            {"ticker": "XYZ", "internal_mark": 10.0, "as_of_date": "2024-06-17"}
        ],
        "questions": [
            "How did AAPL perform recently?",
            {"question": "What is the dividend picture?", "ticker": "MSFT"}
        ],
        "metadata": {"desk": "equities"}
    })
}

fn desk_market() -> StaticMarketData {
    StaticMarketData::new()
        .with_price("AAPL", date(17), 151.0)
        .with_price("MSFT", date(17), 404.0)
        .with_price("SAP", date(17), 171.0)
}

fn orchestrator(config: DeskConfig, market: StaticMarketData) -> DeskOrchestrator {
    DeskOrchestrator::new(config, desk_normalizer(), Arc::new(market)).with_run_date(date(17))
}

#[tokio::test]
async fn test_desk_day_report() {
    let report = orchestrator(DeskConfig::default(), desk_market())
        .run_value(desk_day())
        .await
        .unwrap();

    let statuses: Vec<Severity> = report.trade_issues.iter().map(|t| t.result.status).collect();
    assert_eq!(statuses, vec![Severity::Ok, Severity::Error, Severity::Warning]);
    let t3: Vec<IssueType> = report.trade_issues[2]
        .result
        .issues
        .iter()
        .map(|i| i.issue_type)
        .collect();
    assert_eq!(t3, vec![IssueType::CurrencyMismatch, IssueType::Counterparty]);

    let classes: Vec<Classification> = report.pricing_flags.iter().map(|m| m.classification).collect();
    assert_eq!(
        classes,
        vec![Classification::Ok, Classification::Ok, Classification::NoMarketData]
    );
    assert_eq!(report.pricing_summary.flagged_tickers, vec!["XYZ"]);

    let summary = &report.summary;
    assert_eq!(summary.total_trades, 3);
    assert_eq!(summary.trades_with_issues, 2);
    assert!((summary.trade_issue_percentage - 2.0 / 3.0).abs() < 1e-9);
    assert_eq!(summary.marks_flagged, 1);
    assert_eq!(summary.overall_status, Severity::Error);
    assert_eq!(summary.total_questions, 2);

    assert!(report
        .data_quality
        .normalization_issues
        .iter()
        .any(|i| i.ticker == "XYZ" && i.issue == "unknown"));
    assert_eq!(report.market_context.key_tickers, vec!["AAPL", "MSFT", "SAP", "XYZ"]);
    assert_eq!(report.market_context.unavailable, vec!["XYZ"]);
    assert!(report
        .narrative
        .starts_with("Processed 3 trades with 2 issues; processed 3 marks with 1 flagged"));
}

#[tokio::test]
async fn test_report_json_keeps_stable_keys() {
    let report = orchestrator(DeskConfig::default(), desk_market())
        .run_value(desk_day())
        .await
        .unwrap();
    let value = serde_json::to_value(&report).unwrap();

    for key in [
        "scenario",
        "data_quality",
        "trade_issues",
        "pricing_flags",
        "pricing_summary",
        "question_answers",
        "market_context",
        "narrative",
        "summary",
        "execution_metadata",
    ] {
        assert!(value.get(key).is_some(), "missing {}", key);
    }
    let trade = &value["trade_issues"][1];
    assert_eq!(trade["status"], "ERROR");
    assert_eq!(trade["issues"][0]["type"], "settlement_date");
    assert!(trade["explanation"].is_string());
    assert_eq!(trade["trade"]["trade_id"], "T2");

    let mark = &value["pricing_flags"][0];
    assert_eq!(mark["classification"], "OK");
    assert!(mark["deviation_percentage"].is_number());
    assert_eq!(value["summary"]["overall_status"], "ERROR");

    let meta = &value["execution_metadata"];
    assert_eq!(meta["trace"][0]["step"], "LOAD_AND_VALIDATE_SCHEMA");
    assert_eq!(meta["config"]["orchestrator"]["max_retries"], 2);
}

#[tokio::test]
async fn test_retry_trace_then_abort() {
    let mut config = DeskConfig::default();
    config.orchestrator.max_retries = 3;
    config.orchestrator.backoff_ms = 1;
    config.orchestrator.abort_after_retry = true;
    let market = desk_market()
        .with_failure("AAPL", InjectedFailure::Transient, usize::MAX)
        .with_failure("SAP", InjectedFailure::Transient, usize::MAX);

    let report = orchestrator(config, market).run_value(desk_day()).await.unwrap();
    let meta = &report.execution_metadata;

    let trade_attempts: Vec<(u32, StepStatus)> = meta
        .trace
        .iter()
        .filter(|t| t.step == Step::ValidateTrades)
        .map(|t| (t.attempt, t.status))
        .collect();
    assert_eq!(
        trade_attempts,
        vec![
            (1, StepStatus::Error),
            (2, StepStatus::Error),
            (3, StepStatus::Error)
        ]
    );
    assert!(meta.aborted);
    assert_eq!(meta.errors.len(), 1);
    assert_eq!(meta.errors[0].step, Step::ValidateTrades);
    // The exhausted step still reports what its last attempt computed.
    assert_eq!(report.trade_issues.len(), 3);
    assert!(report.trade_issues.iter().all(|t| t
        .result
        .issues
        .iter()
        .any(|i| i.issue_type == IssueType::MarketDataUnavailable)));
    assert!(report.pricing_flags.is_empty());
    assert_eq!(report.summary.overall_status, Severity::Error);
    assert!(meta
        .trace
        .windows(2)
        .all(|w| w[0].timestamp <= w[1].timestamp));
}

#[tokio::test]
async fn test_yaml_scenario_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("desk_day.yaml");
    std::fs::write(&path, serde_yaml::to_string(&desk_day()).unwrap()).unwrap();

    let report = orchestrator(DeskConfig::default(), desk_market())
        .run_path(&path)
        .await
        .unwrap();
    assert_eq!(report.scenario.name, "desk_day");
    assert_eq!(report.scenario.metadata["desk"], "equities");
    assert_eq!(report.trade_issues.len(), 3);
}
