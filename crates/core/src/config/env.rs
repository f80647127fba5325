use std::path::PathBuf;
use std::str::FromStr;

use super::DeskConfig;
use crate::errors::{Error, Result};

/// Environment keys understood by [`DeskConfig::apply_env`].
pub const ENV_KEYS: &[&str] = &[
    "DESK_AGENT_MAX_RETRIES",
    "DESK_AGENT_BACKOFF_MS",
    "DESK_AGENT_ABORT_AFTER_RETRY",
    "DESK_AGENT_PERF_BUDGET_MS",
    "DESK_AGENT_GRACE_PERIOD_MS",
    "DESK_AGENT_FETCH_TIMEOUT_MS",
    "DESK_AGENT_MAX_CONCURRENCY",
    "DESK_AGENT_SCENARIOS_PATH",
    "REFMASTER_DATA_PATH",
    "OMS_PRICE_WARNING_THRESHOLD",
    "OMS_PRICE_ERROR_THRESHOLD",
    "OMS_COUNTERPARTIES",
    "OMS_SETTLEMENT_DAYS",
    "PRICING_OK_THRESHOLD",
    "PRICING_REVIEW_THRESHOLD",
    "PRICING_STALE_DAYS",
];

fn parsed<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::invalid_config(format!("{}={}: {}", key, raw, e))),
        _ => Ok(None),
    }
}

fn flag<F>(lookup: &F, key: &str) -> Result<Option<bool>>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key).map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => Ok(Some(true)),
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => Ok(Some(false)),
        Some(v) => Err(Error::invalid_config(format!("{}={}: expected a boolean", key, v))),
    }
}

pub(super) fn apply<F>(config: &mut DeskConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let orch = &mut config.orchestrator;
    if let Some(v) = parsed(&lookup, "DESK_AGENT_MAX_RETRIES")? {
        orch.max_retries = v;
    }
    if let Some(v) = parsed(&lookup, "DESK_AGENT_BACKOFF_MS")? {
        orch.backoff_ms = v;
    }
    if let Some(v) = flag(&lookup, "DESK_AGENT_ABORT_AFTER_RETRY")? {
        orch.abort_after_retry = v;
    }
    if let Some(v) = parsed(&lookup, "DESK_AGENT_PERF_BUDGET_MS")? {
        orch.performance_budget_ms = v;
    }
    if let Some(v) = parsed(&lookup, "DESK_AGENT_GRACE_PERIOD_MS")? {
        orch.grace_period_ms = v;
    }
    if let Some(v) = parsed(&lookup, "DESK_AGENT_FETCH_TIMEOUT_MS")? {
        orch.fetch_timeout_ms = v;
    }
    if let Some(v) = parsed(&lookup, "DESK_AGENT_MAX_CONCURRENCY")? {
        orch.max_concurrency = v;
    }

    if let Some(v) = lookup("DESK_AGENT_SCENARIOS_PATH").filter(|v| !v.is_empty()) {
        config.scenarios_path = PathBuf::from(v);
    }
    if let Some(v) = lookup("REFMASTER_DATA_PATH").filter(|v| !v.is_empty()) {
        config.refmaster_path = PathBuf::from(v);
    }

    let oms = &mut config.oms;
    if let Some(v) = parsed(&lookup, "OMS_PRICE_WARNING_THRESHOLD")? {
        oms.price_warning_threshold = v;
    }
    if let Some(v) = parsed(&lookup, "OMS_PRICE_ERROR_THRESHOLD")? {
        oms.price_error_threshold = v;
    }
    if let Some(v) = lookup("OMS_COUNTERPARTIES") {
        let parties: Vec<String> = v
            .split(',')
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        if !parties.is_empty() {
            oms.allowed_counterparties = parties;
        }
    }
    if let Some(v) = parsed(&lookup, "OMS_SETTLEMENT_DAYS")? {
        oms.settlement_days = v;
    }

    let pricing = &mut config.pricing;
    if let Some(v) = parsed(&lookup, "PRICING_OK_THRESHOLD")? {
        pricing.ok_threshold = v;
    }
    if let Some(v) = parsed(&lookup, "PRICING_REVIEW_THRESHOLD")? {
        pricing.review_threshold = v;
    }
    if let Some(v) = parsed(&lookup, "PRICING_STALE_DAYS")? {
        pricing.stale_days = v;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides_defaults() {
        let mut config = DeskConfig::default();
        apply(
            &mut config,
            env(&[
                ("OMS_SETTLEMENT_DAYS", "1"),
                ("OMS_COUNTERPARTIES", "ms, gs ,"),
                ("PRICING_STALE_DAYS", "10"),
                ("DESK_AGENT_ABORT_AFTER_RETRY", "true"),
                ("REFMASTER_DATA_PATH", "/tmp/ref.csv"),
            ]),
        )
        .unwrap();

        assert_eq!(config.oms.settlement_days, 1);
        assert_eq!(config.oms.allowed_counterparties, vec!["MS", "GS"]);
        assert_eq!(config.pricing.stale_days, 10);
        assert!(config.orchestrator.abort_after_retry);
        assert_eq!(config.refmaster_path, PathBuf::from("/tmp/ref.csv"));
    }

    #[test]
    fn test_bad_number_names_the_key() {
        let mut config = DeskConfig::default();
        let err = apply(&mut config, env(&[("PRICING_OK_THRESHOLD", "two percent")])).unwrap_err();
        assert!(err.to_string().contains("PRICING_OK_THRESHOLD"));
    }

    #[test]
    fn test_bad_flag_rejected() {
        let mut config = DeskConfig::default();
        assert!(apply(&mut config, env(&[("DESK_AGENT_ABORT_AFTER_RETRY", "maybe")])).is_err());
    }

    #[test]
    fn test_empty_values_ignored() {
        let mut config = DeskConfig::default();
        apply(&mut config, env(&[("OMS_SETTLEMENT_DAYS", " "), ("OMS_COUNTERPARTIES", "")])).unwrap();
        assert_eq!(config, DeskConfig::default());
    }
}
