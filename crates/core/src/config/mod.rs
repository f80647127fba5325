//! Desk agent configuration.
//!
//! One explicit [`DeskConfig`] is built at startup and handed to the
//! normalizer, the validators and the orchestrator. Nothing reads the
//! environment after that.
//!
//! Layers, lowest precedence first:
//!
//! ```text
//! built-in defaults → config file (JSON/YAML) → environment → explicit overrides
//! ```
//!
//! Files may be partial; missing keys keep the value of the layer below.

mod env;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::constants::*;
use crate::errors::{Error, Result};
use crate::issues::Severity;

pub use env::ENV_KEYS;

// =============================================================================
// Sections
// =============================================================================

/// Identifier normalizer thresholds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerThresholds {
    pub reject: f64,
    pub ambiguous_low: f64,
    pub ambiguous_high: f64,
    pub top_k: usize,
}

impl Default for NormalizerThresholds {
    fn default() -> Self {
        Self {
            reject: DEFAULT_REJECT_THRESHOLD,
            ambiguous_low: DEFAULT_AMBIGUOUS_LOW,
            ambiguous_high: DEFAULT_AMBIGUOUS_HIGH,
            top_k: DEFAULT_TOP_K,
        }
    }
}

/// Trade (OMS) check settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OmsConfig {
    pub price_warning_threshold: f64,
    pub price_error_threshold: f64,
    pub allowed_counterparties: Vec<String>,
    pub settlement_days: u32,
    pub identifier_confidence_floor: f64,
    /// Severity of the issue raised when no market price is available.
    /// `OK` suppresses the issue.
    pub market_data_unavailable_severity: Severity,
    pub default_currency: String,
}

impl Default for OmsConfig {
    fn default() -> Self {
        Self {
            price_warning_threshold: DEFAULT_PRICE_WARNING_THRESHOLD,
            price_error_threshold: DEFAULT_PRICE_ERROR_THRESHOLD,
            allowed_counterparties: DEFAULT_COUNTERPARTIES
                .iter()
                .map(|c| c.to_string())
                .collect(),
            settlement_days: DEFAULT_SETTLEMENT_DAYS,
            identifier_confidence_floor: DEFAULT_IDENTIFIER_CONFIDENCE_FLOOR,
            market_data_unavailable_severity: Severity::Warning,
            default_currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Per-instrument mark tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ToleranceOverride {
    pub ok_threshold: f64,
    pub review_threshold: f64,
}

/// Mark (pricing) check settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    pub ok_threshold: f64,
    pub review_threshold: f64,
    pub stale_days: i64,
    /// Keyed by upper-cased ticker.
    pub instrument_overrides: BTreeMap<String, ToleranceOverride>,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            ok_threshold: DEFAULT_MARK_OK_THRESHOLD,
            review_threshold: DEFAULT_MARK_REVIEW_THRESHOLD,
            stale_days: DEFAULT_STALE_DAYS,
            instrument_overrides: BTreeMap::new(),
        }
    }
}

impl PricingConfig {
    /// Effective (ok, review) thresholds for `ticker`, and whether an
    /// override supplied them.
    pub fn thresholds_for(&self, ticker: &str) -> (f64, f64, bool) {
        match self.instrument_overrides.get(&ticker.trim().to_uppercase()) {
            Some(o) => (o.ok_threshold, o.review_threshold, true),
            None => (self.ok_threshold, self.review_threshold, false),
        }
    }
}

/// Orchestrator retry, budget and concurrency settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Attempts per step, including the first.
    pub max_retries: u32,
    pub backoff_ms: u64,
    pub abort_after_retry: bool,
    pub performance_budget_ms: u64,
    pub grace_period_ms: u64,
    pub fetch_timeout_ms: u64,
    pub max_concurrency: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            backoff_ms: DEFAULT_BACKOFF_MS,
            abort_after_retry: false,
            performance_budget_ms: DEFAULT_PERFORMANCE_BUDGET_MS,
            grace_period_ms: DEFAULT_GRACE_PERIOD_MS,
            fetch_timeout_ms: DEFAULT_FETCH_TIMEOUT_MS,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
        }
    }
}

// =============================================================================
// Desk Config
// =============================================================================

/// Complete configuration for one process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    pub normalizer: NormalizerThresholds,
    pub oms: OmsConfig,
    pub pricing: PricingConfig,
    pub orchestrator: OrchestratorConfig,
    pub refmaster_path: PathBuf,
    pub scenarios_path: PathBuf,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            normalizer: NormalizerThresholds::default(),
            oms: OmsConfig::default(),
            pricing: PricingConfig::default(),
            orchestrator: OrchestratorConfig::default(),
            refmaster_path: PathBuf::from(DEFAULT_REFMASTER_PATH),
            scenarios_path: PathBuf::from(DEFAULT_SCENARIOS_PATH),
        }
    }
}

impl DeskConfig {
    /// Builds the configuration from every layer and validates it.
    ///
    /// `lookup` resolves environment keys; pass `|k| std::env::var(k).ok()`
    /// in production and a map in tests.
    pub fn load<F>(file: Option<&Path>, lookup: F, overrides: &[Value]) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(lookup)?;
        for layer in overrides {
            config = config.with_overrides(layer)?;
        }
        config.validate()?;
        Ok(config)
    }

    /// Defaults merged with the environment of the current process.
    pub fn from_env() -> Result<Self> {
        Self::load(None, |key| std::env::var(key).ok(), &[])
    }

    /// Reads a JSON or YAML file (by extension) over the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))?;
        let is_yaml = matches!(
            path.extension().and_then(|e| e.to_str()),
            Some("yaml") | Some("yml")
        );
        let parsed: Self = if is_yaml {
            serde_yaml::from_str(&raw).map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))
        } else {
            serde_json::from_str(&raw).map_err(|e| Error::ConfigIO(format!("{}: {}", path.display(), e)))
        }?;
        debug!("Loaded configuration file {}", path.display());
        Ok(parsed)
    }

    /// Applies environment keys (see [`ENV_KEYS`]) on top of `self`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        env::apply(self, lookup)
    }

    /// Deep-merges `overrides` (a partial config document) over `self`.
    pub fn with_overrides(&self, overrides: &Value) -> Result<Self> {
        let mut base = serde_json::to_value(self)?;
        merge(&mut base, overrides);
        serde_json::from_value(base).map_err(|e| Error::invalid_config(e.to_string()))
    }

    /// Rejects threshold combinations the validators cannot honor.
    pub fn validate(&self) -> Result<()> {
        let n = &self.normalizer;
        check_unit("normalizer.reject", n.reject)?;
        check_unit("normalizer.ambiguous_low", n.ambiguous_low)?;
        check_unit("normalizer.ambiguous_high", n.ambiguous_high)?;
        if n.ambiguous_low > n.ambiguous_high {
            return Err(Error::invalid_config(
                "normalizer.ambiguous_low must not exceed normalizer.ambiguous_high",
            ));
        }
        if n.top_k == 0 {
            return Err(Error::invalid_config("normalizer.top_k must be at least 1"));
        }

        let o = &self.oms;
        check_positive("oms.price_warning_threshold", o.price_warning_threshold)?;
        check_positive("oms.price_error_threshold", o.price_error_threshold)?;
        if o.price_warning_threshold > o.price_error_threshold {
            return Err(Error::invalid_config(
                "oms.price_warning_threshold must not exceed oms.price_error_threshold",
            ));
        }
        check_unit("oms.identifier_confidence_floor", o.identifier_confidence_floor)?;

        let p = &self.pricing;
        check_positive("pricing.ok_threshold", p.ok_threshold)?;
        check_positive("pricing.review_threshold", p.review_threshold)?;
        if p.ok_threshold > p.review_threshold {
            return Err(Error::invalid_config(
                "pricing.ok_threshold must not exceed pricing.review_threshold",
            ));
        }
        if p.stale_days < 0 {
            return Err(Error::invalid_config("pricing.stale_days must not be negative"));
        }
        for (ticker, o) in &p.instrument_overrides {
            if o.ok_threshold < 0.0 || o.ok_threshold > o.review_threshold {
                return Err(Error::invalid_config(format!(
                    "pricing.instrument_overrides.{}: ok_threshold must be within [0, review_threshold]",
                    ticker
                )));
            }
        }

        if self.orchestrator.max_concurrency == 0 {
            return Err(Error::invalid_config(
                "orchestrator.max_concurrency must be at least 1",
            ));
        }
        Ok(())
    }
}

fn check_unit(name: &str, value: f64) -> Result<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(Error::invalid_config(format!("{} must be within [0, 1], got {}", name, value)))
    }
}

fn check_positive(name: &str, value: f64) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::invalid_config(format!("{} must be positive, got {}", name, value)))
    }
}

fn merge(base: &mut Value, patch: &Value) {
    match (base, patch) {
        (Value::Object(base), Value::Object(patch)) => {
            for (key, value) in patch {
                merge(base.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
        (base, patch) => *base = patch.clone(),
    }
}

/// Parses `section.key=value` into a nested override document. The value
/// is read as JSON when possible and as a string otherwise.
pub fn parse_override(assignment: &str) -> Result<Value> {
    let (path, raw) = assignment
        .split_once('=')
        .ok_or_else(|| Error::invalid_config(format!("expected key=value, got '{}'", assignment)))?;
    let value = serde_json::from_str(raw.trim()).unwrap_or_else(|_| Value::String(raw.trim().to_string()));
    let keys: Vec<&str> = path.trim().split('.').filter(|k| !k.is_empty()).collect();
    if keys.is_empty() {
        return Err(Error::invalid_config(format!("empty key in '{}'", assignment)));
    }
    Ok(keys.iter().rev().fold(value, |acc, key| {
        let mut map = serde_json::Map::new();
        map.insert(key.to_string(), acc);
        Value::Object(map)
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use std::io::Write;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_defaults() {
        let config = DeskConfig::default();
        assert_eq!(config.oms.settlement_days, 2);
        assert_eq!(config.oms.allowed_counterparties.len(), 6);
        assert_eq!(config.pricing.stale_days, 5);
        assert_eq!(config.orchestrator.max_retries, 2);
        assert_eq!(config.orchestrator.backoff_ms, 500);
        assert!(!config.orchestrator.abort_after_retry);
        assert_eq!(config.oms.market_data_unavailable_severity, Severity::Warning);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_file_keeps_defaults() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        writeln!(file, "oms:\n  settlement_days: 1\npricing:\n  stale_days: 3").unwrap();

        let config = DeskConfig::load(Some(file.path()), no_env, &[]).unwrap();
        assert_eq!(config.oms.settlement_days, 1);
        assert_eq!(config.pricing.stale_days, 3);
        assert_eq!(config.oms.price_error_threshold, DEFAULT_PRICE_ERROR_THRESHOLD);
    }

    #[test]
    fn test_precedence_file_env_override() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"{{"orchestrator": {{"max_retries": 4, "backoff_ms": 10}}}}"#).unwrap();

        let env: HashMap<&str, &str> = [("DESK_AGENT_MAX_RETRIES", "5")].into_iter().collect();
        let lookup = |k: &str| env.get(k).map(|v| v.to_string());

        let config = DeskConfig::load(
            Some(file.path()),
            lookup,
            &[json!({"orchestrator": {"abort_after_retry": true}})],
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_retries, 5);
        assert_eq!(config.orchestrator.backoff_ms, 10);
        assert!(config.orchestrator.abort_after_retry);

        let config = DeskConfig::load(
            Some(file.path()),
            lookup,
            &[json!({"orchestrator": {"max_retries": 1}})],
        )
        .unwrap();
        assert_eq!(config.orchestrator.max_retries, 1);
    }

    #[test]
    fn test_invalid_thresholds_rejected() {
        let config = DeskConfig::default()
            .with_overrides(&json!({"pricing": {"ok_threshold": 0.1, "review_threshold": 0.05}}))
            .unwrap();
        assert!(matches!(config.validate(), Err(Error::InvalidConfigValue(_))));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = DeskConfig::from_file(Path::new("/nonexistent/desk.json")).unwrap_err();
        assert!(matches!(err, Error::ConfigIO(_)));
    }

    #[test]
    fn test_instrument_override_lookup() {
        let config = DeskConfig::default()
            .with_overrides(&json!({"pricing": {"instrument_overrides": {
                "TSLA": {"ok_threshold": 0.05, "review_threshold": 0.10}
            }}}))
            .unwrap();
        assert_eq!(config.pricing.thresholds_for("tsla"), (0.05, 0.10, true));
        assert_eq!(config.pricing.thresholds_for("AAPL"), (0.02, 0.05, false));
    }

    #[test]
    fn test_parse_override() {
        assert_eq!(
            parse_override("orchestrator.max_retries=3").unwrap(),
            json!({"orchestrator": {"max_retries": 3}})
        );
        assert_eq!(
            parse_override("oms.default_currency=EUR").unwrap(),
            json!({"oms": {"default_currency": "EUR"}})
        );
        assert!(parse_override("no_equals_sign").is_err());
    }
}
