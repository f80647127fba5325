//! Scenario documents: loading, schema checking and typed parsing.

use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::schema::validate_scenario_value;
use crate::errors::{Error, Result};
use crate::oms::Trade;
use crate::pricing::Mark;
use crate::questions::Question;

/// A bundle of trades, marks and questions processed by one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub trades: Vec<Trade>,
    #[serde(default)]
    pub marks: Vec<Mark>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Scenario {
    pub fn new(name: &str, description: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            trades: Vec::new(),
            marks: Vec::new(),
            questions: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Schema-checks `document`, then parses it.
    pub fn from_value(document: Value) -> Result<Self> {
        validate_scenario_value(&document)?;
        serde_json::from_value(document)
            .map_err(|e| Error::ScenarioIO(format!("scenario does not parse: {}", e)))
    }

    /// Tickers referenced by trades, marks and questions, first occurrence
    /// first, without duplicates.
    pub fn referenced_tickers(&self) -> Vec<String> {
        let trades = self.trades.iter().filter_map(|t| t.ticker.clone());
        let marks = self.marks.iter().map(|m| m.ticker.clone());
        let questions = self.questions.iter().filter_map(|q| {
            q.ticker
                .clone()
                .or_else(|| crate::questions::extract_ticker(&q.question))
        });
        let mut seen = std::collections::HashSet::new();
        trades
            .chain(marks)
            .chain(questions)
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty() && seen.insert(t.to_uppercase()))
            .collect()
    }
}

fn is_yaml(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("yaml") || e.eq_ignore_ascii_case("yml"))
}

fn is_scenario_file(path: &Path) -> bool {
    is_yaml(path)
        || path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}

/// Reads a JSON or YAML scenario file into an untyped document.
pub fn load_scenario_value(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| Error::ScenarioIO(format!("{}: {}", path.display(), e)))?;
    let document = if is_yaml(path) {
        serde_yaml::from_str(&text)
            .map_err(|e| Error::ScenarioIO(format!("{}: {}", path.display(), e)))?
    } else {
        serde_json::from_str(&text)
            .map_err(|e| Error::ScenarioIO(format!("{}: {}", path.display(), e)))?
    };
    debug!("Loaded scenario document {}", path.display());
    Ok(document)
}

/// Loads, schema-checks and parses a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    Scenario::from_value(load_scenario_value(path)?)
}

/// Resolves `name_or_path` as given, then relative to `scenarios_dir`.
pub fn resolve_scenario_path(name_or_path: &str, scenarios_dir: &Path) -> Result<PathBuf> {
    let direct = PathBuf::from(name_or_path);
    if direct.is_file() {
        return Ok(direct);
    }
    let candidate = scenarios_dir.join(name_or_path);
    if candidate.is_file() {
        return Ok(candidate);
    }
    Err(Error::ScenarioIO(format!("scenario not found: {}", name_or_path)))
}

/// Outcome of checking one scenario file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioFileCheck {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ScenarioFileCheck {
    pub fn is_valid(&self) -> bool {
        self.error.is_none()
    }
}

/// Checks every `.json`, `.yaml` and `.yml` file in `dir`, sorted by path.
pub fn validate_scenario_files(dir: &Path) -> Result<Vec<ScenarioFileCheck>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| Error::ScenarioIO(format!("{}: {}", dir.display(), e)))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && is_scenario_file(p))
        .collect();
    paths.sort();

    Ok(paths
        .into_iter()
        .map(|path| match load_scenario(&path) {
            Ok(scenario) => ScenarioFileCheck {
                path,
                name: Some(scenario.name),
                error: None,
            },
            Err(e) => ScenarioFileCheck {
                path,
                name: None,
                error: Some(e.to_string()),
            },
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    const YAML: &str = "\
name: clean_day
description: One clean trade
trades:
  - trade_id: T1
    ticker: AAPL
    quantity: 100
    price: 150.0
    currency: USD
    counterparty: MS
    trade_dt: 2024-06-17
    settle_dt: 2024-06-19
marks:
  - ticker: AAPL
    internal_mark: 150.0
    as_of_date: 2024-06-17
questions:
  - How did AAPL perform this month?
metadata:
  desk: equities
";

    #[test]
    fn test_load_yaml_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clean.yaml");
        fs::write(&path, YAML).unwrap();

        let scenario = load_scenario(&path).unwrap();
        assert_eq!(scenario.name, "clean_day");
        assert_eq!(scenario.trades[0].quantity, Some(100.0));
        assert_eq!(scenario.marks[0].internal_mark, 150.0);
        assert_eq!(scenario.questions[0].question, "How did AAPL perform this month?");
        assert_eq!(scenario.metadata["desk"], "equities");
        assert_eq!(scenario.referenced_tickers(), vec!["AAPL"]);
    }

    #[test]
    fn test_validate_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("a.yaml"), YAML).unwrap();
        fs::write(dir.path().join("b.json"), r#"{"name": "broken"}"#).unwrap();
        fs::write(dir.path().join("c.json"), "{not json").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let checks = validate_scenario_files(dir.path()).unwrap();
        assert_eq!(checks.len(), 3);
        assert!(checks[0].is_valid());
        assert_eq!(checks[0].name.as_deref(), Some("clean_day"));
        assert!(checks[1].error.as_deref().is_some_and(|e| e.contains("description")));
        assert!(!checks[2].is_valid());
    }

    #[test]
    fn test_resolve_relative_to_scenarios_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clean.yaml"), YAML).unwrap();
        let resolved = resolve_scenario_path("clean.yaml", dir.path()).unwrap();
        assert_eq!(resolved, dir.path().join("clean.yaml"));
        assert!(resolve_scenario_path("missing.yaml", dir.path()).is_err());
    }
}
