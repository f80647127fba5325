//! Issue and validation result models shared by the trade and mark
//! validators and by the report.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// =============================================================================
// Severity
// =============================================================================

/// Severity of an issue, and status of a validated item.
///
/// Ordered from lowest to highest: Ok < Warning < Error. The status of a
/// result is the maximum severity among its issues.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Ok,
    Warning,
    Error,
}

impl Severity {
    /// Returns the string representation of this severity.
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Ok => "OK",
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        }
    }

    /// Folds severities into a status: ERROR if any ERROR, else WARNING if
    /// any WARNING, else OK. Order-independent.
    pub fn fold<I: IntoIterator<Item = Severity>>(severities: I) -> Severity {
        severities.into_iter().max().unwrap_or(Severity::Ok)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "OK" | "NONE" => Ok(Severity::Ok),
            "WARNING" | "WARN" => Ok(Severity::Warning),
            "ERROR" => Ok(Severity::Error),
            other => Err(format!("unknown severity '{}'", other)),
        }
    }
}

// =============================================================================
// Issue Type
// =============================================================================

/// What kind of problem an issue reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueType {
    /// A required field is absent or empty
    MissingField,
    /// A field is present but unusable (non-positive quantity or price)
    InvalidValue,
    /// The ticker does not resolve cleanly against the reference master
    IdentifierMismatch,
    /// Trade currency differs from the instrument's reference currency
    CurrencyMismatch,
    /// Trade price deviates from the market reference price
    PriceTolerance,
    /// No market reference price to compare against
    MarketDataUnavailable,
    /// Counterparty is not on the allow-list
    Counterparty,
    /// Settlement date violates settlement rules
    SettlementDate,
    /// A check failed to run
    ValidationError,
}

impl IssueType {
    /// Returns the snake_case name used in reports and explanations.
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueType::MissingField => "missing_field",
            IssueType::InvalidValue => "invalid_value",
            IssueType::IdentifierMismatch => "identifier_mismatch",
            IssueType::CurrencyMismatch => "currency_mismatch",
            IssueType::PriceTolerance => "price_tolerance",
            IssueType::MarketDataUnavailable => "market_data_unavailable",
            IssueType::Counterparty => "counterparty",
            IssueType::SettlementDate => "settlement_date",
            IssueType::ValidationError => "validation_error",
        }
    }
}

impl std::fmt::Display for IssueType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Issue
// =============================================================================

/// A single finding attached to a trade or mark.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    #[serde(rename = "type")]
    pub issue_type: IssueType,
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Issue {
    pub fn new(issue_type: IssueType, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            issue_type,
            severity,
            message: message.into(),
            field: None,
        }
    }

    pub fn error(issue_type: IssueType, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Error, message)
    }

    pub fn warning(issue_type: IssueType, message: impl Into<String>) -> Self {
        Self::new(issue_type, Severity::Warning, message)
    }

    pub fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }
}

// =============================================================================
// Validation Result
// =============================================================================

/// Status, issues and explanation for one validated item.
///
/// Status is always derived from the issues through [`Severity::fold`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub status: Severity,
    pub issues: Vec<Issue>,
    pub explanation: String,
}

impl ValidationResult {
    /// Builds a result from an issue list.
    pub fn from_issues(issues: Vec<Issue>) -> Self {
        let status = Severity::fold(issues.iter().map(|i| i.severity));
        let explanation = explain(status, &issues);
        Self {
            status,
            issues,
            explanation,
        }
    }

    /// Number of issues per severity.
    pub fn counts(&self) -> BTreeMap<Severity, usize> {
        let mut counts = BTreeMap::new();
        for issue in &self.issues {
            *counts.entry(issue.severity).or_insert(0) += 1;
        }
        counts
    }

    pub fn has_issues(&self) -> bool {
        !self.issues.is_empty()
    }
}

/// `"All checks passed."` or
/// `"WARNING: 1 issue(s). WARNING price_tolerance on price: deviates 3.00% from market"`.
fn explain(status: Severity, issues: &[Issue]) -> String {
    if issues.is_empty() {
        return "All checks passed.".to_string();
    }
    let details = issues
        .iter()
        .map(|issue| match &issue.field {
            Some(field) => format!(
                "{} {} on {}: {}",
                issue.severity, issue.issue_type, field, issue.message
            ),
            None => format!("{} {}: {}", issue.severity, issue.issue_type, issue.message),
        })
        .collect::<Vec<_>>()
        .join("; ");
    format!("{}: {} issue(s). {}", status, issues.len(), details)
}
