//! Run report and its summary statistics.

use chrono::{DateTime, Utc};
use deskagent_market_data::EquitySnapshot;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::trace::{Step, TraceEntry};
use crate::config::DeskConfig;
use crate::issues::{Severity, ValidationResult};
use crate::oms::Trade;
use crate::pricing::{EnrichedMark, PricingSummary};
use crate::questions::Answer;

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub name: String,
    pub description: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerNormalization {
    pub input: String,
    pub normalized: String,
    pub confidence: f64,
    pub ambiguous: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizationIssue {
    pub ticker: String,
    /// `unknown` or `ambiguous_or_low_confidence`
    pub issue: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub ticker_normalizations: Vec<TickerNormalization>,
    pub normalization_issues: Vec<NormalizationIssue>,
}

/// Validation result for one trade, next to the trade itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeReport {
    #[serde(flatten)]
    pub result: ValidationResult,
    pub trade: Trade,
}

/// Mean 1D and 5D returns across snapshots, as signed percentages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketMovements {
    pub avg_return_1d: Option<f64>,
    pub avg_return_5d: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketContext {
    pub key_tickers: Vec<String>,
    pub snapshots: Vec<EquitySnapshot>,
    pub market_movements: MarketMovements,
    pub unavailable: Vec<String>,
}

/// Headline numbers for the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub total_trades: usize,
    pub trades_with_issues: usize,
    pub trade_issue_percentage: f64,
    pub total_marks: usize,
    pub marks_flagged: usize,
    pub mark_flag_percentage: f64,
    pub total_questions: usize,
    pub questions_answered: usize,
    pub failed_steps: Vec<Step>,
    pub overall_status: Severity,
    pub within_budget: bool,
}

/// A failure seen during the run, with step and item context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunError {
    pub step: Step,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item: Option<String>,
    pub message: String,
}

impl RunError {
    pub fn step(step: Step, message: impl Into<String>) -> Self {
        Self {
            step,
            item: None,
            message: message.into(),
        }
    }

    pub fn item(step: Step, item: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            step,
            item: Some(item.into()),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_ms: f64,
    pub trace: Vec<TraceEntry>,
    pub errors: Vec<RunError>,
    pub skipped_steps: Vec<Step>,
    pub aborted: bool,
    /// Configuration the run actually used
    pub config: DeskConfig,
}

/// The write-once result of one scenario run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub scenario: ScenarioInfo,
    pub data_quality: DataQuality,
    pub trade_issues: Vec<TradeReport>,
    pub pricing_flags: Vec<EnrichedMark>,
    pub pricing_summary: PricingSummary,
    pub question_answers: Vec<Answer>,
    pub market_context: MarketContext,
    pub narrative: String,
    pub summary: Summary,
    pub execution_metadata: ExecutionMetadata,
}

// =============================================================================
// Aggregation
// =============================================================================

/// `count / total`, 0.0 when `total` is 0.
pub fn percentage(count: usize, total: usize) -> f64 {
    if total == 0 {
        0.0
    } else {
        count as f64 / total as f64
    }
}

/// Worst outcome across trades, marks and failed steps.
pub fn overall_status(trades: &[TradeReport], marks: &[EnrichedMark], step_failed: bool) -> Severity {
    let trade_statuses = trades.iter().map(|t| t.result.status);
    let mark_statuses = marks.iter().map(|m| m.classification.severity());
    let step_status = step_failed.then_some(Severity::Error);
    Severity::fold(trade_statuses.chain(mark_statuses).chain(step_status))
}

pub struct SummaryInput<'a> {
    pub trades: &'a [TradeReport],
    pub marks: &'a [EnrichedMark],
    pub answers: &'a [Answer],
    pub failed_steps: &'a [Step],
    pub within_budget: bool,
}

impl Summary {
    pub fn compute(input: SummaryInput<'_>) -> Self {
        let trades_with_issues = input
            .trades
            .iter()
            .filter(|t| t.result.status != Severity::Ok)
            .count();
        let marks_flagged = input
            .marks
            .iter()
            .filter(|m| m.classification.is_flagged())
            .count();
        Self {
            total_trades: input.trades.len(),
            trades_with_issues,
            trade_issue_percentage: percentage(trades_with_issues, input.trades.len()),
            total_marks: input.marks.len(),
            marks_flagged,
            mark_flag_percentage: percentage(marks_flagged, input.marks.len()),
            total_questions: input.answers.len(),
            questions_answered: input.answers.iter().filter(|a| a.is_answered()).count(),
            failed_steps: input.failed_steps.to_vec(),
            overall_status: overall_status(input.trades, input.marks, !input.failed_steps.is_empty()),
            within_budget: input.within_budget,
        }
    }
}

const TOP_ISSUES: usize = 3;

/// Templated account of the run: totals, then the most severe findings.
pub fn narrative(summary: &Summary, trades: &[TradeReport], marks: &[EnrichedMark], aborted: bool) -> String {
    let mut text = format!(
        "Processed {} trades with {} issues; processed {} marks with {} flagged; overall status {}.",
        summary.total_trades,
        summary.trades_with_issues,
        summary.total_marks,
        summary.marks_flagged,
        summary.overall_status
    );

    let mut findings: Vec<(Severity, String)> = Vec::new();
    for (index, trade) in trades.iter().enumerate() {
        let label = trade
            .trade
            .trade_id
            .clone()
            .unwrap_or_else(|| format!("#{}", index + 1));
        for issue in trade.result.issues.iter().filter(|i| i.severity > Severity::Ok) {
            findings.push((
                issue.severity,
                format!("trade {} {} ({})", label, issue.issue_type, issue.severity),
            ));
        }
    }
    for mark in marks.iter().filter(|m| m.classification.is_flagged()) {
        findings.push((
            mark.classification.severity(),
            format!("mark {} {}", mark.mark.symbol(), mark.classification),
        ));
    }
    // Stable sort keeps input order within a severity.
    findings.sort_by(|a, b| b.0.cmp(&a.0));
    if !findings.is_empty() {
        let top: Vec<&str> = findings.iter().take(TOP_ISSUES).map(|(_, f)| f.as_str()).collect();
        text.push_str(&format!(" Top issues: {}.", top.join("; ")));
    }

    if !summary.failed_steps.is_empty() {
        let steps: Vec<&str> = summary.failed_steps.iter().map(Step::as_str).collect();
        text.push_str(&format!(" Failed steps: {}.", steps.join(", ")));
    }
    if aborted {
        text.push_str(" Run aborted before completion.");
    }
    if !summary.within_budget {
        text.push_str(" Performance budget exceeded.");
    }
    text
}
