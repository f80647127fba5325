//! Pipeline steps, execution trace and the per-step retry wrapper.

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::errors::Result;

/// Pipeline steps, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Step {
    LoadAndValidateSchema,
    NormalizeIdentifiers,
    ValidateTrades,
    ValidateMarks,
    AnswerQuestions,
    GatherMarketContext,
    AggregateReport,
}

impl Step {
    pub const ORDER: [Step; 7] = [
        Step::LoadAndValidateSchema,
        Step::NormalizeIdentifiers,
        Step::ValidateTrades,
        Step::ValidateMarks,
        Step::AnswerQuestions,
        Step::GatherMarketContext,
        Step::AggregateReport,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::LoadAndValidateSchema => "LOAD_AND_VALIDATE_SCHEMA",
            Step::NormalizeIdentifiers => "NORMALIZE_IDENTIFIERS",
            Step::ValidateTrades => "VALIDATE_TRADES",
            Step::ValidateMarks => "VALIDATE_MARKS",
            Step::AnswerQuestions => "ANSWER_QUESTIONS",
            Step::GatherMarketContext => "GATHER_MARKET_CONTEXT",
            Step::AggregateReport => "AGGREGATE_REPORT",
        }
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    Ok,
    Error,
}

/// One attempt of one step. Appended in chronological order, never edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceEntry {
    pub step: Step,
    pub status: StepStatus,
    pub attempt: u32,
    pub duration_ms: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Retry settings for [`run_step`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts; zero is treated as one
    pub max_retries: u32,
    /// Linear backoff unit: attempt N waits `backoff * N` before N + 1
    pub backoff: Duration,
    /// No retry starts at or after this instant.
    pub deadline: Option<tokio::time::Instant>,
}

impl RetryPolicy {
    pub fn attempts(&self) -> u32 {
        self.max_retries.max(1)
    }

    pub fn with_deadline(mut self, deadline: tokio::time::Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

impl From<&OrchestratorConfig> for RetryPolicy {
    fn from(config: &OrchestratorConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            backoff: Duration::from_millis(config.backoff_ms),
            deadline: None,
        }
    }
}

pub(crate) fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Records a single, already finished attempt.
pub(crate) fn record(trace: &mut Vec<TraceEntry>, step: Step, start: Instant, error: Option<String>) {
    trace.push(TraceEntry {
        step,
        status: if error.is_some() { StepStatus::Error } else { StepStatus::Ok },
        attempt: 1,
        duration_ms: elapsed_ms(start),
        error,
        timestamp: Utc::now(),
    });
}

/// Runs `attempt_fn` until it succeeds or the policy is exhausted, appending
/// a trace entry per attempt. Returns the last error on exhaustion, or as
/// soon as the next attempt could not start before the policy deadline.
pub async fn run_step<T, F, Fut>(
    step: Step,
    policy: RetryPolicy,
    trace: &mut Vec<TraceEntry>,
    mut attempt_fn: F,
) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let attempts = policy.attempts();
    let mut attempt = 1;
    loop {
        let start = Instant::now();
        let outcome = attempt_fn(attempt).await;
        let duration_ms = elapsed_ms(start);

        match outcome {
            Ok(value) => {
                trace.push(TraceEntry {
                    step,
                    status: StepStatus::Ok,
                    attempt,
                    duration_ms,
                    error: None,
                    timestamp: Utc::now(),
                });
                info!("{} succeeded on attempt {} ({:.1} ms)", step, attempt, duration_ms);
                return Ok(value);
            }
            Err(e) => {
                warn!("{} failed on attempt {}/{}: {}", step, attempt, attempts, e);
                trace.push(TraceEntry {
                    step,
                    status: StepStatus::Error,
                    attempt,
                    duration_ms,
                    error: Some(e.to_string()),
                    timestamp: Utc::now(),
                });
                if attempt >= attempts {
                    return Err(e);
                }
                let wake = tokio::time::Instant::now() + policy.backoff * attempt;
                if let Some(deadline) = policy.deadline {
                    if wake >= deadline {
                        warn!(
                            "{} not retried: attempt {} would start after the run deadline",
                            step,
                            attempt + 1
                        );
                        return Err(e);
                    }
                }
                tokio::time::sleep_until(wake).await;
                attempt += 1;
            }
        }
    }
}
