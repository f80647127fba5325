//! Orchestrator service.
//!
//! Runs one scenario through the fixed step pipeline:
//!
//! ```text
//! LOAD_AND_VALIDATE_SCHEMA → NORMALIZE_IDENTIFIERS → VALIDATE_TRADES
//!   → VALIDATE_MARKS → ANSWER_QUESTIONS → GATHER_MARKET_CONTEXT → AGGREGATE_REPORT
//! ```
//!
//! Steps 2–6 go through [`run_step`]. Per-item work inside a step runs
//! concurrently, is isolated from panics and is cut off at the run's hard
//! stop (`performance_budget_ms + grace_period_ms`). A step only fails when
//! every market data lookup it made failed transiently. An expired per-call
//! timeout is an item outcome (no market data), never a step failure, and
//! an exhausted step still reports the items its last attempt computed.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, Utc};
use deskagent_market_data::{CachedMarketData, MarketDataSource, PriceLookup};
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use log::{debug, error, info, warn};
use serde_json::Value;
use tokio::time::Instant;

use super::market_context::{build_context, context_date, fetch_snapshots, key_tickers};
use super::report::{
    narrative, DataQuality, ExecutionMetadata, MarketContext, NormalizationIssue, Report,
    RunError, ScenarioInfo, Summary, SummaryInput, TickerNormalization, TradeReport,
};
use super::scenario::{load_scenario_value, Scenario};
use super::trace::{self, run_step, RetryPolicy, Step, TraceEntry};
use crate::config::DeskConfig;
use crate::errors::{Error, Result};
use crate::issues::{Issue, IssueType, ValidationResult};
use crate::oms::{SettlementCalendar, Trade, TradeValidator, WeekendCalendar};
use crate::pricing::{EnrichedMark, Mark, MarkValidator, PricingSummary};
use crate::questions::{Answer, AnswerError, Intent, Question, QuestionAnswerer, SnapshotAnswerer};
use crate::refmaster::EquityNormalizer;

const DEADLINE_MESSAGE: &str = "not completed before deadline";

// =============================================================================
// Per-item execution
// =============================================================================

enum ItemOutcome<T> {
    Done(T),
    Panicked(String),
    TimedOut,
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Runs `work` over `items` with at most `concurrency` in flight. Results
/// keep input order; items unfinished at `hard_stop` come back as
/// [`ItemOutcome::TimedOut`].
async fn run_items<'a, I, T, F, Fut>(
    items: &'a [I],
    concurrency: usize,
    hard_stop: Instant,
    work: F,
) -> Vec<ItemOutcome<T>>
where
    F: Fn(&'a I) -> Fut,
    Fut: Future<Output = T>,
{
    let mut slots: Vec<Option<ItemOutcome<T>>> = items.iter().map(|_| None).collect();
    let mut pending = stream::iter(items.iter().enumerate())
        .map(|(index, item)| {
            AssertUnwindSafe(work(item))
                .catch_unwind()
                .map(move |result| (index, result))
        })
        .buffer_unordered(concurrency.max(1));

    let drain = async {
        while let Some((index, result)) = pending.next().await {
            slots[index] = Some(match result {
                Ok(value) => ItemOutcome::Done(value),
                Err(payload) => ItemOutcome::Panicked(panic_message(payload)),
            });
        }
    };
    if tokio::time::timeout_at(hard_stop, drain).await.is_err() {
        warn!("Hard stop reached with items still in flight");
    }

    slots
        .into_iter()
        .map(|slot| slot.unwrap_or(ItemOutcome::TimedOut))
        .collect()
}

/// Message for a step whose every requested lookup failed transiently.
/// Timed-out lookups belong to their item and keep the step alive.
fn systemic_failure<'a>(lookups: impl IntoIterator<Item = &'a PriceLookup>) -> Option<String> {
    let requested: Vec<&PriceLookup> = lookups
        .into_iter()
        .filter(|l| !matches!(l, PriceLookup::NotRequested))
        .collect();
    let all_transient = !requested.is_empty()
        && requested.iter().all(|l| {
            !l.is_timeout() && l.failure_class().is_some_and(|c| c.is_transient())
        });
    if !all_transient {
        return None;
    }
    let last = requested.iter().rev().find_map(|l| match l {
        PriceLookup::Failed { message, .. } => Some(message.as_str()),
        _ => None,
    });
    Some(format!(
        "all {} market data lookups failed transiently (last: {})",
        requested.len(),
        last.unwrap_or("unknown")
    ))
}

// =============================================================================
// Run state
// =============================================================================

#[derive(Default)]
struct RunState {
    trace: Vec<TraceEntry>,
    errors: Vec<RunError>,
    skipped: Vec<Step>,
    failed: Vec<Step>,
    aborted: bool,
}

/// Per-item results of the latest failed attempt, kept so an exhausted
/// step can still report them.
struct LastAttempt<T>(Mutex<Option<T>>);

impl<T> LastAttempt<T> {
    fn new() -> Self {
        Self(Mutex::new(None))
    }

    fn keep(&self, value: T) {
        if let Ok(mut slot) = self.0.lock() {
            *slot = Some(value);
        }
    }

    fn take(self) -> Option<T> {
        self.0.into_inner().ok().flatten()
    }
}

impl RunState {
    fn skip_empty(&mut self, step: Step, what: &str) {
        info!("{} skipped: no {}", step, what);
        self.skipped.push(step);
    }
}

// =============================================================================
// Orchestrator
// =============================================================================

/// Drives scenario runs against a normalizer and a market data source.
pub struct DeskOrchestrator {
    config: DeskConfig,
    normalizer: Arc<dyn EquityNormalizer>,
    market: Arc<dyn MarketDataSource>,
    answerer: Option<Arc<dyn QuestionAnswerer>>,
    calendar: Arc<dyn SettlementCalendar>,
    run_date: Option<NaiveDate>,
}

impl DeskOrchestrator {
    pub fn new(
        config: DeskConfig,
        normalizer: Arc<dyn EquityNormalizer>,
        market: Arc<dyn MarketDataSource>,
    ) -> Self {
        Self {
            config,
            normalizer,
            market,
            answerer: None,
            calendar: Arc::new(WeekendCalendar),
            run_date: None,
        }
    }

    /// Replaces the snapshot answerer used for ANSWER_QUESTIONS.
    pub fn with_answerer(mut self, answerer: Arc<dyn QuestionAnswerer>) -> Self {
        self.answerer = Some(answerer);
        self
    }

    pub fn with_calendar(mut self, calendar: Arc<dyn SettlementCalendar>) -> Self {
        self.calendar = calendar;
        self
    }

    /// Pins "today" for mark staleness.
    pub fn with_run_date(mut self, run_date: NaiveDate) -> Self {
        self.run_date = Some(run_date);
        self
    }

    pub fn config(&self) -> &DeskConfig {
        &self.config
    }

    /// Loads a JSON or YAML scenario file and runs it.
    pub async fn run_path(&self, path: &Path) -> Result<Report> {
        let document = load_scenario_value(path)?;
        self.run_value(document).await
    }

    /// Schema-checks an untyped scenario document and runs it. A schema
    /// violation aborts before any other step.
    pub async fn run_value(&self, document: Value) -> Result<Report> {
        let started = Instant::now();
        let schema_started = std::time::Instant::now();
        let scenario = match Scenario::from_value(document) {
            Ok(scenario) => scenario,
            Err(e) => {
                error!("{} failed: {}", Step::LoadAndValidateSchema, e);
                return Err(e);
            }
        };
        Ok(self.execute(&scenario, started, schema_started).await)
    }

    /// Runs an already parsed scenario. Never fails: step failures end up
    /// in the report.
    pub async fn run(&self, scenario: &Scenario) -> Report {
        self.execute(scenario, Instant::now(), std::time::Instant::now())
            .await
    }

    fn policy(&self, hard_stop: Instant) -> RetryPolicy {
        RetryPolicy::from(&self.config.orchestrator).with_deadline(hard_stop)
    }

    async fn execute(
        &self,
        scenario: &Scenario,
        started: Instant,
        schema_started: std::time::Instant,
    ) -> Report {
        let started_at = Utc::now();
        let settings = &self.config.orchestrator;
        let budget = Duration::from_millis(settings.performance_budget_ms);
        let hard_stop = started + budget + Duration::from_millis(settings.grace_period_ms);
        let concurrency = settings.max_concurrency.max(1);
        let run_date = self.run_date.unwrap_or_else(|| Utc::now().date_naive());
        let as_of = context_date(scenario).unwrap_or(run_date);

        info!(
            "Running scenario '{}' ({} trades, {} marks, {} questions)",
            scenario.name,
            scenario.trades.len(),
            scenario.marks.len(),
            scenario.questions.len()
        );

        let mut state = RunState::default();
        trace::record(&mut state.trace, Step::LoadAndValidateSchema, schema_started, None);

        // One cache per run so a retried step fetches again after errors
        // but never repeats a definitive answer.
        let market: Arc<dyn MarketDataSource> = Arc::new(CachedMarketData::new(
            self.market.clone(),
            Duration::from_millis(settings.fetch_timeout_ms),
        ));

        let data_quality = self
            .normalize_identifiers(scenario, &mut state, hard_stop)
            .await
            .unwrap_or_default();
        let trade_issues = self
            .validate_trades(scenario, &market, &mut state, hard_stop, concurrency)
            .await;
        let pricing_flags = self
            .validate_marks(scenario, &market, run_date, &mut state, hard_stop, concurrency)
            .await;
        let question_answers = self
            .answer_questions(scenario, &market, as_of, &mut state, hard_stop, concurrency)
            .await;
        let market_context = self
            .gather_market_context(scenario, &market, as_of, &mut state, hard_stop, concurrency)
            .await
            .unwrap_or_default();

        let aggregate_started = std::time::Instant::now();
        let pricing_summary = PricingSummary::from_marks(&pricing_flags);
        let within_budget = started.elapsed() <= budget;
        if !within_budget {
            warn!(
                "Scenario '{}' exceeded its {} ms budget",
                scenario.name, settings.performance_budget_ms
            );
        }
        let summary = Summary::compute(SummaryInput {
            trades: &trade_issues,
            marks: &pricing_flags,
            answers: &question_answers,
            failed_steps: &state.failed,
            within_budget,
        });
        let narrative = narrative(&summary, &trade_issues, &pricing_flags, state.aborted);
        trace::record(&mut state.trace, Step::AggregateReport, aggregate_started, None);

        info!(
            "Scenario '{}' finished: {} ({} errors)",
            scenario.name,
            summary.overall_status,
            state.errors.len()
        );

        Report {
            scenario: ScenarioInfo {
                name: scenario.name.clone(),
                description: scenario.description.clone(),
                metadata: scenario.metadata.clone(),
            },
            data_quality,
            trade_issues,
            pricing_flags,
            pricing_summary,
            question_answers,
            market_context,
            narrative,
            summary,
            execution_metadata: ExecutionMetadata {
                started_at,
                finished_at: Utc::now(),
                duration_ms: started.elapsed().as_secs_f64() * 1000.0,
                trace: state.trace,
                errors: state.errors,
                skipped_steps: state.skipped,
                aborted: state.aborted,
                config: self.config.clone(),
            },
        }
    }

    /// Runs one step through the retry wrapper, honoring abort and the
    /// hard stop. `None` means the step produced nothing.
    async fn step<T, F, Fut>(
        &self,
        step: Step,
        state: &mut RunState,
        hard_stop: Instant,
        attempt_fn: F,
    ) -> Option<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if state.aborted {
            debug!("{} skipped: run aborted", step);
            state.skipped.push(step);
            return None;
        }
        if Instant::now() >= hard_stop {
            warn!("{} skipped: run deadline exceeded", step);
            state.skipped.push(step);
            state
                .errors
                .push(RunError::step(step, "skipped: run deadline exceeded"));
            return None;
        }

        match run_step(step, self.policy(hard_stop), &mut state.trace, attempt_fn).await {
            Ok(value) => Some(value),
            Err(e) => {
                state.failed.push(step);
                state.errors.push(RunError::step(step, e.to_string()));
                if self.config.orchestrator.abort_after_retry {
                    error!("{} exhausted its retries; aborting run", step);
                    state.aborted = true;
                } else {
                    warn!("{} exhausted its retries; continuing without it", step);
                }
                None
            }
        }
    }

    async fn normalize_identifiers(
        &self,
        scenario: &Scenario,
        state: &mut RunState,
        hard_stop: Instant,
    ) -> Option<DataQuality> {
        let step = Step::NormalizeIdentifiers;
        let tickers = scenario.referenced_tickers();
        if tickers.is_empty() && !state.aborted {
            state.skip_empty(step, "identifiers");
            return None;
        }
        let normalizer = self.normalizer.as_ref();
        let floor = self.config.oms.identifier_confidence_floor;
        let top_k = self.config.normalizer.top_k;
        let tickers = &tickers;

        self.step(step, state, hard_stop, |_| async move {
            let mut quality = DataQuality::default();
            for ticker in tickers {
                let results = normalizer.normalize(ticker, top_k);
                let Some(top) = results.first() else {
                    quality.normalization_issues.push(NormalizationIssue {
                        ticker: ticker.clone(),
                        issue: "unknown".to_string(),
                    });
                    continue;
                };
                if top.ambiguous || top.confidence < floor {
                    quality.normalization_issues.push(NormalizationIssue {
                        ticker: ticker.clone(),
                        issue: "ambiguous_or_low_confidence".to_string(),
                    });
                }
                quality.ticker_normalizations.push(TickerNormalization {
                    input: ticker.clone(),
                    normalized: top.symbol().to_string(),
                    confidence: top.confidence,
                    ambiguous: top.ambiguous,
                });
            }
            debug!(
                "Normalized {} tickers with {} issues",
                tickers.len(),
                quality.normalization_issues.len()
            );
            Ok(quality)
        })
        .await
    }

    async fn validate_trades(
        &self,
        scenario: &Scenario,
        market: &Arc<dyn MarketDataSource>,
        state: &mut RunState,
        hard_stop: Instant,
        concurrency: usize,
    ) -> Vec<TradeReport> {
        let step = Step::ValidateTrades;
        if scenario.trades.is_empty() && !state.aborted {
            state.skip_empty(step, "trades");
            return Vec::new();
        }
        let validator = TradeValidator::new(
            self.normalizer.clone(),
            market.clone(),
            self.config.oms.clone(),
        )
        .with_calendar(self.calendar.clone());
        let validator = &validator;
        let trades = scenario.trades.as_slice();
        let last_attempt = LastAttempt::new();
        let last = &last_attempt;

        let outcomes = self
            .step(step, state, hard_stop, |_| async move {
                let outcomes = run_items(trades, concurrency, hard_stop, |trade| {
                    validator.validate_detailed(trade)
                })
                .await;
                let lookups = outcomes.iter().filter_map(|o| match o {
                    ItemOutcome::Done(v) => Some(&v.market),
                    _ => None,
                });
                match systemic_failure(lookups) {
                    Some(message) => {
                        last.keep(outcomes);
                        Err(Error::step_failed(step.as_str(), message))
                    }
                    None => Ok(outcomes),
                }
            })
            .await;
        let Some(outcomes) = outcomes.or_else(|| last_attempt.take()) else {
            return Vec::new();
        };

        trades
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (trade, outcome))| {
                let result = match outcome {
                    ItemOutcome::Done(validation) => validation.result,
                    ItemOutcome::Panicked(message) => {
                        state
                            .errors
                            .push(RunError::item(step, trade_label(trade, index), &message));
                        ValidationResult::from_issues(vec![Issue::error(
                            IssueType::ValidationError,
                            format!("Validation panicked: {}", message),
                        )])
                    }
                    ItemOutcome::TimedOut => {
                        state
                            .errors
                            .push(RunError::item(step, trade_label(trade, index), DEADLINE_MESSAGE));
                        ValidationResult::from_issues(vec![Issue::error(
                            IssueType::ValidationError,
                            format!("Validation {}", DEADLINE_MESSAGE),
                        )])
                    }
                };
                TradeReport {
                    result,
                    trade: trade.clone(),
                }
            })
            .collect()
    }

    async fn validate_marks(
        &self,
        scenario: &Scenario,
        market: &Arc<dyn MarketDataSource>,
        run_date: NaiveDate,
        state: &mut RunState,
        hard_stop: Instant,
        concurrency: usize,
    ) -> Vec<EnrichedMark> {
        let step = Step::ValidateMarks;
        if scenario.marks.is_empty() && !state.aborted {
            state.skip_empty(step, "marks");
            return Vec::new();
        }
        let validator = MarkValidator::new(market.clone(), self.config.pricing.clone())
            .with_run_date(run_date);
        let validator = &validator;
        let marks = scenario.marks.as_slice();
        let last_attempt = LastAttempt::new();
        let last = &last_attempt;

        let outcomes = self
            .step(step, state, hard_stop, |_| async move {
                let outcomes = run_items(marks, concurrency, hard_stop, |mark| {
                    validator.validate_detailed(mark)
                })
                .await;
                let lookups = outcomes.iter().filter_map(|o| match o {
                    ItemOutcome::Done(v) => Some(&v.lookup),
                    _ => None,
                });
                match systemic_failure(lookups) {
                    Some(message) => {
                        last.keep(outcomes);
                        Err(Error::step_failed(step.as_str(), message))
                    }
                    None => Ok(outcomes),
                }
            })
            .await;
        let Some(outcomes) = outcomes.or_else(|| last_attempt.take()) else {
            return Vec::new();
        };

        marks
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (mark, outcome))| match outcome {
                ItemOutcome::Done(validation) => validation.mark,
                ItemOutcome::Panicked(message) => {
                    state
                        .errors
                        .push(RunError::item(step, mark_label(mark, index), &message));
                    EnrichedMark::no_market_data(mark.clone(), "validation panicked", Some(message))
                }
                ItemOutcome::TimedOut => {
                    state
                        .errors
                        .push(RunError::item(step, mark_label(mark, index), DEADLINE_MESSAGE));
                    EnrichedMark::no_market_data(
                        mark.clone(),
                        DEADLINE_MESSAGE,
                        Some("run deadline exceeded".to_string()),
                    )
                }
            })
            .collect()
    }

    async fn answer_questions(
        &self,
        scenario: &Scenario,
        market: &Arc<dyn MarketDataSource>,
        as_of: NaiveDate,
        state: &mut RunState,
        hard_stop: Instant,
        concurrency: usize,
    ) -> Vec<Answer> {
        let step = Step::AnswerQuestions;
        if scenario.questions.is_empty() && !state.aborted {
            state.skip_empty(step, "questions");
            return Vec::new();
        }
        let answerer: Arc<dyn QuestionAnswerer> = match &self.answerer {
            Some(answerer) => answerer.clone(),
            None => Arc::new(SnapshotAnswerer::new(market.clone()).with_as_of(as_of)),
        };
        let answerer = answerer.as_ref();
        let questions = scenario.questions.as_slice();

        let outcomes = self
            .step(step, state, hard_stop, |_| async move {
                Ok(run_items(questions, concurrency, hard_stop, |question| {
                    answerer.answer(question)
                })
                .await)
            })
            .await;
        let Some(outcomes) = outcomes else {
            return Vec::new();
        };

        questions
            .iter()
            .zip(outcomes)
            .enumerate()
            .map(|(index, (question, outcome))| match outcome {
                ItemOutcome::Done(answer) => answer,
                ItemOutcome::Panicked(message) => {
                    state
                        .errors
                        .push(RunError::item(step, format!("questions[{}]", index), &message));
                    unanswered(question, &format!("Answering panicked: {}.", message))
                }
                ItemOutcome::TimedOut => {
                    state.errors.push(RunError::item(
                        step,
                        format!("questions[{}]", index),
                        DEADLINE_MESSAGE,
                    ));
                    unanswered(question, &format!("Answer {}.", DEADLINE_MESSAGE))
                }
            })
            .collect()
    }

    async fn gather_market_context(
        &self,
        scenario: &Scenario,
        market: &Arc<dyn MarketDataSource>,
        as_of: NaiveDate,
        state: &mut RunState,
        hard_stop: Instant,
        concurrency: usize,
    ) -> Option<MarketContext> {
        let step = Step::GatherMarketContext;
        let tickers = key_tickers(scenario);
        if tickers.is_empty() && !state.aborted {
            state.skip_empty(step, "tickers");
            return None;
        }
        let market = market.as_ref();
        let tickers = &tickers;
        let last_attempt = LastAttempt::new();
        let last = &last_attempt;

        let context = self
            .step(step, state, hard_stop, |_| async move {
                let outcomes = fetch_snapshots(market, tickers, as_of, concurrency).await;
                let all_transient = outcomes.iter().all(|(_, outcome)| {
                    matches!(outcome, Err(e) if !e.is_timeout() && e.retry_class().is_transient())
                });
                let context = build_context(tickers.clone(), outcomes);
                if all_transient {
                    last.keep(context);
                    return Err(Error::step_failed(
                        step.as_str(),
                        format!("all {} snapshot lookups failed transiently", tickers.len()),
                    ));
                }
                Ok(context)
            })
            .await;
        context.or_else(|| last_attempt.take())
    }
}

fn trade_label(trade: &Trade, index: usize) -> String {
    trade
        .trade_id
        .clone()
        .unwrap_or_else(|| format!("trades[{}]", index))
}

fn mark_label(mark: &Mark, index: usize) -> String {
    format!("marks[{}] {}", index, mark.symbol())
}

fn unanswered(question: &Question, detail: &str) -> Answer {
    let intent = question
        .intent
        .unwrap_or_else(|| Intent::classify(&question.question));
    Answer::failed(
        question,
        question.ticker.clone(),
        intent,
        AnswerError::DataUnavailable,
        detail,
    )
}
