//! Snapshot-backed question answering.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use deskagent_market_data::{EquitySnapshot, MarketDataSource};
use log::{debug, warn};
use serde_json::json;

use super::intent::{extract_ticker, Intent};
use super::model::{Answer, AnswerError, Question};

/// Answers a question about a ticker. Never fails: problems are reported
/// through [`Answer::error`].
#[async_trait]
pub trait QuestionAnswerer: Send + Sync {
    async fn answer(&self, question: &Question) -> Answer;
}

/// Classifies by keyword, fetches an [`EquitySnapshot`] and templates a
/// summary from it.
pub struct SnapshotAnswerer {
    market: Arc<dyn MarketDataSource>,
    as_of: Option<NaiveDate>,
}

impl SnapshotAnswerer {
    pub fn new(market: Arc<dyn MarketDataSource>) -> Self {
        Self { market, as_of: None }
    }

    /// Pins the snapshot date used when a question has none.
    pub fn with_as_of(mut self, as_of: NaiveDate) -> Self {
        self.as_of = Some(as_of);
        self
    }
}

#[async_trait]
impl QuestionAnswerer for SnapshotAnswerer {
    async fn answer(&self, question: &Question) -> Answer {
        let intent = question
            .intent
            .unwrap_or_else(|| Intent::classify(&question.question));
        let ticker = question
            .ticker
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_uppercase)
            .or_else(|| extract_ticker(&question.question));
        let Some(ticker) = ticker else {
            return Answer::failed(
                question,
                None,
                intent,
                AnswerError::InvalidTicker,
                "Provide a ticker in the question.",
            );
        };

        let as_of = question
            .as_of
            .or(self.as_of)
            .unwrap_or_else(|| Utc::now().date_naive());
        let snapshot = match self.market.get_snapshot(&ticker, as_of).await {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => {
                return Answer::failed(
                    question,
                    Some(ticker.clone()),
                    intent,
                    AnswerError::DataUnavailable,
                    &format!("No market data for {} as of {}.", ticker, as_of),
                )
            }
            Err(e) => {
                warn!("Snapshot for {} failed: {}", ticker, e);
                return Answer::failed(
                    question,
                    Some(ticker),
                    intent,
                    AnswerError::DataUnavailable,
                    &e.to_string(),
                );
            }
        };

        debug!("Answered {} question for {}", intent.as_str(), ticker);
        Answer {
            question: question.question.clone(),
            ticker: Some(ticker),
            intent,
            summary: summarize(intent, &snapshot),
            data: metrics(intent, &snapshot),
            source: Some(snapshot.source.clone()),
            error: None,
        }
    }
}

fn metrics(intent: Intent, snap: &EquitySnapshot) -> serde_json::Value {
    let mut data = json!({
        "ticker": snap.ticker,
        "as_of": snap.date,
        "price": snap.price,
    });
    let extra = match intent {
        Intent::PricePerformanceSummary => {
            json!({"return_1d": snap.return_1d, "return_5d": snap.return_5d})
        }
        Intent::FinancialsRevenueSummary => json!({
            "market_cap": snap.market_cap,
            "sector": snap.sector,
            "industry": snap.industry,
        }),
        // No dividend feed yet; the keys are kept so consumers see a stable shape.
        Intent::DividendOverview => json!({"dividend_yield": null, "next_ex_date": null}),
        Intent::VolatilityComparisonConvertible => json!({"return_5d": snap.return_5d}),
        Intent::GenericUnhandled => json!({}),
    };
    if let (Some(base), Some(extra)) = (data.as_object_mut(), extra.as_object()) {
        base.extend(extra.clone());
    }
    data
}

fn summarize(intent: Intent, snap: &EquitySnapshot) -> String {
    match intent {
        Intent::PricePerformanceSummary => format!(
            "{} trades at ${:.2}. 1D: {:.2}x, 5D: {:.2}x.",
            snap.ticker, snap.price, snap.return_1d, snap.return_5d
        ),
        Intent::FinancialsRevenueSummary => format!(
            "{} price ${:.2}, sector {}, market cap ${}.",
            snap.ticker,
            snap.price,
            snap.sector,
            group_thousands(snap.market_cap)
        ),
        Intent::DividendOverview => format!(
            "{} dividend details unavailable from current data source.",
            snap.ticker
        ),
        Intent::VolatilityComparisonConvertible => format!(
            "{} recent 5D return multiplier {:.2}; use as proxy until convertible vol data is available.",
            snap.ticker, snap.return_5d
        ),
        Intent::GenericUnhandled => format!("{} snapshot at ${:.2}.", snap.ticker, snap.price),
    }
}

/// `3000000000.4` -> `"3,000,000,000"`.
fn group_thousands(value: f64) -> String {
    let digits = format!("{:.0}", value.abs());
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if value < 0.0 {
        grouped.insert(0, '-');
    }
    grouped
}
