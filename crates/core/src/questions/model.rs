//! Question and answer models.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::intent::Intent;

/// A question about a ticker.
///
/// Scenarios may list questions as bare strings or as objects with an
/// explicit ticker and intent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawQuestion")]
pub struct Question {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub as_of: Option<NaiveDate>,
}

impl Question {
    pub fn new(question: &str) -> Self {
        Self {
            question: question.to_string(),
            ticker: None,
            intent: None,
            as_of: None,
        }
    }

    pub fn with_ticker(mut self, ticker: &str) -> Self {
        self.ticker = Some(ticker.to_string());
        self
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQuestion {
    Text(String),
    Detailed {
        question: String,
        #[serde(default)]
        ticker: Option<String>,
        #[serde(default)]
        intent: Option<Intent>,
        #[serde(default)]
        as_of: Option<NaiveDate>,
    },
}

impl From<RawQuestion> for Question {
    fn from(raw: RawQuestion) -> Self {
        match raw {
            RawQuestion::Text(question) => Question::new(&question),
            RawQuestion::Detailed {
                question,
                ticker,
                intent,
                as_of,
            } => Question {
                question,
                ticker,
                intent,
                as_of,
            },
        }
    }
}

/// Why a question could not be answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerError {
    InvalidTicker,
    DataUnavailable,
}

impl AnswerError {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerError::InvalidTicker => "invalid_ticker",
            AnswerError::DataUnavailable => "data_unavailable",
        }
    }
}

/// Templated answer with the data it was built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub question: String,
    pub ticker: Option<String>,
    pub intent: Intent,
    pub summary: String,
    pub data: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<AnswerError>,
}

impl Answer {
    pub fn failed(question: &Question, ticker: Option<String>, intent: Intent, error: AnswerError, detail: &str) -> Self {
        Self {
            question: question.question.clone(),
            ticker,
            intent,
            summary: format!("Unable to answer: {}. {}", error.as_str(), detail)
                .trim()
                .to_string(),
            data: Value::Object(Default::default()),
            source: None,
            error: Some(error),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.error.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_questions_accept_strings_and_objects() {
        let questions: Vec<Question> = serde_json::from_str(
            r#"["How did AAPL perform this month?",
                {"question": "Sector for this one?", "ticker": "MSFT", "intent": "financials_revenue_summary"}]"#,
        )
        .unwrap();
        assert_eq!(questions[0].ticker, None);
        assert_eq!(questions[1].ticker.as_deref(), Some("MSFT"));
        assert_eq!(questions[1].intent, Some(Intent::FinancialsRevenueSummary));
    }

    #[test]
    fn test_failed_answer_summary() {
        let answer = Answer::failed(
            &Question::new("what?"),
            None,
            Intent::GenericUnhandled,
            AnswerError::InvalidTicker,
            "Provide a ticker in the question.",
        );
        assert_eq!(
            answer.summary,
            "Unable to answer: invalid_ticker. Provide a ticker in the question."
        );
        assert_eq!(serde_json::to_value(&answer).unwrap()["error"], "invalid_ticker");
    }
}
