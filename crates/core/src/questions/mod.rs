//! Deterministic answers to ticker questions found in scenarios.

pub mod answerer;
pub mod intent;
pub mod model;

pub use answerer::{QuestionAnswerer, SnapshotAnswerer};
pub use intent::{extract_ticker, Intent};
pub use model::{Answer, AnswerError, Question};
