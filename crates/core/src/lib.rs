//! Desk Agent Core - trade and mark validation for end-of-day desk
//! operations.
//!
//! This crate holds the validation rules and the pipeline that runs them.
//! Market data comes in through the `MarketDataSource` trait from the
//! `deskagent-market-data` crate; identifiers resolve through
//! [`refmaster::EquityNormalizer`].
//!
//! ```text
//! Scenario ──> DeskOrchestrator ──> { Normalizer, TradeValidator, MarkValidator,
//!                                     QuestionAnswerer } ──> Report
//! ```

pub mod config;
pub mod constants;
pub mod errors;
pub mod issues;
pub mod oms;
pub mod orchestrator;
pub mod pricing;
pub mod questions;
pub mod refmaster;

pub use config::DeskConfig;
pub use issues::{Issue, IssueType, Severity, ValidationResult};
pub use orchestrator::{DeskOrchestrator, Report, Scenario};

// Re-export error types
pub use errors::Error;
pub use errors::Result;
