//! Reference master: the equity reference table and the identifier
//! normalizer built on it.
//!
//! # Architecture
//!
//! ```text
//! CSV / JSON file ──> loader ──> ReferenceTable { equities, rejected }
//!                                     │
//!                                     v
//! free-form text ──> extract ──> Signals ──> Normalizer ──> NormalizationResult[]
//! ```
//!
//! - **Models** (`model.rs`) - EquityReference, NormalizationResult, MatchReason
//! - **Loader** (`loader.rs`) - Row-tolerant table loading
//! - **Extract** (`extract.rs`) - ISIN / CUSIP / CIK / ticker / venue signals
//! - **Normalizer** (`normalizer.rs`) - Scoring, ranking and ambiguity
//! - **Traits** (`traits.rs`) - `EquityNormalizer`, the seam used by validators

pub mod extract;
pub mod loader;
pub mod model;
pub mod normalizer;
pub mod traits;

pub use loader::{load_reference_table, parse_csv, parse_json};
pub use model::{EquityReference, MatchReason, NormalizationResult, ReferenceTable, RowError};
pub use normalizer::Normalizer;
pub use traits::EquityNormalizer;
