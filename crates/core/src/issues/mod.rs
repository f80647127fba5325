//! Issue model shared by every validator.
//!
//! A validator emits [`Issue`]s; [`ValidationResult::from_issues`] folds
//! them into a status with the same rule everywhere:
//!
//! ```text
//! ERROR    if any issue is ERROR
//! WARNING  else if any issue is WARNING
//! OK       otherwise
//! ```

pub mod model;

pub use model::{Issue, IssueType, Severity, ValidationResult};
