//! Scenario orchestration: schema checks, the step pipeline, retries,
//! tracing and report assembly.
//!
//! - **Scenario** (`scenario.rs`) - Scenario model and JSON/YAML loading
//! - **Schema** (`schema.rs`) - Structural checks on untyped documents
//! - **Trace** (`trace.rs`) - Steps, trace entries and the retry wrapper
//! - **Service** (`service.rs`) - `DeskOrchestrator`, the pipeline driver
//! - **Report** (`report.rs`) - Report sections, summary and narrative
//! - **Market context** (`market_context.rs`) - Snapshot backdrop

pub mod market_context;
pub mod report;
pub mod scenario;
pub mod schema;
pub mod service;
pub mod trace;

pub use report::{
    percentage, DataQuality, ExecutionMetadata, MarketContext, MarketMovements, NormalizationIssue,
    Report, RunError, ScenarioInfo, Summary, TickerNormalization, TradeReport,
};
pub use scenario::{
    load_scenario, load_scenario_value, resolve_scenario_path, validate_scenario_files, Scenario,
    ScenarioFileCheck,
};
pub use schema::{collect_violations, validate_scenario_value};
pub use service::DeskOrchestrator;
pub use trace::{run_step, RetryPolicy, Step, StepStatus, TraceEntry};
