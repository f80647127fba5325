/// Reference currency assumed when a ticker cannot be resolved
pub const DEFAULT_CURRENCY: &str = "USD";

/// Counterparties accepted without a warning
pub const DEFAULT_COUNTERPARTIES: &[&str] = &["MS", "GS", "JPM", "BAML", "BARC", "CITI"];

/// Standard settlement cycle in business days (T+2)
pub const DEFAULT_SETTLEMENT_DAYS: u32 = 2;

/// Relative price deviation above which a trade gets a warning
pub const DEFAULT_PRICE_WARNING_THRESHOLD: f64 = 0.02;

/// Relative price deviation above which a trade gets an error
pub const DEFAULT_PRICE_ERROR_THRESHOLD: f64 = 0.05;

/// Top candidate confidence below which an identifier gets a warning
pub const DEFAULT_IDENTIFIER_CONFIDENCE_FLOOR: f64 = 0.9;

/// Mark deviation at or below which a mark is OK
pub const DEFAULT_MARK_OK_THRESHOLD: f64 = 0.02;

/// Mark deviation above which a mark is OUT_OF_TOLERANCE
pub const DEFAULT_MARK_REVIEW_THRESHOLD: f64 = 0.05;

/// Mark age in days beyond which it is STALE_MARK
pub const DEFAULT_STALE_DAYS: i64 = 5;

/// Normalizer candidates below this confidence are dropped
pub const DEFAULT_REJECT_THRESHOLD: f64 = 0.4;

/// Lower bound of the ambiguity band
pub const DEFAULT_AMBIGUOUS_LOW: f64 = 0.6;

/// Upper bound of the ambiguity band
pub const DEFAULT_AMBIGUOUS_HIGH: f64 = 0.85;

/// Candidates returned per normalization
pub const DEFAULT_TOP_K: usize = 5;

/// Attempts per orchestrated step
pub const DEFAULT_MAX_RETRIES: u32 = 2;

/// Linear backoff unit between step attempts
pub const DEFAULT_BACKOFF_MS: u64 = 500;

/// Overall run budget
pub const DEFAULT_PERFORMANCE_BUDGET_MS: u64 = 30_000;

/// Time in-flight work may keep running after the budget is spent
pub const DEFAULT_GRACE_PERIOD_MS: u64 = 2_000;

/// Per-call market data timeout
pub const DEFAULT_FETCH_TIMEOUT_MS: u64 = 5_000;

/// Items processed concurrently within a step
pub const DEFAULT_MAX_CONCURRENCY: usize = 8;

/// Default location of the reference master table
pub const DEFAULT_REFMASTER_PATH: &str = "data/refmaster.json";

/// Default directory holding scenario files
pub const DEFAULT_SCENARIOS_PATH: &str = "scenarios";
