//! Desk Agent Market Data Crate
//!
//! This crate supplies reference prices and equity snapshots to the desk
//! agent validators. It is the only part of the system that talks to the
//! network.
//!
//! # Architecture
//!
//! ```text
//! +---------------------+
//! |  Validators / Q&A   |   (deskagent-core)
//! +---------------------+
//!            |
//!            v
//! +---------------------+
//! |  CachedMarketData   |   (single flight per (ticker, date), per-call timeout)
//! +---------------------+
//!            |
//!            v
//! +---------------------+
//! |  MarketDataSource   |   (FinancialDatasets REST, StaticMarketData)
//! +---------------------+
//!            |
//!            v
//! +---------------------+
//! | PriceSnapshot /     |
//! | EquitySnapshot      |
//! +---------------------+
//! ```
//!
//! # Core Types
//!
//! - [`MarketDataSource`] - Async source trait; `Ok(None)` means not found
//! - [`PriceSnapshot`] - Reference price for a ticker on a date
//! - [`EquitySnapshot`] - Price, 1D/5D returns and company facts
//! - [`MarketDataError`] - Systemic failures, classified by [`RetryClass`]

pub mod cache;
pub mod errors;
pub mod models;
pub mod provider;

pub use cache::CachedMarketData;
pub use errors::{MarketDataError, RetryClass};
pub use models::{EquitySnapshot, PriceKey, PriceLookup, PriceSnapshot, ProviderId, Ticker};
pub use provider::static_source::InjectedFailure;
pub use provider::{FinancialDatasetsProvider, MarketDataSource, StaticMarketData};
