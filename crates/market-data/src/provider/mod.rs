//! Market data source abstractions and implementations.
//!
//! This module contains:
//! - The `MarketDataSource` trait that every source implements
//! - `FinancialDatasetsProvider`, the REST-backed production source
//! - `StaticMarketData`, a deterministic in-memory source
//!
//! Callers depend only on the trait. Caching and per-call timeouts live in
//! [`crate::cache::CachedMarketData`], which wraps any source.

mod traits;

pub mod financial_datasets;
pub mod static_source;

pub use financial_datasets::FinancialDatasetsProvider;
pub use static_source::StaticMarketData;
pub use traits::MarketDataSource;
