//! Market data models
//!
//! - `lookup` - Outcome of a single price lookup
//! - `snapshot` - Price and equity snapshots returned by sources
//! - `types` - Type aliases for common identifiers

mod lookup;
mod snapshot;
mod types;

pub use lookup::PriceLookup;
pub use snapshot::{EquitySnapshot, PriceKey, PriceSnapshot};
pub(crate) use snapshot::normalize_ticker;
pub use types::{ProviderId, Ticker};
