use crate::errors::{MarketDataError, RetryClass};

use super::snapshot::PriceSnapshot;

/// Outcome of a price lookup, with failures flattened to something that
/// can be cloned into results and inspected for retry decisions.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum PriceLookup {
    /// Inputs for a lookup were missing, so none was made.
    #[default]
    NotRequested,
    Found(PriceSnapshot),
    NotFound,
    Failed {
        message: String,
        retry_class: RetryClass,
        /// The per-call timeout expired before the source answered.
        timed_out: bool,
    },
}

impl PriceLookup {
    pub fn price(&self) -> Option<&PriceSnapshot> {
        match self {
            PriceLookup::Found(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    /// Retry class when the lookup failed.
    pub fn failure_class(&self) -> Option<RetryClass> {
        match self {
            PriceLookup::Failed { retry_class, .. } => Some(*retry_class),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, PriceLookup::Failed { timed_out: true, .. })
    }
}

impl From<Result<Option<PriceSnapshot>, MarketDataError>> for PriceLookup {
    fn from(result: Result<Option<PriceSnapshot>, MarketDataError>) -> Self {
        match result {
            Ok(Some(snapshot)) => PriceLookup::Found(snapshot),
            Ok(None) => PriceLookup::NotFound,
            Err(e) => PriceLookup::Failed {
                message: e.to_string(),
                retry_class: e.retry_class(),
                timed_out: e.is_timeout(),
            },
        }
    }
}
