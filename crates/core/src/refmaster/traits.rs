//! Reference master traits.

use super::model::{EquityReference, NormalizationResult};

/// Maps a free-form identifier to ranked reference candidates.
///
/// Implementations are pure over an immutable table: the same input
/// always yields the same ranked list and ambiguity flags, and nothing
/// is ever raised. No match above the reject threshold means an empty
/// list.
pub trait EquityNormalizer: Send + Sync {
    /// Ranked candidates for `text`, at most `top_k`.
    fn normalize(&self, text: &str, top_k: usize) -> Vec<NormalizationResult>;

    /// Exact lookup by canonical symbol.
    fn find_by_symbol(&self, symbol: &str) -> Option<&EquityReference>;

    /// `top_k` used when the caller has no preference.
    fn default_top_k(&self) -> usize {
        crate::constants::DEFAULT_TOP_K
    }
}
