/// Classification for retry policy.
///
/// Callers use this to decide whether a failed lookup is worth repeating.
/// The orchestrator treats a batch where every fetch ended in
/// [`RetryClass::WithBackoff`] as a systemic failure of its step.
///
/// | Class | Retry? | Meaning |
/// |-------|--------|---------|
/// | `Never` | No | The request is invalid or the provider rejected it permanently |
/// | `WithBackoff` | Yes | Rate limit, timeout or transport failure |
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum RetryClass {
    /// Never retry - bad symbol, bad credentials or malformed payload.
    Never,

    /// Transient failure. Retrying after a delay may succeed.
    WithBackoff,
}

impl RetryClass {
    /// Returns true when a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, RetryClass::WithBackoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes() {
        assert!(RetryClass::WithBackoff.is_transient());
        assert!(!RetryClass::Never.is_transient());
    }
}
