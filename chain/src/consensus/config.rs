/// Turn-rotation timing parameters.
///
/// These are protocol constants: every node in the membership must run
/// with identical values, since turn boundaries are aligned only by the
/// shared wall clock and the shared initial leader index.
#[derive(Clone, Debug)]
pub struct TurnConfig {
    /// Length of a leader's turn, in milliseconds.
    pub turn_duration_ms: u64,
    /// Quiescent interval between turns, in milliseconds.
    pub transition_duration_ms: u64,
    /// Pool retention window; entries older than this are evicted.
    pub message_retention_ms: u64,
    /// Period of the pool cleanup tick.
    pub cleanup_interval_ms: u64,
}

impl Default for TurnConfig {
    fn default() -> Self {
        Self {
            turn_duration_ms: 30_000,
            transition_duration_ms: 5_000,
            message_retention_ms: 120_000,
            cleanup_interval_ms: 60_000,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_protocol_constants() {
        let cfg = TurnConfig::default();

        assert_eq!(cfg.turn_duration_ms, 30_000);
        assert_eq!(cfg.transition_duration_ms, 5_000);
        assert_eq!(cfg.message_retention_ms, 120_000);
        assert_eq!(cfg.cleanup_interval_ms, 60_000);
    }
}
