//! Network-fixed protocol constants.
//!
//! Everything here is consensus- or fork-sensitive and must match across the
//! network. Deployment-tunable parameters (election period, vote cap,
//! masternode cap, minimum stake) live in [`crate::config::ConsensusParams`]
//! instead.

/// Base units per coin.
pub const COIN: u64 = 100_000_000;

/// Liveness challenge schedule and scoring.
pub mod liveness {
    /// The challenge schedule reseeds every RESTART blocks.
    pub const RESTART_BLOCKS: u64 = 20;

    /// One challenge falls in every PERIOD-block slot of a window.
    /// Invariant: RESTART_BLOCKS is a multiple of PERIOD_BLOCKS.
    pub const PERIOD_BLOCKS: u64 = 5;

    /// Depth of the liveness history considered by scoring and log cleanup.
    pub const MONITORING_BLOCKS: u64 = 100;

    /// Blocks of post-sync observation required before votes are cast.
    pub const MONITORING_MIN_BLOCKS: u64 = 30;

    /// Penalty in seconds for an unanswered challenge.
    pub const PENALTY_TIME_SECS: f64 = 500.0;

    /// Candidates scoring above this are never voted in.
    pub const MAX_SCORE: f64 = 100.0;

    /// Sentinel score for candidates with the sticky misbehaving flag.
    pub const MISBEHAVING_SCORE: f64 = 99.0 * MAX_SCORE;

    /// Existence messages retained per candidate before the spam bound trips.
    pub const MAX_LOG_ENTRIES: usize = (MONITORING_BLOCKS / PERIOD_BLOCKS * 10) as usize;

    /// Cached scores are reused while the tip has advanced at most this far.
    pub const SCORE_CACHE_BLOCKS: u64 = 5;
}

/// Gossip admission depths and peer penalties.
pub mod gossip {
    /// Messages referencing blocks deeper than this should never have been
    /// relayed; forwarding one is a protocol violation.
    pub const ANCIENT_DEPTH: u64 = 100;

    /// Messages deeper than this (but not ancient) are dropped silently.
    pub const STALE_DEPTH: u64 = 50;

    /// Penalty for spam, ancient messages and unknown candidates.
    pub const PENALTY_MINOR: i32 = 20;

    /// Penalty for a forged signature.
    pub const PENALTY_FORGERY: i32 = 100;

    /// Registry pruning cadence, in blocks, on the block-receipt tick.
    pub const PRUNE_INTERVAL_BLOCKS: u64 = 10;
}

/// Masternode payment thresholds.
pub mod payments {
    /// Confirmations a staking output needs before admission.
    pub const MIN_CONFIRMATIONS: u64 = 10;

    /// Elected-set size required to start paying masternodes.
    pub const START_PAYMENTS: usize = 150;

    /// Payments continue while the elected set stays at or above this.
    pub const STOP_PAYMENTS: usize = 100;
}

#[cfg(test)]
mod tests {
    use super::liveness::*;

    #[test]
    fn restart_is_a_multiple_of_period() {
        assert_eq!(RESTART_BLOCKS % PERIOD_BLOCKS, 0);
    }

    #[test]
    fn spam_bound_matches_monitoring_window() {
        assert_eq!(MAX_LOG_ENTRIES, 200);
    }
}
