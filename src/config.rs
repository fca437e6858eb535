//! Deployment-fixed consensus parameters.
//!
//! These four knobs plus the hard-fork height are protocol parameters the
//! network operator pins before launch; every node on a network must run the
//! same values. The per-network presets mirror the mainnet/testnet split of
//! the rest of the stack.

use crate::constants::COIN;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConsensusParams {
    /// Height of the masternode hard fork. Blocks at or below it carry no
    /// elections and no payee.
    pub fork_height: u64,

    /// Number of prior blocks tallied when applying elections; an outpoint
    /// needs a strict majority of them to pass.
    pub election_period: u64,

    /// Upper bound on |add votes| + |remove votes| embedded per block.
    /// Deployments should pin this to at least 2 so the budget can be split
    /// between adds and removes; smaller values serve adds first.
    pub max_votes: usize,

    /// Upper bound on the preferred candidate set when casting votes.
    pub max_masternodes: usize,

    /// Minimum staking-output value, in base units, for admission.
    pub min_stake: u64,
}

impl ConsensusParams {
    pub fn mainnet() -> Self {
        Self {
            fork_height: 120_000,
            election_period: 100,
            max_votes: 30,
            max_masternodes: 1_500,
            min_stake: 1_000 * COIN,
        }
    }

    /// Compressed parameters so testnets elect and pay within minutes.
    pub fn testnet() -> Self {
        Self {
            fork_height: 50,
            election_period: 10,
            max_votes: 10,
            max_masternodes: 100,
            min_stake: 10 * COIN,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_and_are_sane() {
        let main = ConsensusParams::mainnet();
        let test = ConsensusParams::testnet();
        assert!(main.fork_height > test.fork_height);
        assert!(main.max_votes >= 2);
        assert!(test.max_votes >= 2);
        assert!(main.min_stake > 0);
    }
}
