//! Per-candidate state: liveness log and scoring.

use crate::block_annex::AnnexTable;
use crate::chain::ChainBackend;
use crate::constants::liveness::{
    MAX_LOG_ENTRIES, MISBEHAVING_SCORE, MONITORING_BLOCKS, PENALTY_TIME_SECS, SCORE_CACHE_BLOCKS,
};
use crate::constants::COIN;
use crate::existence::{ExistenceMsg, LogVerdict, ReceivedExistenceMsg};
use crate::schedule::challenge_blocks;
use crate::types::{KeyId, OutPoint};
use ed25519_dalek::{SigningKey, VerifyingKey};
use tracing::warn;

/// One registered masternode candidate.
///
/// Owned by the registry; exists only while its staking outpoint passes the
/// acceptability predicate. All liveness evidence and the memoised score
/// live here.
pub struct Masternode {
    pub outpoint: OutPoint,
    pub key_id: KeyId,
    pub pubkey: VerifyingKey,
    /// Stake value in base units.
    pub amount: u64,

    /// True when this node operates the candidate.
    pub is_local: bool,
    /// Present iff local and started.
    pub(crate) signing_key: Option<SigningKey>,

    /// Admitted existence messages, insertion-ordered.
    existence_log: Vec<ReceivedExistenceMsg>,

    /// Sticky: once a candidate floods the log it scores the sentinel until
    /// pruned out of the registry.
    pub misbehaving: bool,

    cached_score: f64,
    score_height: Option<u64>,
}

impl Masternode {
    pub fn new(outpoint: OutPoint, pubkey: VerifyingKey, amount: u64) -> Self {
        Self {
            outpoint,
            key_id: KeyId::of(&pubkey),
            pubkey,
            amount,
            is_local: false,
            signing_key: None,
            existence_log: Vec::new(),
            misbehaving: false,
            cached_score: 0.0,
            score_height: None,
        }
    }

    pub fn log_len(&self) -> usize {
        self.existence_log.len()
    }

    /// Feed a signature-checked existence message into the liveness log.
    ///
    /// Dedup by identity hash, then expire entries older than the monitoring
    /// window, then enforce the spam bound, then admit with the current
    /// monotone time.
    pub fn record_existence(&mut self, msg: ExistenceMsg, tip: u64, now_ms: u64) -> LogVerdict {
        let identity = msg.identity_hash();
        if self
            .existence_log
            .iter()
            .any(|rx| rx.msg.identity_hash() == identity)
        {
            return LogVerdict::Duplicate;
        }

        self.cleanup(tip);

        if self.existence_log.len() >= MAX_LOG_ENTRIES {
            if !self.misbehaving {
                warn!(
                    outpoint = %self.outpoint,
                    entries = self.existence_log.len(),
                    "masternode flagged misbehaving: existence-message flood"
                );
            }
            self.misbehaving = true;
            return LogVerdict::Spam;
        }

        self.existence_log.push(ReceivedExistenceMsg {
            msg,
            recv_time_ms: now_ms,
        });
        LogVerdict::Admitted
    }

    /// Drop log entries that fell out of the monitoring window.
    fn cleanup(&mut self, tip: u64) {
        self.existence_log
            .retain(|rx| u64::from(rx.msg.block_height) + 2 * MONITORING_BLOCKS >= tip);
    }

    /// Liveness score; lower is better, `MISBEHAVING_SCORE` is the sentinel.
    ///
    /// Memoised: recomputed only once the tip has advanced more than
    /// `SCORE_CACHE_BLOCKS` past the last refresh, so consumers may observe
    /// slightly stale values. Scoring is local-only and never consensus.
    pub fn refreshed_score(
        &mut self,
        tip: u64,
        initial_height: Option<u64>,
        chain: &dyn ChainBackend,
        annex: &AnnexTable,
    ) -> f64 {
        if self.misbehaving {
            return MISBEHAVING_SCORE;
        }
        if let Some(at) = self.score_height {
            if tip <= at + SCORE_CACHE_BLOCKS {
                return self.cached_score;
            }
        }
        let score = self.compute_score(tip, initial_height, chain, annex);
        self.cached_score = score;
        self.score_height = Some(tip);
        score
    }

    /// Mean per-challenge penalty in seconds across the live schedule.
    ///
    /// A challenge counts as answered only by a logged message naming both
    /// the challenge height and the block hash actually at that height. An
    /// attestation received before the block itself (or for a block never
    /// stamped) is on time; anything else is late by the receive-time gap;
    /// silence costs `PENALTY_TIME_SECS`.
    fn compute_score(
        &self,
        tip: u64,
        initial_height: Option<u64>,
        chain: &dyn ChainBackend,
        annex: &AnnexTable,
    ) -> f64 {
        // Blocks at or below the first post-sync height carry no receive
        // times, so they cannot be scored fairly.
        let floor = initial_height.unwrap_or(u64::MAX);

        let mut sum = 0.0f64;
        let mut counted = 0u32;

        for height in challenge_blocks(chain, tip, &self.outpoint) {
            if height <= floor {
                continue;
            }
            let Some(block) = chain.find_block_by_height(height) else {
                continue;
            };
            counted += 1;

            let block_recv = annex.recv_time_ms(&block.hash);
            let answer = self.existence_log.iter().find(|rx| {
                u64::from(rx.msg.block_height) == height && rx.msg.block_hash == block.hash
            });

            sum += match answer {
                Some(rx) if block_recv == 0 || rx.recv_time_ms < block_recv => 0.0,
                Some(rx) => (rx.recv_time_ms - block_recv) as f64 / 1000.0,
                None => PENALTY_TIME_SECS,
            };
        }

        if counted == 0 {
            0.0
        } else {
            sum / f64::from(counted)
        }
    }
}

/// Ranking key used when ordering candidates for votes: raw score with a
/// small stake rebate, so larger stakes win ties among equally live nodes.
pub fn stake_adjusted(score: f64, amount: u64) -> f64 {
    score - 0.001 * (amount as f64 / COIN as f64)
}
