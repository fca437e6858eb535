//! Host seams: chain access, peer handles, monotone time.
//!
//! The coordination core owns no block store, no sockets and no wall clock;
//! the hosting node supplies all three through the traits here. Everything
//! the core reads from the chain is funneled through [`ChainBackend`] so the
//! whole crate can be driven by an in-memory chain in tests.

use crate::types::{CoinInfo, Hash256, OutPoint};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Instant;

/// Identity of a block on the active chain.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockId {
    pub height: u64,
    pub hash: Hash256,
}

/// A connected (or disconnecting) block as seen by the core: position in the
/// chain plus the two block-embedded vote vectors. The host fills `votes`
/// from whatever serialisation slot its block format reserves for them.
#[derive(Clone, Debug)]
pub struct BlockRef {
    pub height: u64,
    pub hash: Hash256,
    pub parent: Hash256,
    /// `votes[0]` = add votes, `votes[1]` = remove votes.
    pub votes: [Vec<OutPoint>; 2],
}

/// Read-only view of the hosting node's chain state.
pub trait ChainBackend {
    /// Height of the active chain tip.
    fn tip_height(&self) -> u64;

    /// Block at `height` on the active chain, if present.
    fn find_block_by_height(&self, height: u64) -> Option<BlockId>;

    /// The vote vectors embedded in a block. Empty for blocks carrying none.
    fn block_votes(&self, hash: &Hash256) -> [Vec<OutPoint>; 2];

    /// Coin-view lookup. `None` for unknown or spent outputs.
    fn get_output(&self, outpoint: &OutPoint) -> Option<CoinInfo>;

    /// True while the node is still syncing headers/blocks; the core stays
    /// passive until this clears.
    fn is_initial_block_download(&self) -> bool;
}

/// Handle to one connected peer, supplied by the network layer.
///
/// `mark_known` backs the per-pair relay dedup: it inserts into the peer's
/// known-message set and reports whether the hash was new to that peer.
pub trait Peer: Send + Sync {
    fn id(&self) -> u64;

    /// Insert into the peer's known-hash set; true iff newly inserted.
    fn mark_known(&self, hash: &Hash256) -> bool;

    /// Push a wire message to the peer.
    fn send_message(&self, command: &str, payload: &[u8]);

    /// Report peer misbehaviour (positive score) to the network layer.
    fn misbehaving(&self, score: i32);
}

/// The peer list and its mutex, the only lock the core ever takes. It is
/// held for the duration of a relay broadcast and released before returning.
pub type PeerList = Arc<Mutex<Vec<Arc<dyn Peer>>>>;

/// Monotone millisecond clock used for receive-time stamping and scoring.
/// Never synchronised across nodes; scoring is local-only.
pub trait TimeSource: Send {
    fn now_ms(&self) -> u64;
}

/// Production time source: milliseconds since construction, monotone by
/// `Instant`'s guarantee.
pub struct MonotoneClock {
    epoch: Instant,
}

impl MonotoneClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotoneClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotoneClock {
    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }
}

/// Settable time source for test rigs. Must never be driven backwards.
pub struct ManualTimeSource {
    now: std::sync::atomic::AtomicU64,
}

impl ManualTimeSource {
    pub fn new(start_ms: u64) -> Arc<Self> {
        Arc::new(Self {
            now: std::sync::atomic::AtomicU64::new(start_ms),
        })
    }

    pub fn set_ms(&self, now_ms: u64) {
        self.now.store(now_ms, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn advance_ms(&self, delta_ms: u64) {
        self.now
            .fetch_add(delta_ms, std::sync::atomic::Ordering::Relaxed);
    }
}

impl TimeSource for Arc<ManualTimeSource> {
    fn now_ms(&self) -> u64 {
        self.now.load(std::sync::atomic::Ordering::Relaxed)
    }
}
