//! In-memory chain, peers and clock shared by the integration suites.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use mncore::{BlockId, BlockRef, ChainBackend, CoinInfo, Hash256, OutPoint, Peer};
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;

/// Route core tracing output through the test harness capture. Safe to call
/// from every test; only the first call installs the subscriber.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("mncore=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Mock chain whose block hashes are `SHA256(height)`. Tip, coins, embedded
/// votes and the syncing flag are all mutable from the test body.
pub struct MockChain {
    inner: Mutex<ChainState>,
}

struct ChainState {
    tip: u64,
    coins: HashMap<OutPoint, CoinInfo>,
    votes: HashMap<Hash256, [Vec<OutPoint>; 2]>,
    syncing: bool,
}

impl MockChain {
    pub fn new(tip: u64) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(ChainState {
                tip,
                coins: HashMap::new(),
                votes: HashMap::new(),
                syncing: false,
            }),
        })
    }

    pub fn hash_at(height: u64) -> Hash256 {
        Sha256::digest(height.to_le_bytes()).into()
    }

    pub fn set_tip(&self, tip: u64) {
        self.inner.lock().tip = tip;
    }

    pub fn set_syncing(&self, syncing: bool) {
        self.inner.lock().syncing = syncing;
    }

    /// Seed an acceptable staking output and return its outpoint and key.
    pub fn stake(&self, seed: u8, value: u64) -> (OutPoint, SigningKey) {
        let key = SigningKey::from_bytes(&[seed; 32]);
        let outpoint = OutPoint::new([seed; 32], 0);
        self.inner.lock().coins.insert(
            outpoint,
            CoinInfo {
                confirmations: 100,
                value,
                pubkey: Some(key.verifying_key()),
            },
        );
        (outpoint, key)
    }

    pub fn spend(&self, outpoint: &OutPoint) {
        self.inner.lock().coins.remove(outpoint);
    }

    /// Embed vote vectors in the block at `height`.
    pub fn set_votes(&self, height: u64, adds: Vec<OutPoint>, removes: Vec<OutPoint>) {
        self.inner
            .lock()
            .votes
            .insert(Self::hash_at(height), [adds, removes]);
    }

    /// The block at `height` as the host would hand it to the core.
    pub fn block_ref(&self, height: u64) -> BlockRef {
        BlockRef {
            height,
            hash: Self::hash_at(height),
            parent: Self::hash_at(height.wrapping_sub(1)),
            votes: self.block_votes(&Self::hash_at(height)),
        }
    }
}

impl ChainBackend for MockChain {
    fn tip_height(&self) -> u64 {
        self.inner.lock().tip
    }

    fn find_block_by_height(&self, height: u64) -> Option<BlockId> {
        (height <= self.inner.lock().tip).then(|| BlockId {
            height,
            hash: Self::hash_at(height),
        })
    }

    fn block_votes(&self, hash: &Hash256) -> [Vec<OutPoint>; 2] {
        self.inner
            .lock()
            .votes
            .get(hash)
            .cloned()
            .unwrap_or([Vec::new(), Vec::new()])
    }

    fn get_output(&self, outpoint: &OutPoint) -> Option<CoinInfo> {
        self.inner.lock().coins.get(outpoint).cloned()
    }

    fn is_initial_block_download(&self) -> bool {
        self.inner.lock().syncing
    }
}

/// Recording peer: remembers every pushed message and accumulates the
/// misbehaviour score reported against it.
pub struct MockPeer {
    id: u64,
    known: Mutex<HashSet<Hash256>>,
    sent: Mutex<Vec<(String, Vec<u8>)>>,
    misbehaviour: AtomicI32,
}

impl MockPeer {
    pub fn new(id: u64) -> Arc<Self> {
        Arc::new(Self {
            id,
            known: Mutex::new(HashSet::new()),
            sent: Mutex::new(Vec::new()),
            misbehaviour: AtomicI32::new(0),
        })
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().len()
    }

    pub fn sent_commands(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(cmd, _)| cmd.clone()).collect()
    }

    pub fn misbehaviour_score(&self) -> i32 {
        self.misbehaviour.load(Ordering::Relaxed)
    }
}

impl Peer for MockPeer {
    fn id(&self) -> u64 {
        self.id
    }

    fn mark_known(&self, hash: &Hash256) -> bool {
        self.known.lock().insert(*hash)
    }

    fn send_message(&self, command: &str, payload: &[u8]) {
        self.sent.lock().push((command.to_string(), payload.to_vec()));
    }

    fn misbehaving(&self, score: i32) {
        self.misbehaviour.fetch_add(score, Ordering::Relaxed);
    }
}

/// Peer list in the shape the coordinator locks during relay.
pub fn peer_list(peers: &[Arc<MockPeer>]) -> mncore::PeerList {
    Arc::new(Mutex::new(
        peers.iter().map(|p| Arc::clone(p) as Arc<dyn Peer>).collect(),
    ))
}
