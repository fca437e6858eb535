//! The coordination context: gossip entry, relay, and the block-receipt tick.
//!
//! One `MasternodeCoordinator` owns every piece of mutable coordination
//! state (registry, elected set, block annex, initial height). The hosting
//! node constructs it at startup, drives it from the chain-processing thread
//! and the serialised network dispatchers, and drops it at shutdown. The
//! only lock taken anywhere in the crate is the peer-list mutex during
//! relay.

use crate::block_annex::AnnexTable;
use crate::chain::{BlockId, ChainBackend, MonotoneClock, Peer, PeerList, TimeSource};
use crate::config::ConsensusParams;
use crate::constants::gossip::{
    ANCIENT_DEPTH, PENALTY_FORGERY, PENALTY_MINOR, PRUNE_INTERVAL_BLOCKS, STALE_DEPTH,
};
use crate::existence::{ExistenceMsg, LogVerdict, MNEXISTS_COMMAND};
use crate::masternode_registry::{MasternodeRegistry, RegistryError};
use crate::types::{Hash256, OutPoint};
use ed25519_dalek::SigningKey;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Verdict value meaning "admitted, relayed to peers".
pub const VERDICT_RELAYED: i32 = -1;
/// Verdict value meaning "dropped without penalty".
pub const VERDICT_IGNORED: i32 = 0;

pub struct MasternodeCoordinator {
    pub(crate) params: ConsensusParams,
    pub(crate) chain: Arc<dyn ChainBackend>,
    peers: PeerList,
    clock: Box<dyn TimeSource>,

    pub(crate) registry: MasternodeRegistry,
    pub(crate) annex: AnnexTable,
    /// Elected outpoints in lexicographic order; payee rotation walks this.
    pub(crate) elected: BTreeSet<OutPoint>,
    /// Tip height at the first post-sync tick. Blocks at or below it have no
    /// receive times and never participate in scoring.
    pub(crate) initial_height: Option<u64>,
}

impl MasternodeCoordinator {
    pub fn new(params: ConsensusParams, chain: Arc<dyn ChainBackend>, peers: PeerList) -> Self {
        Self::with_time_source(params, chain, peers, Box::new(MonotoneClock::new()))
    }

    pub fn with_time_source(
        params: ConsensusParams,
        chain: Arc<dyn ChainBackend>,
        peers: PeerList,
        clock: Box<dyn TimeSource>,
    ) -> Self {
        let registry = MasternodeRegistry::new(params.min_stake);
        Self {
            params,
            chain,
            peers,
            clock,
            registry,
            annex: AnnexTable::new(),
            elected: BTreeSet::new(),
            initial_height: None,
        }
    }

    pub fn params(&self) -> &ConsensusParams {
        &self.params
    }

    pub fn registry(&self) -> &MasternodeRegistry {
        &self.registry
    }

    pub fn elected(&self) -> Vec<OutPoint> {
        self.elected.iter().copied().collect()
    }

    pub fn elected_len(&self) -> usize {
        self.elected.len()
    }

    pub fn is_elected(&self, outpoint: &OutPoint) -> bool {
        self.elected.contains(outpoint)
    }

    pub fn initial_height(&self) -> Option<u64> {
        self.initial_height
    }

    /// Payee recorded for a connected block, if payments were active.
    pub fn selected_payee(&self, block_hash: &Hash256) -> Option<OutPoint> {
        self.annex.get(block_hash).and_then(|a| a.selected_payee)
    }

    /// First-seen receive time of a block; zero until stamped.
    pub fn block_recv_time_ms(&self, block_hash: &Hash256) -> u64 {
        self.annex.recv_time_ms(block_hash)
    }

    /// Refreshed liveness score for a known candidate.
    pub fn score_of(&mut self, outpoint: &OutPoint) -> Option<f64> {
        let tip = self.chain.tip_height();
        let initial = self.initial_height;
        let chain = Arc::clone(&self.chain);
        let annex = &self.annex;
        self.registry
            .get_existing_mut(outpoint)
            .map(|mn| mn.refreshed_score(tip, initial, chain.as_ref(), annex))
    }

    /// Begin operating a candidate locally: attach the wallet-supplied
    /// signing key and add it to our elected view.
    pub fn start_local(&mut self, outpoint: OutPoint, key: SigningKey) -> Result<(), RegistryError> {
        let chain = Arc::clone(&self.chain);
        self.registry.set_local(&outpoint, key, chain.as_ref())?;
        self.elected.insert(outpoint);
        Ok(())
    }

    /// Stop operating a candidate locally and drop it from our elected view.
    pub fn stop_local(&mut self, outpoint: &OutPoint) -> Result<(), RegistryError> {
        self.registry.clear_local(outpoint)?;
        self.elected.remove(outpoint);
        Ok(())
    }

    /// Gossip entry point for `mnexists` messages.
    ///
    /// Returns the verdict in the wire-handler encoding: negative means the
    /// message was admitted and relayed, zero means it was dropped silently,
    /// positive is the misbehaviour score already reported to `sender`.
    pub fn process_existence(&mut self, sender: Option<&dyn Peer>, msg: &ExistenceMsg) -> i32 {
        if self.chain.is_initial_block_download() {
            return VERDICT_IGNORED;
        }

        let tip = self.chain.tip_height();
        let height = u64::from(msg.block_height);

        if height + ANCIENT_DEPTH < tip {
            // Peers must not relay messages this deep.
            return Self::punish(sender, PENALTY_MINOR);
        }
        if height + STALE_DEPTH < tip {
            return VERDICT_IGNORED;
        }

        let now = self.clock.now_ms();
        let chain = Arc::clone(&self.chain);
        let Some(candidate) = self.registry.get(&msg.outpoint, chain.as_ref()) else {
            debug!(outpoint = %msg.outpoint, "existence message for unknown candidate");
            return Self::punish(sender, PENALTY_MINOR);
        };

        if !msg.verify(&candidate.pubkey) {
            return Self::punish(sender, PENALTY_FORGERY);
        }

        match candidate.record_existence(msg.clone(), tip, now) {
            LogVerdict::Admitted => {
                self.relay_existence(sender.map(|p| p.id()), msg);
                VERDICT_RELAYED
            }
            LogVerdict::Duplicate => VERDICT_IGNORED,
            LogVerdict::Spam => Self::punish(sender, PENALTY_MINOR),
        }
    }

    fn punish(sender: Option<&dyn Peer>, score: i32) -> i32 {
        if let Some(peer) = sender {
            peer.misbehaving(score);
        }
        score
    }

    /// Push an admitted message to every peer that has not seen it.
    ///
    /// The sender's known-set is primed without an echo; every other peer is
    /// sent the message iff its known-set insertion reports the hash as new.
    /// The peer-list mutex is held across the loop and released on return.
    fn relay_existence(&self, sender: Option<u64>, msg: &ExistenceMsg) {
        let identity = msg.identity_hash();
        let payload = msg.to_wire();

        let peers = self.peers.lock();
        let mut pushed = 0usize;
        for peer in peers.iter() {
            if Some(peer.id()) == sender {
                peer.mark_known(&identity);
                continue;
            }
            if peer.mark_known(&identity) {
                peer.send_message(MNEXISTS_COMMAND, &payload);
                pushed += 1;
            }
        }
        drop(peers);

        debug!(
            outpoint = %msg.outpoint,
            height = msg.block_height,
            pushed,
            "relayed existence message"
        );
    }

    /// Block-receipt hook, invoked by the host whenever the best chain may
    /// have advanced.
    ///
    /// Latches `initial_height` on the first post-sync call, prunes the
    /// registry every `PRUNE_INTERVAL_BLOCKS`, then walks backward from the
    /// tip stamping the first-seen receive time of every unstamped block and
    /// letting local candidates announce for it.
    pub fn on_best_block_changed(&mut self) {
        if self.chain.is_initial_block_download() {
            return;
        }

        let chain = Arc::clone(&self.chain);
        let tip = chain.tip_height();

        if self.initial_height.is_none() {
            self.initial_height = Some(tip);
            info!(height = tip, "masternode monitoring active above this height");
        }
        let initial = self.initial_height.unwrap_or(tip);

        if tip % PRUNE_INTERVAL_BLOCKS == 0 {
            self.registry.prune(chain.as_ref());
        }

        let mut height = tip;
        while height > initial {
            let Some(block) = chain.find_block_by_height(height) else {
                break;
            };
            if self.annex.recv_time_ms(&block.hash) != 0 {
                break;
            }
            let parent = chain
                .find_block_by_height(height - 1)
                .map(|b| b.hash)
                .unwrap_or_default();
            let now = self.clock.now_ms();
            self.annex.ensure(&block.hash, height, parent).recv_time_ms = now;

            self.announce_for_block(tip, &block);
            height -= 1;
        }
    }

    /// Local announcer: for every locally operated candidate whose schedule
    /// includes the newly stamped block, sign and self-admit an existence
    /// message, which also relays it.
    fn announce_for_block(&mut self, tip: u64, block: &BlockId) {
        for outpoint in self.registry.local_outpoints() {
            let Some(candidate) = self.registry.get_existing(&outpoint) else {
                continue;
            };
            let Some(key) = candidate.signing_key.clone() else {
                continue;
            };

            let schedule = crate::schedule::challenge_blocks(self.chain.as_ref(), tip, &outpoint);
            if !schedule.contains(&block.height) {
                continue;
            }

            let msg = ExistenceMsg::sign(outpoint, block.height as u32, block.hash, &key);
            debug!(
                outpoint = %outpoint,
                height = block.height,
                "announcing local masternode existence"
            );
            self.process_existence(None, &msg);
        }
    }
}
