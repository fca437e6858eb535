//! Candidate-set reconciliation: votes, elections and payee rotation.
//!
//! Votes are an opinion, elections are chain data. `cast_votes` compares our
//! preferred candidate set against the elected set and emits a bounded
//! add/remove vector for the next locally produced block. `connect_block`
//! tallies the votes actually carried by the chain and mutates the elected
//! set, reproducibly and from chain data alone, and `disconnect_block`
//! undoes exactly what connect applied. The payee walks the elected set in
//! lexicographic order.

use crate::chain::BlockRef;
use crate::constants::liveness::{MAX_SCORE, MISBEHAVING_SCORE, MONITORING_MIN_BLOCKS};
use crate::constants::payments::{START_PAYMENTS, STOP_PAYMENTS};
use crate::coordinator::MasternodeCoordinator;
use crate::masternode::stake_adjusted;
use crate::types::{KeyId, OutPoint};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, info};

/// Ranking entry: stake-adjusted score plus the outpoint tie-break. The
/// order is total (scores are always finite) and identical on every node
/// with the same view.
type Ranked = (f64, OutPoint);

fn ranked_cmp(a: &Ranked, b: &Ranked) -> Ordering {
    a.0.total_cmp(&b.0).then_with(|| a.1.cmp(&b.1))
}

impl MasternodeCoordinator {
    /// Produce the add/remove vote vectors for the next local block.
    ///
    /// Empty until the node has observed `MONITORING_MIN_BLOCKS` past its
    /// first post-sync height; otherwise the bounded difference between the
    /// best-scoring known candidates and the currently elected set.
    pub fn cast_votes(&mut self) -> (Vec<OutPoint>, Vec<OutPoint>) {
        let chain = Arc::clone(&self.chain);
        let tip = chain.tip_height();
        let Some(initial) = self.initial_height else {
            return (Vec::new(), Vec::new());
        };
        if tip < initial + MONITORING_MIN_BLOCKS {
            return (Vec::new(), Vec::new());
        }

        self.registry.prune(chain.as_ref());

        // Rank everything once; elected outpoints that fell out of the
        // registry rank with the misbehaving sentinel so they drain out
        // through remove votes.
        let initial_height = self.initial_height;
        let mut rank: HashMap<OutPoint, f64> = HashMap::new();
        let mut known: Vec<Ranked> = Vec::new();
        {
            let annex = &self.annex;
            for (outpoint, candidate) in self.registry.iter_mut() {
                let score = candidate.refreshed_score(tip, initial_height, chain.as_ref(), annex);
                let adjusted = stake_adjusted(score, candidate.amount);
                rank.insert(*outpoint, adjusted);
                if score <= MAX_SCORE {
                    known.push((adjusted, *outpoint));
                }
            }
        }
        known.sort_by(ranked_cmp);
        known.truncate(self.params.max_masternodes);

        let mut elected_vec: Vec<Ranked> = self
            .elected
            .iter()
            .map(|op| (rank.get(op).copied().unwrap_or(MISBEHAVING_SCORE), *op))
            .collect();
        elected_vec.sort_by(ranked_cmp);

        let (mut adds, mut removes) = set_difference(&elected_vec, &known);
        adds.reverse();

        cap_votes(&mut adds, &mut removes, self.params.max_votes);
        debug!(
            adds = adds.len(),
            removes = removes.len(),
            tip,
            "cast masternode votes"
        );
        (adds, removes)
    }

    /// Apply the elections a newly connected block settles, and select its
    /// payee. Returns the payee's key id for the coinbase, when payments are
    /// active.
    ///
    /// The tally, the applied set and the recorded payee outpoint depend on
    /// chain data alone, never on the live coin view, so a startup replay
    /// reproduces them exactly. Outpoints elected without an acceptable
    /// stake behind them are drained back out by `cast_votes` remove votes.
    pub fn connect_block(&mut self, block: &BlockRef) -> Option<KeyId> {
        let entry = self.annex.ensure(&block.hash, block.height, block.parent);
        entry.votes = block.votes.clone();

        if block.height <= self.params.fork_height {
            return None;
        }

        let tallies = self.tally_window(&block.parent);
        let majority = self.params.election_period / 2;

        let mut inserted: Vec<OutPoint> = Vec::new();
        for (outpoint, count) in &tallies[0] {
            if *count > majority && self.elected.insert(*outpoint) {
                inserted.push(*outpoint);
            }
        }

        let mut erased: Vec<OutPoint> = Vec::new();
        for (outpoint, count) in &tallies[1] {
            if *count > majority && self.elected.remove(outpoint) {
                erased.push(*outpoint);
            }
        }

        if !inserted.is_empty() || !erased.is_empty() {
            info!(
                height = block.height,
                elected_in = inserted.len(),
                elected_out = erased.len(),
                elected_total = self.elected.len(),
                "applied masternode elections"
            );
        }

        let prev_payee = self.annex.get(&block.parent).and_then(|a| a.selected_payee);
        let payee = self.select_next_payee(prev_payee.as_ref());

        let entry = self
            .annex
            .get_mut(&block.hash)
            .expect("annex entry created above");
        entry.applied_elections = [inserted, erased];
        entry.selected_payee = payee;

        // The key id for the coinbase is a live lookup; only the outpoint
        // recorded above is consensus data.
        let chain = Arc::clone(&self.chain);
        payee.and_then(|op| self.registry.get(&op, chain.as_ref()).map(|mn| mn.key_id))
    }

    /// Undo the elections `connect_block` applied for this block.
    ///
    /// The inverse of every recorded application must still hold; anything
    /// else means the chain index and the elected set have diverged, which
    /// is unrecoverable.
    pub fn disconnect_block(&mut self, block: &BlockRef) {
        let Some(entry) = self.annex.get_mut(&block.hash) else {
            return;
        };
        let applied = std::mem::take(&mut entry.applied_elections);
        entry.selected_payee = None;

        for outpoint in &applied[0] {
            assert!(
                self.elected.remove(outpoint),
                "election undo divergence: {outpoint} was recorded as inserted but is not elected"
            );
        }
        for outpoint in &applied[1] {
            assert!(
                self.elected.insert(*outpoint),
                "election undo divergence: {outpoint} was recorded as erased but is still elected"
            );
        }
    }

    /// Rebuild the elected set from chain data alone by replaying every
    /// post-fork block through `connect_block`. Called once at startup,
    /// after the host's chain index is built.
    pub fn load_elections(&mut self) {
        let chain = Arc::clone(&self.chain);
        let tip = chain.tip_height();
        let mut connected = 0u64;

        for height in (self.params.fork_height + 1)..=tip {
            let Some(block) = chain.find_block_by_height(height) else {
                break;
            };
            let parent = chain
                .find_block_by_height(height - 1)
                .map(|b| b.hash)
                .unwrap_or_default();
            let block_ref = BlockRef {
                height,
                hash: block.hash,
                parent,
                votes: chain.block_votes(&block.hash),
            };
            self.connect_block(&block_ref);
            connected += 1;
        }

        info!(
            blocks = connected,
            elected = self.elected.len(),
            "replayed masternode elections"
        );
    }

    /// Deterministic payee rotation over the elected set.
    ///
    /// Payments start once the elected set reaches `START_PAYMENTS` and
    /// survive shrinkage down to `STOP_PAYMENTS`. The payee after `prev` is
    /// the next elected outpoint in lexicographic order, wrapping to the
    /// smallest.
    pub fn select_next_payee(&self, prev: Option<&OutPoint>) -> Option<OutPoint> {
        match prev {
            None => {
                if self.elected.len() < START_PAYMENTS {
                    return None;
                }
                self.elected.iter().next().copied()
            }
            Some(prev) => {
                if self.elected.len() < STOP_PAYMENTS {
                    return None;
                }
                self.elected
                    .range((Bound::Excluded(*prev), Bound::Unbounded))
                    .next()
                    .or_else(|| self.elected.iter().next())
                    .copied()
            }
        }
    }

    /// Per-outpoint occurrence counts over the `election_period` ancestors
    /// ending at `parent`: `[add tally, remove tally]`. The walk follows
    /// annex parent links and never crosses the fork height, so incremental
    /// connects and startup replay tally identical windows.
    fn tally_window(&self, parent: &crate::types::Hash256) -> [BTreeMap<OutPoint, u64>; 2] {
        let mut tallies = [BTreeMap::new(), BTreeMap::new()];
        let mut cursor = *parent;

        for _ in 0..self.params.election_period {
            let Some(annex) = self.annex.get(&cursor) else {
                break;
            };
            if annex.height <= self.params.fork_height {
                break;
            }
            for side in 0..2 {
                for outpoint in &annex.votes[side] {
                    *tallies[side].entry(*outpoint).or_insert(0) += 1;
                }
            }
            cursor = annex.parent;
        }

        tallies
    }
}

/// Merge walk over two sequences sorted by `ranked_cmp`, emitting the
/// one-sided elements: present only in `elected` → remove votes, present
/// only in `known` → add votes. Both outputs come out in ascending rank
/// order.
fn set_difference(elected: &[Ranked], known: &[Ranked]) -> (Vec<OutPoint>, Vec<OutPoint>) {
    let mut adds = Vec::new();
    let mut removes = Vec::new();
    let (mut i, mut j) = (0usize, 0usize);

    while i < elected.len() && j < known.len() {
        match ranked_cmp(&elected[i], &known[j]) {
            Ordering::Less => {
                removes.push(elected[i].1);
                i += 1;
            }
            Ordering::Greater => {
                adds.push(known[j].1);
                j += 1;
            }
            Ordering::Equal => {
                i += 1;
                j += 1;
            }
        }
    }
    removes.extend(elected[i..].iter().map(|r| r.1));
    adds.extend(known[j..].iter().map(|r| r.1));

    (adds, removes)
}

/// Enforce `|adds| + |removes| ≤ max_votes`, splitting the budget
/// proportionally when both sides are non-empty. A budget below 2 cannot be
/// split; adds are served first.
fn cap_votes(adds: &mut Vec<OutPoint>, removes: &mut Vec<OutPoint>, max_votes: usize) {
    let total = adds.len() + removes.len();
    if total <= max_votes {
        return;
    }
    if adds.is_empty() || removes.is_empty() || max_votes < 2 {
        adds.truncate(max_votes);
        removes.truncate(max_votes - adds.len());
    } else {
        let share = (adds.len() * max_votes) as f64 / total as f64;
        let n0 = (share.round() as usize).clamp(1, max_votes - 1);
        adds.truncate(n0);
        removes.truncate(max_votes - n0);
    }
}
