//! Per-block state owned by the coordination core.
//!
//! The core needs a handful of fields on every chain block (receive time,
//! embedded votes, applied elections, selected payee). They live here in a
//! hash-keyed side table instead of on the host's block index, so the core
//! carries its own state and the block index stays cycle-free.

use crate::types::{Hash256, OutPoint};
use std::collections::HashMap;

/// Core-owned annotations for one block.
#[derive(Clone, Debug, Default)]
pub struct BlockAnnex {
    pub height: u64,
    pub parent: Hash256,

    /// Local monotone timestamp of when the block first became eligible for
    /// scoring. Zero until stamped; written exactly once.
    pub recv_time_ms: u64,

    /// Vote vectors carried in the block: `[adds, removes]`.
    pub votes: [Vec<OutPoint>; 2],

    /// Elections actually applied when this block connected: `[inserted,
    /// erased]`. This is the undo log for disconnect.
    pub applied_elections: [Vec<OutPoint>; 2],

    /// Payee selected for this block, if payments were active.
    pub selected_payee: Option<OutPoint>,
}

/// Annex entries for every block the core has seen, keyed by block hash.
///
/// Entries are kept for the lifetime of the node: disconnect during a deep
/// reorg must still find the undo log of old blocks.
#[derive(Default)]
pub struct AnnexTable {
    entries: HashMap<Hash256, BlockAnnex>,
}

impl AnnexTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, hash: &Hash256) -> Option<&BlockAnnex> {
        self.entries.get(hash)
    }

    pub fn get_mut(&mut self, hash: &Hash256) -> Option<&mut BlockAnnex> {
        self.entries.get_mut(hash)
    }

    /// Entry for `hash`, created with the given position if absent.
    pub fn ensure(&mut self, hash: &Hash256, height: u64, parent: Hash256) -> &mut BlockAnnex {
        self.entries.entry(*hash).or_insert_with(|| BlockAnnex {
            height,
            parent,
            ..BlockAnnex::default()
        })
    }

    /// Receive-time stamp for a block; zero when unknown or unstamped.
    pub fn recv_time_ms(&self, hash: &Hash256) -> u64 {
        self.entries.get(hash).map_or(0, |a| a.recv_time_ms)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
