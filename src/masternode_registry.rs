//! Candidate registry: read-through admission over the coin view.
//!
//! Candidates are never synthesised from untrusted input. An outpoint enters
//! the registry only when the coin view confirms an unspent, sufficiently
//! confirmed, sufficiently valuable staking output with an extractable key,
//! and it leaves as soon as pruning sees the predicate fail.

use crate::chain::ChainBackend;
use crate::constants::payments::MIN_CONFIRMATIONS;
use crate::masternode::Masternode;
use crate::types::OutPoint;
use ed25519_dalek::{SigningKey, VerifyingKey};
use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Candidate not found and not admissible")]
    NotFound,
    #[error("Signing key does not control the staking output")]
    KeyMismatch,
    #[error("Candidate is not operated locally")]
    NotLocal,
}

pub struct MasternodeRegistry {
    candidates: HashMap<OutPoint, Masternode>,
    /// Outpoints this node signs for.
    local: BTreeSet<OutPoint>,
    min_stake: u64,
}

impl MasternodeRegistry {
    pub fn new(min_stake: u64) -> Self {
        Self {
            candidates: HashMap::new(),
            local: BTreeSet::new(),
            min_stake,
        }
    }

    /// Existing entry, or lazy admission through the coin view.
    pub fn get(&mut self, outpoint: &OutPoint, chain: &dyn ChainBackend) -> Option<&mut Masternode> {
        if !self.candidates.contains_key(outpoint) {
            let (pubkey, amount) = self.acceptable(outpoint, chain)?;
            debug!(outpoint = %outpoint, amount, "admitting masternode candidate");
            self.candidates
                .insert(*outpoint, Masternode::new(*outpoint, pubkey, amount));
        }
        self.candidates.get_mut(outpoint)
    }

    /// The admission predicate: unspent, aged, funded, key extractable.
    fn acceptable(
        &self,
        outpoint: &OutPoint,
        chain: &dyn ChainBackend,
    ) -> Option<(VerifyingKey, u64)> {
        let coin = chain.get_output(outpoint)?;
        if coin.confirmations < MIN_CONFIRMATIONS {
            return None;
        }
        if coin.value < self.min_stake {
            return None;
        }
        coin.pubkey.map(|key| (key, coin.value))
    }

    /// Re-filter every entry through the admission predicate; drop failures.
    pub fn prune(&mut self, chain: &dyn ChainBackend) {
        let stale: Vec<OutPoint> = self
            .candidates
            .keys()
            .filter(|op| self.acceptable(op, chain).is_none())
            .copied()
            .collect();

        for outpoint in stale {
            self.candidates.remove(&outpoint);
            if self.local.remove(&outpoint) {
                warn!(outpoint = %outpoint, "local masternode pruned: staking output no longer acceptable");
            } else {
                debug!(outpoint = %outpoint, "pruned masternode candidate");
            }
        }
    }

    /// Mark a candidate as locally operated and attach its signing key.
    pub fn set_local(
        &mut self,
        outpoint: &OutPoint,
        key: SigningKey,
        chain: &dyn ChainBackend,
    ) -> Result<(), RegistryError> {
        let candidate = self.get(outpoint, chain).ok_or(RegistryError::NotFound)?;
        if key.verifying_key() != candidate.pubkey {
            return Err(RegistryError::KeyMismatch);
        }
        candidate.is_local = true;
        candidate.signing_key = Some(key);
        self.local.insert(*outpoint);
        info!(outpoint = %outpoint, "local masternode started");
        Ok(())
    }

    /// Detach the signing key and drop local status.
    pub fn clear_local(&mut self, outpoint: &OutPoint) -> Result<(), RegistryError> {
        if !self.local.remove(outpoint) {
            return Err(RegistryError::NotLocal);
        }
        if let Some(candidate) = self.candidates.get_mut(outpoint) {
            candidate.is_local = false;
            candidate.signing_key = None;
        }
        info!(outpoint = %outpoint, "local masternode stopped");
        Ok(())
    }

    pub fn local_outpoints(&self) -> Vec<OutPoint> {
        self.local.iter().copied().collect()
    }

    pub fn get_existing(&self, outpoint: &OutPoint) -> Option<&Masternode> {
        self.candidates.get(outpoint)
    }

    pub fn get_existing_mut(&mut self, outpoint: &OutPoint) -> Option<&mut Masternode> {
        self.candidates.get_mut(outpoint)
    }

    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.candidates.contains_key(outpoint)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn outpoints(&self) -> Vec<OutPoint> {
        self.candidates.keys().copied().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&OutPoint, &Masternode)> {
        self.candidates.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&OutPoint, &mut Masternode)> {
        self.candidates.iter_mut()
    }
}
