//! Signed existence messages: the liveness signal.
//!
//! An existence message is a candidate's attestation that it observed a
//! given block: `(outpoint, block_height, block_hash)` signed by the key
//! controlling the staking output. Two digests matter:
//!
//! - the **signing hash** covers everything except the signature and is what
//!   gets signed;
//! - the **identity hash** also covers the signature and is what relay
//!   dedup and the per-candidate log key on.

use crate::types::{Hash256, OutPoint};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Wire command name for existence messages.
pub const MNEXISTS_COMMAND: &str = "mnexists";

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExistenceMsg {
    pub outpoint: OutPoint,
    pub block_height: u32,
    pub block_hash: Hash256,
    pub signature: Signature,
}

impl ExistenceMsg {
    /// Build and sign an existence message for `block` on behalf of the
    /// candidate staking `outpoint`.
    pub fn sign(
        outpoint: OutPoint,
        block_height: u32,
        block_hash: Hash256,
        key: &SigningKey,
    ) -> Self {
        let digest = signing_hash(&outpoint, block_height, &block_hash);
        let signature = key.sign(&digest);
        Self {
            outpoint,
            block_height,
            block_hash,
            signature,
        }
    }

    /// Check the signature against the key expected to control the staking
    /// output. The scheme is non-recoverable, so the caller supplies the
    /// registry's key rather than deriving one from the signature.
    pub fn verify(&self, expected: &VerifyingKey) -> bool {
        let digest = signing_hash(&self.outpoint, self.block_height, &self.block_hash);
        expected.verify(&digest, &self.signature).is_ok()
    }

    /// Digest over the signed fields only.
    pub fn signing_hash(&self) -> Hash256 {
        signing_hash(&self.outpoint, self.block_height, &self.block_hash)
    }

    /// Digest over the signed fields and the signature; keys relay memory
    /// and the per-candidate log.
    pub fn identity_hash(&self) -> Hash256 {
        let mut hasher = Sha256::new();
        hasher.update(self.signing_hash());
        hasher.update(self.signature.to_bytes());
        hasher.finalize().into()
    }

    pub fn to_wire(&self) -> Vec<u8> {
        bincode::serialize(self).expect("existence message serialization cannot fail")
    }

    pub fn from_wire(payload: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(payload)
    }
}

fn signing_hash(outpoint: &OutPoint, block_height: u32, block_hash: &Hash256) -> Hash256 {
    let mut hasher = Sha256::new();
    hasher.update(outpoint.txid);
    hasher.update(outpoint.vout.to_le_bytes());
    hasher.update(block_height.to_le_bytes());
    hasher.update(block_hash);
    hasher.finalize().into()
}

/// An admitted existence message plus the local monotone time of admission.
#[derive(Clone, Debug)]
pub struct ReceivedExistenceMsg {
    pub msg: ExistenceMsg,
    pub recv_time_ms: u64,
}

/// Outcome of feeding a message into a candidate's liveness log.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogVerdict {
    /// New message, appended; relay it.
    Admitted,
    /// Identity hash already present; drop silently.
    Duplicate,
    /// The candidate flooded the log past the spam bound; it is now flagged
    /// misbehaving and the relaying peer is penalised.
    Spam,
}
