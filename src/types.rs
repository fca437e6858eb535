//! Core data types for the masternode coordination layer.

use ed25519_dalek::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

pub type Hash256 = [u8; 32];

/// Short identifier of the public key controlling a staking output.
/// First 20 bytes of SHA-256 over the raw key, in the style of a pay-to-key-hash.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct KeyId(pub [u8; 20]);

impl KeyId {
    pub fn of(key: &VerifyingKey) -> Self {
        let digest: Hash256 = Sha256::digest(key.as_bytes()).into();
        let mut id = [0u8; 20];
        id.copy_from_slice(&digest[..20]);
        KeyId(id)
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// The (txid, output-index) pair identifying a staking output.
///
/// Serves as candidate identity throughout the crate. The derived `Ord` is
/// lexicographic on txid then vout; payee rotation and the elected set rely
/// on this total order being identical on every node.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OutPoint {
    pub txid: Hash256,
    pub vout: u32,
}

impl OutPoint {
    pub fn new(txid: Hash256, vout: u32) -> Self {
        Self { txid, vout }
    }
}

impl fmt::Display for OutPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", hex::encode(&self.txid[..8]), self.vout)
    }
}

/// Result of a coin-view lookup for a staking output.
///
/// Returned only for unspent outputs; the host resolves the controlling
/// public key from the output script before handing it over (script parsing
/// stays outside the core).
#[derive(Clone, Debug)]
pub struct CoinInfo {
    /// Depth of the output in the active chain.
    pub confirmations: u64,
    /// Value in base units.
    pub value: u64,
    /// Key controlling the output, if the script exposes one.
    pub pubkey: Option<VerifyingKey>,
}
