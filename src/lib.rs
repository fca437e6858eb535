//! Masternode coordination core.
//!
//! Maintains the registry of staking-backed masternode candidates, measures
//! their liveness against a deterministic per-block challenge schedule,
//! reconciles the preferred candidate set into bounded block-embedded votes,
//! applies the elections carried by connected blocks (reversibly), and
//! rotates block payees through the elected set.
//!
//! The crate is a library embedded by a hosting node: block store, coin
//! view, signatures-at-rest, message framing and peer bookkeeping stay on
//! the host side of the [`chain::ChainBackend`] and [`chain::Peer`] seams.
//! All coordination state lives in one [`coordinator::MasternodeCoordinator`],
//! driven from the host's chain-processing thread; nothing here persists
//! across restarts; the elected set is rebuilt from chain data by
//! [`coordinator::MasternodeCoordinator::load_elections`].

pub mod block_annex;
pub mod chain;
pub mod config;
pub mod constants;
pub mod coordinator;
pub mod election;
pub mod existence;
pub mod masternode;
pub mod masternode_registry;
pub mod schedule;
pub mod types;

pub use chain::{BlockId, BlockRef, ChainBackend, ManualTimeSource, MonotoneClock, Peer, PeerList, TimeSource};
pub use config::ConsensusParams;
pub use coordinator::MasternodeCoordinator;
pub use existence::{ExistenceMsg, LogVerdict, MNEXISTS_COMMAND};
pub use masternode_registry::RegistryError;
pub use types::{CoinInfo, Hash256, KeyId, OutPoint};
