//! Wallet subsystem for a blockchain node.
//!
//! This crate turns a stream of consensus updates (applied and reverted
//! blocks plus diffs to the confirmed output set) into an authoritative,
//! persistent view of wallet-owned unspent outputs and a chronological,
//! revertible transaction history. It also ships the seed-recovery
//! scanner, which rediscovers wallet-owned outputs by replaying the
//! blockchain against a geometrically growing pool of deterministically
//! derived addresses.
//!
//! ## Architecture
//!
//! - [`storage`]: a bucketed key-value store over an embedded sqlite
//!   database, plus metadata-versioned settings files.
//! - [`key_management`]: deterministic key derivation from seeds and
//!   encryption-at-rest for seeds and spendable keys.
//! - [`wallet`]: the [`Wallet`](wallet::Wallet) itself: lifecycle,
//!   confirmed-set updates, history engine, unconfirmed view.
//! - [`scanning`]: the subscription contracts and the
//!   [`SeedScanner`](scanning::SeedScanner).
//!
//! The wallet is a pure subscriber: it opens no sockets and never calls
//! back into the consensus engine. All persistent mutations for one
//! consensus change happen inside one database transaction; in-memory
//! state is published only after the commit succeeds, so a crash or a
//! storage error never leaves a change half-applied.

pub mod common;
pub mod config;
pub mod data_structures;
pub mod errors;
pub mod key_management;
pub mod scanning;
pub mod storage;
pub mod wallet;

pub use config::{ReleaseProfile, WalletConfig};
pub use data_structures::{
    Block, ConsensusChange, ConsensusChangeId, Currency, DiffDirection, FundKind,
    ProcessedInput, ProcessedOutput, ProcessedTransaction, SiacoinInput, SiacoinOutput,
    SiacoinOutputDiff, SiacoinOutputID, SiafundInput, SiafundOutput, SiafundOutputDiff,
    SiafundOutputID, SiafundPoolDiff, Transaction, TransactionId, UnlockConditions, UnlockHash,
    MATURITY_DELAY,
};
pub use errors::{WalletError, WalletResult};
pub use key_management::{generate_keys, Seed, SpendableKey, SpendableKeyFile};
pub use scanning::{
    ConsensusSet, ConsensusSubscriber, ScannedSiacoinOutput, SeedScanner, SubscribeMode,
    SubscriptionId, TransactionPoolSubscriber,
};
pub use wallet::{Wallet, WalletStatus};
