//! Consensus subscription contracts and the seed-recovery scanner.

pub mod seed_scanner;
pub mod subscriber;

pub use seed_scanner::{ScannedSiacoinOutput, SeedScanner};
pub use subscriber::{
    ConsensusSet, ConsensusSubscriber, SubscribeMode, SubscriptionId, TransactionPoolSubscriber,
};
