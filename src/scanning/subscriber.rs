//! Subscription contracts between the wallet and its producers.
//!
//! The consensus engine delivers [`ConsensusChange`] records to any
//! subscriber; the wallet and the seed scanner are independent
//! implementations of the same one-method trait. The transaction pool
//! pushes the full unconfirmed set on every pool update.

use crate::data_structures::{ConsensusChange, ConsensusChangeId, Transaction};
use crate::errors::WalletResult;

/// Where a subscription starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeMode {
    /// Replay every change from genesis.
    FromBeginning,
    /// Replay changes after the given cursor.
    FromLast(ConsensusChangeId),
}

/// Handle identifying an active subscription, for unsubscribing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub u64);

/// A consumer of consensus changes.
pub trait ConsensusSubscriber {
    /// Handle one consensus change. Changes from a single subscription
    /// arrive strictly in delivery order; each change is a self-consistent
    /// diff whose reverts and applies compose.
    fn process_consensus_change(&mut self, change: &ConsensusChange);
}

/// The consensus engine's subscription surface.
///
/// `subscribe` is synchronous: every historical change selected by `mode`
/// has been delivered to the subscriber by the time it returns. The
/// producer is responsible for replay tolerance: a change is never
/// delivered twice within one subscription.
pub trait ConsensusSet {
    fn subscribe(
        &self,
        subscriber: &mut dyn ConsensusSubscriber,
        mode: SubscribeMode,
    ) -> WalletResult<SubscriptionId>;

    fn unsubscribe(&self, id: SubscriptionId);
}

/// A consumer of transaction-pool updates. The delivered list replaces any
/// prior unconfirmed view.
pub trait TransactionPoolSubscriber {
    fn receive_updated_unconfirmed_transactions(
        &mut self,
        transactions: &[Transaction],
        change: &ConsensusChange,
    );
}
