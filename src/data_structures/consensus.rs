//! Consensus-change records.
//!
//! The consensus engine describes every state transition, including
//! reorganizations, as a [`ConsensusChange`]: the blocks leaving the best
//! chain, the blocks joining it, and the resulting diffs to the confirmed
//! output sets and the siafund pool. Reverts always precede applies within
//! one change, and a change composes with its own reversal to a no-op.

use serde::{Deserialize, Serialize};

use super::currency::Currency;
use super::transaction::{Block, SiacoinOutput, SiafundOutput};
use super::types::{SiacoinOutputID, SiafundOutputID};

/// Identifier a consumer can use to resume a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct ConsensusChangeId(pub u64);

/// Direction of a diff within a consensus change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiffDirection {
    Apply,
    Revert,
}

/// A change to the confirmed siacoin output set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiacoinOutputDiff {
    pub direction: DiffDirection,
    pub id: SiacoinOutputID,
    pub output: SiacoinOutput,
}

/// A change to the confirmed siafund output set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiafundOutputDiff {
    pub direction: DiffDirection,
    pub id: SiafundOutputID,
    pub output: SiafundOutput,
}

/// A change to the siafund pool. `adjusted` is the pool after the diff,
/// `previous` the pool before it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiafundPoolDiff {
    pub direction: DiffDirection,
    pub adjusted: Currency,
    pub previous: Currency,
}

/// An atomic state transition delivered to consensus subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ConsensusChange {
    pub id: ConsensusChangeId,
    /// Blocks removed from the best chain, ordered newest first.
    pub reverted_blocks: Vec<Block>,
    /// Blocks added to the best chain, ordered oldest first.
    pub applied_blocks: Vec<Block>,
    pub siacoin_output_diffs: Vec<SiacoinOutputDiff>,
    pub siafund_output_diffs: Vec<SiafundOutputDiff>,
    pub siafund_pool_diffs: Vec<SiafundPoolDiff>,
}

impl ConsensusChange {
    /// Build the change that exactly undoes this one: blocks swap roles and
    /// reverse order, and every diff flips direction in reverse order.
    pub fn inverse(&self) -> ConsensusChange {
        let flip = |d: DiffDirection| match d {
            DiffDirection::Apply => DiffDirection::Revert,
            DiffDirection::Revert => DiffDirection::Apply,
        };
        ConsensusChange {
            id: self.id,
            reverted_blocks: self.applied_blocks.iter().rev().cloned().collect(),
            applied_blocks: self.reverted_blocks.iter().rev().cloned().collect(),
            siacoin_output_diffs: self
                .siacoin_output_diffs
                .iter()
                .rev()
                .map(|d| SiacoinOutputDiff {
                    direction: flip(d.direction),
                    id: d.id,
                    output: d.output.clone(),
                })
                .collect(),
            siafund_output_diffs: self
                .siafund_output_diffs
                .iter()
                .rev()
                .map(|d| SiafundOutputDiff {
                    direction: flip(d.direction),
                    id: d.id,
                    output: d.output.clone(),
                })
                .collect(),
            siafund_pool_diffs: self
                .siafund_pool_diffs
                .iter()
                .rev()
                .map(|d| SiafundPoolDiff {
                    direction: flip(d.direction),
                    adjusted: d.adjusted,
                    previous: d.previous,
                })
                .collect(),
        }
    }
}
