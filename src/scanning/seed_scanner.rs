//! Seed recovery scanning.
//!
//! Given only a seed, the scanner rediscovers which addresses the wallet
//! has used by replaying the blockchain against a pool of deterministically
//! derived keys. The number of addresses ever used is unknown, so the pool
//! grows geometrically: each round derives more keys and replays the chain,
//! until at least half the pool was never seen on-chain, at which point
//! the used index range is certainly covered. Replays are slow, so the
//! loop is tuned to minimize rounds rather than keys.

use std::collections::HashMap;

use tracing::debug;

use crate::config::ReleaseProfile;
use crate::data_structures::{
    ConsensusChange, Currency, SiacoinOutputID, UnlockHash, MATURITY_DELAY,
};
use crate::errors::{WalletError, WalletResult};
use crate::key_management::{generate_keys, Seed};

use super::subscriber::{ConsensusSet, ConsensusSubscriber, SubscribeMode};

/// A siacoin output discovered during scanning, tagged with the seed index
/// that owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedSiacoinOutput {
    pub id: SiacoinOutputID,
    pub value: Currency,
    pub seed_index: u64,
}

/// Ephemeral consensus subscriber that recovers the address set of a seed.
pub struct SeedScanner {
    seed: Seed,
    initial_keys: u64,
    max_keys: u64,
    /// Address to seed index, for every derived key.
    keys: HashMap<UnlockHash, u64>,
    /// Unspent outputs owned by the seed, as of the replay position.
    siacoin_outputs: HashMap<SiacoinOutputID, ScannedSiacoinOutput>,
    /// Miner payouts keyed by the height at which they mature.
    miner_outputs: HashMap<u64, Vec<ScannedSiacoinOutput>>,
    largest_index_seen: u64,
    blockheight: u64,
}

impl SeedScanner {
    /// Scanner with the key budgets of `profile`.
    pub fn new(seed: Seed, profile: ReleaseProfile) -> Self {
        Self::with_budgets(seed, profile.initial_scan_keys(), profile.max_scan_keys())
    }

    /// Scanner with explicit key budgets.
    pub fn with_budgets(seed: Seed, initial_keys: u64, max_keys: u64) -> Self {
        SeedScanner {
            seed,
            initial_keys,
            max_keys,
            keys: HashMap::new(),
            siacoin_outputs: HashMap::new(),
            miner_outputs: HashMap::new(),
            largest_index_seen: 0,
            blockheight: 0,
        }
    }

    fn is_seed_address(&self, unlock_hash: &UnlockHash) -> bool {
        self.keys.contains_key(unlock_hash)
    }

    /// Derive `n` additional keys, continuing from the current pool size.
    fn generate_keys(&mut self, n: u64) {
        let initial_progress = self.keys.len() as u64;
        for (i, key) in generate_keys(&self.seed, initial_progress, n).iter().enumerate() {
            self.keys.insert(key.unlock_hash(), initial_progress + i as u64);
        }
    }

    /// Number of keys derived so far.
    pub fn num_keys(&self) -> u64 {
        self.keys.len() as u64
    }

    /// Largest seed index observed anywhere in the chain.
    pub fn largest_index_seen(&self) -> u64 {
        self.largest_index_seen
    }

    /// The discovered unspent outputs.
    pub fn siacoin_outputs(&self) -> &HashMap<SiacoinOutputID, ScannedSiacoinOutput> {
        &self.siacoin_outputs
    }

    /// Consume the scanner, yielding the recovered address map and outputs
    /// for the wallet to adopt.
    pub fn into_recovered_state(
        self,
    ) -> (
        HashMap<UnlockHash, u64>,
        HashMap<SiacoinOutputID, ScannedSiacoinOutput>,
    ) {
        (self.keys, self.siacoin_outputs)
    }

    /// Replay the blockchain against a growing key pool until the pool
    /// provably covers all used indices, or the key budget runs out
    /// ([`WalletError::MaxKeys`]).
    ///
    /// Each round is a full synchronous replay; the per-round replay state
    /// is reset so that heights and output sets are counted once, while
    /// the key pool and the largest index seen accumulate across rounds.
    pub fn scan(&mut self, consensus_set: &dyn ConsensusSet) -> WalletResult<()> {
        let mut num_keys = self.initial_keys;
        while self.num_keys() < self.max_keys {
            self.generate_keys(num_keys);
            self.siacoin_outputs.clear();
            self.miner_outputs.clear();
            self.blockheight = 0;

            let subscription = consensus_set.subscribe(self, SubscribeMode::FromBeginning)?;
            consensus_set.unsubscribe(subscription);
            debug!(
                keys = self.num_keys(),
                largest_index_seen = self.largest_index_seen,
                "seed scan round complete"
            );

            if self.largest_index_seen < self.num_keys() / 2 {
                // At least half the pool was never used; every used index
                // is covered.
                return Ok(());
            }

            num_keys *= 2;
            if num_keys > self.max_keys - self.num_keys() {
                num_keys = self.max_keys - self.num_keys();
            }
        }
        Err(WalletError::MaxKeys(self.max_keys))
    }
}

impl ConsensusSubscriber for SeedScanner {
    fn process_consensus_change(&mut self, change: &ConsensusChange) {
        // One-shot recovery does not need full reversal fidelity; height
        // bookkeeping is enough.
        self.blockheight = self
            .blockheight
            .saturating_sub(change.reverted_blocks.len() as u64);

        for block in &change.applied_blocks {
            self.blockheight += 1;

            // Miner payouts maturing at this height become spendable.
            if let Some(matured) = self.miner_outputs.remove(&self.blockheight) {
                for output in matured {
                    self.siacoin_outputs.insert(output.id, output);
                }
            }

            for (i, payout) in block.miner_payouts.iter().enumerate() {
                if let Some(&seed_index) = self.keys.get(&payout.unlock_hash) {
                    let maturity_height = self.blockheight + MATURITY_DELAY;
                    self.miner_outputs
                        .entry(maturity_height)
                        .or_default()
                        .push(ScannedSiacoinOutput {
                            id: block.miner_payout_id(i as u64),
                            value: payout.value,
                            seed_index,
                        });
                }
            }

            for txn in &block.transactions {
                for (i, sco) in txn.siacoin_outputs.iter().enumerate() {
                    if let Some(&seed_index) = self.keys.get(&sco.unlock_hash) {
                        let id = txn.siacoin_output_id(i as u64);
                        self.siacoin_outputs.insert(
                            id,
                            ScannedSiacoinOutput {
                                id,
                                value: sco.value,
                                seed_index,
                            },
                        );
                    }
                }
                for sci in &txn.siacoin_inputs {
                    self.siacoin_outputs.remove(&sci.parent_id);
                }
            }
        }

        // Track the largest seed index appearing anywhere in the change.
        let mut addresses: Vec<UnlockHash> = Vec::new();
        for diff in &change.siacoin_output_diffs {
            addresses.push(diff.output.unlock_hash);
        }
        for diff in &change.siafund_output_diffs {
            addresses.push(diff.output.unlock_hash);
        }
        for block in &change.applied_blocks {
            for payout in &block.miner_payouts {
                addresses.push(payout.unlock_hash);
            }
            for txn in &block.transactions {
                for sci in &txn.siacoin_inputs {
                    addresses.push(sci.unlock_conditions.unlock_hash());
                }
                for sco in &txn.siacoin_outputs {
                    addresses.push(sco.unlock_hash);
                }
                for sfi in &txn.siafund_inputs {
                    addresses.push(sfi.unlock_conditions.unlock_hash());
                }
                for sfo in &txn.siafund_outputs {
                    addresses.push(sfo.unlock_hash);
                }
            }
        }
        for address in addresses {
            if let Some(&index) = self.keys.get(&address) {
                if index > self.largest_index_seen {
                    self.largest_index_seen = index;
                }
            }
        }
    }
}
