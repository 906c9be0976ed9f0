//! Blocks, transactions, and the output types they carry.
//!
//! These are the wallet's view of on-chain data: enough structure to
//! compute identifiers, evaluate relevance against the key map, and carry
//! values. Signature validation happens in the consensus layer; the wallet
//! only ever reads these records.

use serde::{Deserialize, Serialize};

use super::currency::Currency;
use super::types::{
    BlockId, IdHasher, SiacoinOutputID, SiafundOutputID, Specifier, TransactionId, UnlockHash,
    SPECIFIER_MINER_PAYOUT, SPECIFIER_SIACOIN_OUTPUT, SPECIFIER_SIAFUND_OUTPUT,
};

const SPECIFIER_TRANSACTION: Specifier = Specifier::new(b"transaction");
const SPECIFIER_BLOCK: Specifier = Specifier::new(b"block");
const SPECIFIER_UNLOCK_CONDITIONS: Specifier = Specifier::new(b"unlockconditions");

/// A public key participating in an unlock condition. Stored as raw bytes;
/// the signing scheme is the cryptography layer's concern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "crate::data_structures::serde_bytes32")] pub [u8; 32]);

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// The condition set committed to by an unlock hash. An output addressed to
/// `conditions.unlock_hash()` is spendable by whoever can produce
/// `signatures_required` signatures under the listed keys once `timelock`
/// has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlockConditions {
    pub timelock: u64,
    pub public_keys: Vec<PublicKey>,
    pub signatures_required: u64,
}

impl UnlockConditions {
    /// Single-key conditions with no timelock, the form produced by seed
    /// derivation.
    pub fn standard(public_key: PublicKey) -> Self {
        UnlockConditions {
            timelock: 0,
            public_keys: vec![public_key],
            signatures_required: 1,
        }
    }

    /// The 32-byte commitment identifying these conditions.
    pub fn unlock_hash(&self) -> UnlockHash {
        let mut hasher = IdHasher::new(SPECIFIER_UNLOCK_CONDITIONS);
        hasher.write_u64(self.timelock);
        hasher.write_u64(self.public_keys.len() as u64);
        for key in &self.public_keys {
            hasher.write(key.as_bytes());
        }
        hasher.write_u64(self.signatures_required);
        UnlockHash(hasher.finalize())
    }
}

/// A siacoin output: a value owned by an unlock hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiacoinOutput {
    pub value: Currency,
    pub unlock_hash: UnlockHash,
}

/// A siafund output. `claim_start` records the size of the siafund pool at
/// creation time; spending the output yields a claim on the pool growth
/// since then.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiafundOutput {
    pub value: Currency,
    pub unlock_hash: UnlockHash,
    pub claim_start: Currency,
}

/// A siacoin input spending a previous output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiacoinInput {
    pub parent_id: SiacoinOutputID,
    pub unlock_conditions: UnlockConditions,
}

/// A siafund input. The accrued claim is paid to `claim_unlock_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiafundInput {
    pub parent_id: SiafundOutputID,
    pub unlock_conditions: UnlockConditions,
    pub claim_unlock_hash: UnlockHash,
}

/// An on-chain transaction, reduced to the fields the wallet inspects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Transaction {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub siacoin_inputs: Vec<SiacoinInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub siacoin_outputs: Vec<SiacoinOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub siafund_inputs: Vec<SiafundInput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub siafund_outputs: Vec<SiafundOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub miner_fees: Vec<Currency>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arbitrary_data: Vec<Vec<u8>>,
}

impl Transaction {
    /// The transaction identifier: a domain-separated hash over every
    /// field that defines the transaction.
    pub fn id(&self) -> TransactionId {
        let mut hasher = IdHasher::new(SPECIFIER_TRANSACTION);
        hasher.write_u64(self.siacoin_inputs.len() as u64);
        for sci in &self.siacoin_inputs {
            hasher.write(sci.parent_id.as_bytes());
            hasher.write(sci.unlock_conditions.unlock_hash().as_bytes());
        }
        hasher.write_u64(self.siacoin_outputs.len() as u64);
        for sco in &self.siacoin_outputs {
            hasher.write(&sco.value.to_be_bytes());
            hasher.write(sco.unlock_hash.as_bytes());
        }
        hasher.write_u64(self.siafund_inputs.len() as u64);
        for sfi in &self.siafund_inputs {
            hasher.write(sfi.parent_id.as_bytes());
            hasher.write(sfi.unlock_conditions.unlock_hash().as_bytes());
            hasher.write(sfi.claim_unlock_hash.as_bytes());
        }
        hasher.write_u64(self.siafund_outputs.len() as u64);
        for sfo in &self.siafund_outputs {
            hasher.write(&sfo.value.to_be_bytes());
            hasher.write(sfo.unlock_hash.as_bytes());
            hasher.write(&sfo.claim_start.to_be_bytes());
        }
        hasher.write_u64(self.miner_fees.len() as u64);
        for fee in &self.miner_fees {
            hasher.write(&fee.to_be_bytes());
        }
        hasher.write_u64(self.arbitrary_data.len() as u64);
        for data in &self.arbitrary_data {
            hasher.write_u64(data.len() as u64);
            hasher.write(data);
        }
        TransactionId(hasher.finalize())
    }

    /// Identifier of the siacoin output at index `i`.
    pub fn siacoin_output_id(&self, i: u64) -> SiacoinOutputID {
        let mut hasher = IdHasher::new(SPECIFIER_SIACOIN_OUTPUT);
        hasher.write(self.id().as_bytes());
        hasher.write_u64(i);
        SiacoinOutputID(hasher.finalize())
    }

    /// Identifier of the siafund output at index `i`.
    pub fn siafund_output_id(&self, i: u64) -> SiafundOutputID {
        let mut hasher = IdHasher::new(SPECIFIER_SIAFUND_OUTPUT);
        hasher.write(self.id().as_bytes());
        hasher.write_u64(i);
        SiafundOutputID(hasher.finalize())
    }
}

/// A block. Miner payouts are siacoin outputs that mature
/// [`MATURITY_DELAY`](crate::data_structures::MATURITY_DELAY) blocks after
/// the block height.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Block {
    pub parent_id: BlockId,
    pub nonce: u64,
    /// Unix timestamp, seconds.
    pub timestamp: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub miner_payouts: Vec<SiacoinOutput>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transactions: Vec<Transaction>,
}

impl Block {
    /// The block identifier.
    pub fn id(&self) -> BlockId {
        let mut hasher = IdHasher::new(SPECIFIER_BLOCK);
        hasher.write(self.parent_id.as_bytes());
        hasher.write_u64(self.nonce);
        hasher.write_u64(self.timestamp);
        hasher.write_u64(self.miner_payouts.len() as u64);
        for payout in &self.miner_payouts {
            hasher.write(&payout.value.to_be_bytes());
            hasher.write(payout.unlock_hash.as_bytes());
        }
        hasher.write_u64(self.transactions.len() as u64);
        for txn in &self.transactions {
            hasher.write(txn.id().as_bytes());
        }
        BlockId(hasher.finalize())
    }

    /// Identifier of the miner payout at index `i`. Payout ids live in the
    /// siacoin output id space.
    pub fn miner_payout_id(&self, i: u64) -> SiacoinOutputID {
        let mut hasher = IdHasher::new(SPECIFIER_MINER_PAYOUT);
        hasher.write(self.id().as_bytes());
        hasher.write_u64(i);
        SiacoinOutputID(hasher.finalize())
    }
}
