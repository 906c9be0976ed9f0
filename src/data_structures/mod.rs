//! Domain data structures: identifiers, currency, chain records, consensus
//! diffs, and processed-transaction history entries.

pub mod consensus;
pub mod currency;
pub mod processed_transaction;
pub mod transaction;
pub mod types;

pub use consensus::{
    ConsensusChange, ConsensusChangeId, DiffDirection, SiacoinOutputDiff, SiafundOutputDiff,
    SiafundPoolDiff,
};
pub use currency::Currency;
pub use processed_transaction::{
    FundKind, ProcessedInput, ProcessedOutput, ProcessedTransaction, UNCONFIRMED,
};
pub use transaction::{
    Block, PublicKey, SiacoinInput, SiacoinOutput, SiafundInput, SiafundOutput, Transaction,
    UnlockConditions,
};
pub use types::{
    BlockId, OutputID, SiacoinOutputID, SiafundOutputID, Specifier, TransactionId, UnlockHash,
    HASH_SIZE, SPECIFIER_SIZE,
};

/// Number of blocks between a miner payout being mined and it becoming
/// spendable. A chain constant: the consensus layer materializes maturity
/// as an output diff at exactly this delay.
pub const MATURITY_DELAY: u64 = 50;

/// Serde helper for fixed 32-byte arrays encoded as hex strings.
pub(crate) mod serde_bytes32 {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = hex::decode(&s).map_err(de::Error::custom)?;
        bytes
            .try_into()
            .map_err(|_| de::Error::custom("expected 32 bytes"))
    }
}
