//! Processed-transaction history records.
//!
//! Whenever a confirmed or unconfirmed transaction touches a wallet
//! address, the wallet synthesizes a [`ProcessedTransaction`]: the raw
//! transaction annotated with confirmation coordinates and with every input
//! and output classified by fund kind, ownership, and maturity. This is the
//! record the history surface serves.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

use super::currency::Currency;
use super::transaction::Transaction;
use super::types::{
    Specifier, TransactionId, UnlockHash, SPECIFIER_CLAIM_OUTPUT, SPECIFIER_MINER_FEE,
    SPECIFIER_MINER_PAYOUT, SPECIFIER_SIACOIN_INPUT, SPECIFIER_SIACOIN_OUTPUT,
    SPECIFIER_SIAFUND_INPUT, SPECIFIER_SIAFUND_OUTPUT,
};

/// Sentinel confirmation height and timestamp for transactions that are
/// known to the node but not yet in a block.
pub const UNCONFIRMED: u64 = u64::MAX;

/// Classification of a processed input or output.
///
/// The serialized form preserves the 16-byte specifier labels used on disk
/// by earlier wallet databases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FundKind {
    MinerPayout,
    MinerFee,
    SiacoinInput,
    SiacoinOutput,
    SiafundInput,
    SiafundOutput,
    ClaimOutput,
}

impl FundKind {
    /// The on-disk specifier for this kind.
    pub fn specifier(&self) -> Specifier {
        match self {
            FundKind::MinerPayout => SPECIFIER_MINER_PAYOUT,
            FundKind::MinerFee => SPECIFIER_MINER_FEE,
            FundKind::SiacoinInput => SPECIFIER_SIACOIN_INPUT,
            FundKind::SiacoinOutput => SPECIFIER_SIACOIN_OUTPUT,
            FundKind::SiafundInput => SPECIFIER_SIAFUND_INPUT,
            FundKind::SiafundOutput => SPECIFIER_SIAFUND_OUTPUT,
            FundKind::ClaimOutput => SPECIFIER_CLAIM_OUTPUT,
        }
    }

    fn from_label(label: &str) -> Option<FundKind> {
        match label {
            "miner payout" => Some(FundKind::MinerPayout),
            "miner fee" => Some(FundKind::MinerFee),
            "siacoin input" => Some(FundKind::SiacoinInput),
            "siacoin output" => Some(FundKind::SiacoinOutput),
            "siafund input" => Some(FundKind::SiafundInput),
            "siafund output" => Some(FundKind::SiafundOutput),
            "claim output" => Some(FundKind::ClaimOutput),
            _ => None,
        }
    }
}

impl Serialize for FundKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let specifier = self.specifier();
        let label =
            std::str::from_utf8(specifier.label()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_str(label)
    }
}

impl<'de> Deserialize<'de> for FundKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        FundKind::from_label(&label)
            .ok_or_else(|| de::Error::custom(format!("unknown fund kind {label:?}")))
    }
}

/// An input of a processed transaction. The value is resolved from the
/// historic-output bucket, since the spent output itself is no longer in
/// the confirmed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedInput {
    pub fund_kind: FundKind,
    /// Whether `related_address` belongs to this wallet.
    pub wallet_address: bool,
    pub related_address: UnlockHash,
    pub value: Currency,
}

/// An output of a processed transaction. Miner fees carry no related
/// address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedOutput {
    pub fund_kind: FundKind,
    /// First height at which this output can be spent.
    pub maturity_height: u64,
    /// Whether `related_address` belongs to this wallet.
    pub wallet_address: bool,
    pub related_address: Option<UnlockHash>,
    pub value: Currency,
}

/// A transaction annotated with its wallet-relevant classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTransaction {
    pub transaction: Transaction,
    pub transaction_id: TransactionId,
    /// Height of the confirming block, or [`UNCONFIRMED`].
    pub confirmation_height: u64,
    /// Timestamp of the confirming block, or [`UNCONFIRMED`].
    pub confirmation_timestamp: u64,
    pub inputs: Vec<ProcessedInput>,
    pub outputs: Vec<ProcessedOutput>,
}

impl ProcessedTransaction {
    /// Whether this record is still waiting for a confirming block.
    pub fn is_unconfirmed(&self) -> bool {
        self.confirmation_height == UNCONFIRMED
    }
}
