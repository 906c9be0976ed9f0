//! Typed access to the wallet's database buckets.
//!
//! Bucket keys are the raw identifier bytes; values are serde_json
//! documents. The historic buckets only ever grow: a revert does not
//! delete historic values, because they exist to resolve input values for
//! outputs that have already left the confirmed set.

use crate::data_structures::{
    Currency, OutputID, SiacoinOutput, SiacoinOutputID, SiafundOutput, SiafundOutputID,
};
use crate::errors::{WalletError, WalletResult};
use crate::storage::DbTx;

pub const BUCKET_SIACOIN_OUTPUTS: &str = "SiacoinOutputs";
pub const BUCKET_SIAFUND_OUTPUTS: &str = "SiafundOutputs";
pub const BUCKET_HISTORIC_OUTPUTS: &str = "HistoricOutputs";
pub const BUCKET_HISTORIC_CLAIM_STARTS: &str = "HistoricClaimStarts";

/// Every bucket the wallet owns, created idempotently at open.
pub(crate) const DB_BUCKETS: [&str; 4] = [
    BUCKET_SIACOIN_OUTPUTS,
    BUCKET_SIAFUND_OUTPUTS,
    BUCKET_HISTORIC_OUTPUTS,
    BUCKET_HISTORIC_CLAIM_STARTS,
];

pub(crate) fn put_siacoin_output(
    tx: &DbTx<'_>,
    id: SiacoinOutputID,
    output: &SiacoinOutput,
) -> WalletResult<()> {
    tx.put(
        BUCKET_SIACOIN_OUTPUTS,
        id.as_bytes(),
        &serde_json::to_vec(output)?,
    )
}

pub(crate) fn delete_siacoin_output(tx: &DbTx<'_>, id: SiacoinOutputID) -> WalletResult<()> {
    tx.delete(BUCKET_SIACOIN_OUTPUTS, id.as_bytes())
}

pub(crate) fn put_siafund_output(
    tx: &DbTx<'_>,
    id: SiafundOutputID,
    output: &SiafundOutput,
) -> WalletResult<()> {
    tx.put(
        BUCKET_SIAFUND_OUTPUTS,
        id.as_bytes(),
        &serde_json::to_vec(output)?,
    )
}

pub(crate) fn delete_siafund_output(tx: &DbTx<'_>, id: SiafundOutputID) -> WalletResult<()> {
    tx.delete(BUCKET_SIAFUND_OUTPUTS, id.as_bytes())
}

pub(crate) fn put_historic_output(
    tx: &DbTx<'_>,
    id: OutputID,
    value: Currency,
) -> WalletResult<()> {
    tx.put(
        BUCKET_HISTORIC_OUTPUTS,
        id.as_bytes(),
        &serde_json::to_vec(&value)?,
    )
}

/// Fetch the historic value of an output. A miss means in-memory state
/// references an output the database never saw: corruption.
pub(crate) fn get_historic_output(tx: &DbTx<'_>, id: OutputID) -> WalletResult<Currency> {
    let bytes = tx.get(BUCKET_HISTORIC_OUTPUTS, id.as_bytes())?.ok_or_else(|| {
        WalletError::Corruption(format!("historic output {id} not found"))
    })?;
    Ok(serde_json::from_slice(&bytes)?)
}

pub(crate) fn put_historic_claim_start(
    tx: &DbTx<'_>,
    id: SiafundOutputID,
    claim_start: Currency,
) -> WalletResult<()> {
    tx.put(
        BUCKET_HISTORIC_CLAIM_STARTS,
        id.as_bytes(),
        &serde_json::to_vec(&claim_start)?,
    )
}

/// Fetch the claim start recorded for a siafund output.
pub(crate) fn get_historic_claim_start(
    tx: &DbTx<'_>,
    id: SiafundOutputID,
) -> WalletResult<Currency> {
    let bytes = tx
        .get(BUCKET_HISTORIC_CLAIM_STARTS, id.as_bytes())?
        .ok_or_else(|| {
            WalletError::Corruption(format!("historic claim start {id} not found"))
        })?;
    Ok(serde_json::from_slice(&bytes)?)
}
