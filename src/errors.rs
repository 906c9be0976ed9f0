//! Error types for the wallet subsystem.
//!
//! All fallible operations in this crate return [`WalletResult`]. The error
//! tree is deliberately flat: one enum covering persistence metadata
//! mismatches, encryption failures, storage faults, and lifecycle errors.

use thiserror::Error;

/// Result alias used throughout the wallet crate.
pub type WalletResult<T> = Result<T, WalletError>;

/// Errors surfaced by wallet operations.
#[derive(Debug, Error)]
pub enum WalletError {
    /// A persisted file carries a different metadata header than the one
    /// compiled into this build. Fatal on open.
    #[error("wrong file header: expected {expected:?}, found {found:?}")]
    WrongHeader { expected: String, found: String },

    /// A persisted file carries a different metadata version than the one
    /// compiled into this build. Fatal on open.
    #[error("wrong file version: expected {expected:?}, found {found:?}")]
    WrongVersion { expected: String, found: String },

    /// Decrypted verification bytes did not match. The supplied passphrase
    /// does not unlock this wallet.
    #[error("provided encryption key is incorrect")]
    WrongPassword,

    /// The wallet is already encrypted; a second `encrypt` call is invalid.
    #[error("wallet package already contains an encryption key")]
    AlreadyEncrypted,

    /// The operation requires an unlocked wallet.
    #[error("wallet must be unlocked before it can be used")]
    Locked,

    /// A bucket is missing a key that in-memory state says must exist.
    /// Fatal; the wallet should be closed.
    #[error("wallet database is corrupt: {0}")]
    Corruption(String),

    /// The seed scanner exhausted its key budget without the termination
    /// condition being met.
    #[error("refused to generate more than {0} keys from seed")]
    MaxKeys(u64),

    /// The operation was attempted after shutdown began.
    #[error("wallet is shutting down")]
    Shutdown,

    /// The operation is recognized but intentionally not implemented.
    #[error("operation not supported: {0}")]
    Unsupported(&'static str),

    /// Symmetric encryption or decryption failed.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// An underlying storage-engine failure.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// A value could not be serialized to or deserialized from its at-rest
    /// form.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error while reading or writing persistence files.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = WalletError::WrongHeader {
            expected: "Wallet Settings".to_string(),
            found: "Host Settings".to_string(),
        };
        assert!(err.to_string().contains("Wallet Settings"));

        assert_eq!(
            WalletError::WrongPassword.to_string(),
            "provided encryption key is incorrect"
        );
        assert!(WalletError::MaxKeys(100_000_000)
            .to_string()
            .contains("100000000"));
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: WalletError = io.into();
        assert!(matches!(err, WalletError::Io(_)));
    }
}
