//! Core identifier types shared across the wallet.
//!
//! Every on-chain entity the wallet tracks is addressed by a 32-byte
//! identifier produced by a domain-separated Blake2b-256 hash. The newtypes
//! here exist so that a siafund output id cannot be confused with a siacoin
//! output id at compile time; `OutputID` unifies the two kinds for buckets
//! that store both (the historic-value bucket).

use std::fmt;

use blake2::{Blake2b, Digest};
use digest::consts::U32;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};

/// Number of bytes in an identifier or unlock hash.
pub const HASH_SIZE: usize = 32;

/// Number of bytes in a type specifier.
pub const SPECIFIER_SIZE: usize = 16;

/// A 16-byte type specifier used for domain separation in hashing and for
/// the on-disk encoding of fund kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Specifier(pub [u8; SPECIFIER_SIZE]);

impl Specifier {
    /// Build a specifier from an ASCII label, zero-padded to 16 bytes.
    pub const fn new(label: &[u8]) -> Self {
        let mut bytes = [0u8; SPECIFIER_SIZE];
        let mut i = 0;
        while i < label.len() {
            bytes[i] = label[i];
            i += 1;
        }
        Specifier(bytes)
    }

    /// The label with trailing zero padding removed.
    pub fn label(&self) -> &[u8] {
        let end = self
            .0
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(SPECIFIER_SIZE);
        &self.0[..end]
    }
}

pub(crate) const SPECIFIER_MINER_PAYOUT: Specifier = Specifier::new(b"miner payout");
pub(crate) const SPECIFIER_MINER_FEE: Specifier = Specifier::new(b"miner fee");
pub(crate) const SPECIFIER_SIACOIN_INPUT: Specifier = Specifier::new(b"siacoin input");
pub(crate) const SPECIFIER_SIACOIN_OUTPUT: Specifier = Specifier::new(b"siacoin output");
pub(crate) const SPECIFIER_SIAFUND_INPUT: Specifier = Specifier::new(b"siafund input");
pub(crate) const SPECIFIER_SIAFUND_OUTPUT: Specifier = Specifier::new(b"siafund output");
pub(crate) const SPECIFIER_CLAIM_OUTPUT: Specifier = Specifier::new(b"claim output");

/// Incremental Blake2b-256 hasher used for all identifier derivation.
pub(crate) struct IdHasher {
    inner: Blake2b<U32>,
}

impl IdHasher {
    pub fn new(specifier: Specifier) -> Self {
        let mut inner = Blake2b::<U32>::new();
        inner.update(specifier.0);
        IdHasher { inner }
    }

    pub fn write(&mut self, bytes: &[u8]) {
        self.inner.update(bytes);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.inner.update(value.to_le_bytes());
    }

    pub fn finalize(self) -> [u8; HASH_SIZE] {
        self.inner.finalize().into()
    }
}

macro_rules! hash_id {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
        pub struct $name(pub [u8; HASH_SIZE]);

        impl $name {
            /// Raw identifier bytes.
            pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
                &self.0
            }

            /// Parse from a 64-character hex string.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let bytes = hex::decode(s)?;
                let array: [u8; HASH_SIZE] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok($name(array))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&hex::encode(self.0))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&hex::encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                $name::from_hex(&s).map_err(de::Error::custom)
            }
        }
    };
}

hash_id!(
    /// The 32-byte commitment to an unlock condition; identifies an
    /// output's owner.
    UnlockHash
);

hash_id!(
    /// Identifier of a siacoin output.
    SiacoinOutputID
);

hash_id!(
    /// Identifier of a siafund output.
    SiafundOutputID
);

hash_id!(
    /// Identifier of an output of either fund kind. Used by buckets that
    /// store values for both siacoin and siafund outputs.
    OutputID
);

hash_id!(
    /// Identifier of a block.
    BlockId
);

hash_id!(
    /// Identifier of a transaction. The synthetic miner-payout transaction
    /// reuses the block id; the two hashing schemes are disjoint in
    /// practice.
    TransactionId
);

impl From<SiacoinOutputID> for OutputID {
    fn from(id: SiacoinOutputID) -> Self {
        OutputID(id.0)
    }
}

impl From<SiafundOutputID> for OutputID {
    fn from(id: SiafundOutputID) -> Self {
        OutputID(id.0)
    }
}

impl From<SiafundOutputID> for SiacoinOutputID {
    /// A siafund claim payout is a siacoin output whose id shares the
    /// claim's derivation space.
    fn from(id: SiafundOutputID) -> Self {
        SiacoinOutputID(id.0)
    }
}

impl From<BlockId> for TransactionId {
    fn from(id: BlockId) -> Self {
        TransactionId(id.0)
    }
}
