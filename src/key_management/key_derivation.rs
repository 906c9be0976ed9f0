//! Deterministic key derivation from wallet seeds.
//!
//! A seed defines an infinite sequence of spendable keys indexed by a
//! 64-bit counter. Derivation is a pure function of `(seed, index)`: the
//! secret key material is a domain-separated Blake2b-256 hash of the seed
//! and the index, fed into the signature scheme to obtain the keypair. The
//! same seed and index always reproduce the same address, which is what
//! makes seed recovery possible.

use blake2::{Blake2b, Digest};
use digest::consts::U32;
use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::data_structures::{PublicKey, UnlockConditions, UnlockHash};

const KEY_DERIVATION_DOMAIN: &[u8] = b"wallet key derivation";

/// Number of bytes in a seed.
pub const SEED_SIZE: usize = 32;

/// The wallet's root secret. All addresses derive from it.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Seed(pub [u8; SEED_SIZE]);

impl Seed {
    /// Generate a fresh random seed.
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; SEED_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Seed(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; SEED_SIZE] {
        &self.0
    }
}

impl std::fmt::Debug for Seed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print seed material.
        f.write_str("Seed(..)")
    }
}

/// Secret half of a spendable keypair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SecretKey(#[serde(with = "crate::data_structures::serde_bytes32")] pub [u8; 32]);

impl SecretKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretKey(..)")
    }
}

/// The material needed to satisfy an unlock condition: the condition set
/// plus one secret key per required signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendableKey {
    pub unlock_conditions: UnlockConditions,
    pub secret_keys: Vec<SecretKey>,
}

impl SpendableKey {
    /// The address this key spends from.
    pub fn unlock_hash(&self) -> UnlockHash {
        self.unlock_conditions.unlock_hash()
    }
}

fn derive_secret(seed: &Seed, index: u64) -> [u8; 32] {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(KEY_DERIVATION_DOMAIN);
    hasher.update(seed.as_bytes());
    hasher.update(index.to_le_bytes());
    hasher.finalize().into()
}

/// Derive the spendable key at `index`.
pub fn generate_key(seed: &Seed, index: u64) -> SpendableKey {
    let mut secret = derive_secret(seed, index);
    let signing_key = SigningKey::from_bytes(&secret);
    let public_key = PublicKey(signing_key.verifying_key().to_bytes());
    let key = SpendableKey {
        unlock_conditions: UnlockConditions::standard(public_key),
        secret_keys: vec![SecretKey(signing_key.to_bytes())],
    };
    secret.zeroize();
    key
}

/// Derive `count` spendable keys starting at `start`.
pub fn generate_keys(seed: &Seed, start: u64, count: u64) -> Vec<SpendableKey> {
    (start..start.saturating_add(count))
        .map(|index| generate_key(seed, index))
        .collect()
}
