//! Encryption-at-rest for seeds and spendable keys.
//!
//! Each encrypted artifact carries its own random [`Uid`]; the cipher key
//! is derived from the passphrase and that uid, so identical passphrases
//! across wallets never produce identical ciphertexts and key reuse cannot
//! be inferred from disk contents. Ciphertexts use XChaCha20Poly1305 with
//! the 24-byte nonce prepended to the ciphertext.
//!
//! Every artifact also stores a verification ciphertext: 32 zero bytes
//! encrypted under the artifact's cipher. Decrypting it and comparing
//! against zeros is how `unlock` distinguishes a wrong passphrase from a
//! corrupt file.

use blake2::{Blake2b, Digest};
use chacha20poly1305::aead::Aead;
use chacha20poly1305::{Key, KeyInit, XChaCha20Poly1305, XNonce};
use digest::consts::U32;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use super::key_derivation::{Seed, SpendableKey, SEED_SIZE};
use crate::errors::{WalletError, WalletResult};

const CIPHER_KEY_DOMAIN: &[u8] = b"wallet encryption key";
const NONCE_SIZE: usize = 24;

/// Length of the verification plaintext.
pub const ENCRYPTION_VERIFICATION_LEN: usize = 32;

/// Per-artifact random identifier mixed into key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Uid(#[serde(with = "crate::data_structures::serde_bytes32")] pub [u8; 32]);

impl Uid {
    pub fn random() -> Self {
        let mut bytes = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Uid(bytes)
    }
}

/// Derive the cipher protecting an artifact with the given uid.
pub fn cipher_for(passphrase: &str, uid: &Uid) -> XChaCha20Poly1305 {
    let mut hasher = Blake2b::<U32>::new();
    hasher.update(CIPHER_KEY_DOMAIN);
    hasher.update(uid.0);
    hasher.update(passphrase.as_bytes());
    let mut key_bytes: [u8; 32] = hasher.finalize().into();
    let cipher = XChaCha20Poly1305::new(Key::from_slice(&key_bytes));
    key_bytes.zeroize();
    cipher
}

/// Encrypt `plaintext`, prepending a fresh random nonce.
pub fn encrypt_bytes(cipher: &XChaCha20Poly1305, plaintext: &[u8]) -> WalletResult<Vec<u8>> {
    let mut nonce = [0u8; NONCE_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut nonce);
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| WalletError::Encryption(e.to_string()))?;
    let mut out = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

/// Decrypt a nonce-prefixed ciphertext produced by [`encrypt_bytes`].
pub fn decrypt_bytes(cipher: &XChaCha20Poly1305, data: &[u8]) -> WalletResult<Vec<u8>> {
    if data.len() < NONCE_SIZE {
        return Err(WalletError::Encryption(
            "ciphertext shorter than nonce".to_string(),
        ));
    }
    let (nonce, ciphertext) = data.split_at(NONCE_SIZE);
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|e| WalletError::Encryption(e.to_string()))
}

/// Produce the verification ciphertext for a cipher: 32 zero bytes
/// encrypted.
pub fn verification_ciphertext(cipher: &XChaCha20Poly1305) -> WalletResult<Vec<u8>> {
    encrypt_bytes(cipher, &[0u8; ENCRYPTION_VERIFICATION_LEN])
}

/// Check a verification ciphertext against a cipher. Any failure to
/// decrypt, or a plaintext other than 32 zero bytes, is reported as
/// [`WalletError::WrongPassword`].
pub fn check_verification(cipher: &XChaCha20Poly1305, ciphertext: &[u8]) -> WalletResult<()> {
    let plaintext = decrypt_bytes(cipher, ciphertext).map_err(|_| WalletError::WrongPassword)?;
    if plaintext != [0u8; ENCRYPTION_VERIFICATION_LEN] {
        return Err(WalletError::WrongPassword);
    }
    Ok(())
}

/// An encrypted seed at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedFile {
    pub uid: Uid,
    #[serde(with = "hex::serde")]
    pub encryption_verification: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub seed: Vec<u8>,
}

impl SeedFile {
    /// Encrypt `seed` under `passphrase` with a fresh uid.
    pub fn new(seed: &Seed, passphrase: &str) -> WalletResult<Self> {
        let uid = Uid::random();
        let cipher = cipher_for(passphrase, &uid);
        Ok(SeedFile {
            uid,
            encryption_verification: verification_ciphertext(&cipher)?,
            seed: encrypt_bytes(&cipher, seed.as_bytes())?,
        })
    }

    /// Verify the passphrase and recover the seed.
    pub fn decrypt(&self, passphrase: &str) -> WalletResult<Seed> {
        let cipher = cipher_for(passphrase, &self.uid);
        check_verification(&cipher, &self.encryption_verification)?;
        let mut plaintext = decrypt_bytes(&cipher, &self.seed)?;
        if plaintext.len() != SEED_SIZE {
            plaintext.zeroize();
            return Err(WalletError::Corruption(
                "seed file plaintext has wrong length".to_string(),
            ));
        }
        let mut bytes = [0u8; SEED_SIZE];
        bytes.copy_from_slice(&plaintext);
        plaintext.zeroize();
        Ok(Seed(bytes))
    }
}

/// An encrypted spendable key at rest, for keys that did not come from a
/// seed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendableKeyFile {
    pub uid: Uid,
    #[serde(with = "hex::serde")]
    pub encryption_verification: Vec<u8>,
    #[serde(with = "hex::serde")]
    pub spendable_key: Vec<u8>,
}

impl SpendableKeyFile {
    /// Encrypt `key` under `passphrase` with a fresh uid.
    pub fn new(key: &SpendableKey, passphrase: &str) -> WalletResult<Self> {
        let uid = Uid::random();
        let cipher = cipher_for(passphrase, &uid);
        let mut plaintext = serde_json::to_vec(key)?;
        let ciphertext = encrypt_bytes(&cipher, &plaintext);
        plaintext.zeroize();
        Ok(SpendableKeyFile {
            uid,
            encryption_verification: verification_ciphertext(&cipher)?,
            spendable_key: ciphertext?,
        })
    }

    /// Verify the passphrase and recover the spendable key.
    pub fn decrypt(&self, passphrase: &str) -> WalletResult<SpendableKey> {
        let cipher = cipher_for(passphrase, &self.uid);
        check_verification(&cipher, &self.encryption_verification)?;
        let mut plaintext = decrypt_bytes(&cipher, &self.spendable_key)?;
        let key = serde_json::from_slice(&plaintext);
        plaintext.zeroize();
        Ok(key?)
    }
}
