//! Seed handling: deterministic key derivation and encryption at rest.

pub mod encryption;
pub mod key_derivation;

pub use encryption::{
    check_verification, cipher_for, decrypt_bytes, encrypt_bytes, verification_ciphertext,
    SeedFile, SpendableKeyFile, Uid, ENCRYPTION_VERIFICATION_LEN,
};
pub use key_derivation::{generate_key, generate_keys, SecretKey, Seed, SpendableKey, SEED_SIZE};
