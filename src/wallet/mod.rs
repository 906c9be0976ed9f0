//! The wallet: an authoritative, persistent view of wallet-owned outputs
//! and a revertible transaction history, fed by consensus and pool
//! subscriptions.
//!
//! Lifecycle: construction initializes persistence (`Open`); once an
//! encryption key exists the wallet is `Locked` until [`Wallet::unlock`]
//! verifies the passphrase; [`Wallet::close`] drains outstanding
//! operations and runs teardowns. Consensus and pool deliveries are
//! accepted in every state before `Closing` and silently dropped after.

pub mod database;
pub mod update;

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};
use tracing::error;

use crate::common::ThreadGroup;
use crate::config::{ReleaseProfile, WalletConfig};
use crate::data_structures::{
    Currency, ProcessedTransaction, SiacoinOutput, SiafundOutput, TransactionId, UnlockConditions,
    UnlockHash,
};
use crate::errors::{WalletError, WalletResult};
use crate::key_management::{
    check_verification, cipher_for, generate_key, generate_keys, verification_ciphertext, Seed,
    SeedFile, SpendableKey, SpendableKeyFile, Uid,
};
use crate::scanning::{ConsensusSet, SeedScanner};
use crate::storage::{
    load_json, save_json, save_json_sync, WalletDb, DB_FILE, DB_METADATA, SETTINGS_FILE,
    SETTINGS_METADATA,
};

use database::DB_BUCKETS;

/// Observable lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WalletStatus {
    /// Persistence is initialized but no encryption key exists yet.
    Open,
    /// An encryption key exists; spendable keys are not in memory.
    Locked,
    /// Spendable keys are loaded.
    Unlocked,
    /// Shutdown has begun; deliveries are dropped.
    Closing,
}

/// An auxiliary seed the wallet can spend from but no longer derives new
/// addresses with, typically recovered from a backup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuxiliarySeed {
    pub file: SeedFile,
    /// How many addresses had been derived from this seed when it was
    /// archived.
    pub progress: u64,
}

/// The persisted settings payload (`wallet.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct WalletSettings {
    pub uid: Uid,
    /// 32 zero bytes encrypted under the wallet cipher; empty until
    /// [`Wallet::encrypt`] runs.
    #[serde(with = "hex::serde")]
    pub encryption_verification: Vec<u8>,
    pub primary_seed_file: Option<SeedFile>,
    pub primary_seed_progress: u64,
    pub auxiliary_seed_files: Vec<AuxiliarySeed>,
    pub unseeded_keys: Vec<SpendableKeyFile>,
}

impl WalletSettings {
    fn new() -> Self {
        WalletSettings {
            uid: Uid::random(),
            encryption_verification: Vec::new(),
            primary_seed_file: None,
            primary_seed_progress: 0,
            auxiliary_seed_files: Vec::new(),
            unseeded_keys: Vec::new(),
        }
    }

    fn is_encrypted(&self) -> bool {
        !self.encryption_verification.is_empty()
    }
}

/// A spendable key held in memory, tagged with its primary-seed index when
/// it has one.
#[derive(Debug, Clone)]
pub(crate) struct WalletKey {
    pub seed_index: Option<u64>,
    pub key: SpendableKey,
}

/// In-memory wallet state, guarded by one lock: exclusive for change and
/// pool processing, shared for reads.
#[derive(Debug)]
pub(crate) struct WalletState {
    pub keys: HashMap<UnlockHash, WalletKey>,
    pub primary_seed: Option<Seed>,
    pub processed_transactions: Vec<ProcessedTransaction>,
    pub processed_transaction_index: HashMap<TransactionId, usize>,
    pub unconfirmed_processed_transactions: Vec<ProcessedTransaction>,
    pub siafund_pool: Currency,
    pub consensus_height: u64,
    pub unlocked: bool,
}

impl WalletState {
    fn new() -> Self {
        WalletState {
            keys: HashMap::new(),
            primary_seed: None,
            processed_transactions: Vec::new(),
            processed_transaction_index: HashMap::new(),
            unconfirmed_processed_transactions: Vec::new(),
            siafund_pool: Currency::ZERO,
            consensus_height: 0,
            unlocked: false,
        }
    }
}

/// The wallet subsystem.
#[derive(Debug)]
pub struct Wallet {
    pub(crate) state: RwLock<WalletState>,
    pub(crate) db: WalletDb,
    settings: Arc<Mutex<WalletSettings>>,
    persist_dir: PathBuf,
    profile: ReleaseProfile,
    pub(crate) tg: ThreadGroup,
}

impl Wallet {
    /// Initialize wallet persistence under `config.persist_dir`: create
    /// the directory, load or create the settings file, open the database
    /// and its buckets, and register shutdown teardowns.
    pub fn new(config: WalletConfig) -> WalletResult<Wallet> {
        fs::create_dir_all(&config.persist_dir)?;

        let settings_path = config.persist_dir.join(SETTINGS_FILE);
        let settings = if settings_path.exists() {
            load_json(SETTINGS_METADATA, &settings_path)?
        } else {
            let fresh = WalletSettings::new();
            save_json(SETTINGS_METADATA, &fresh, &settings_path)?;
            fresh
        };

        let db = WalletDb::open(DB_METADATA, &config.persist_dir.join(DB_FILE))?;
        for bucket in DB_BUCKETS {
            db.create_bucket_if_not_exists(bucket)?;
        }

        let settings = Arc::new(Mutex::new(settings));
        let tg = ThreadGroup::new();
        {
            // Settings are synced to disk during teardown. The database
            // handle closes when the wallet value drops.
            let settings = Arc::clone(&settings);
            tg.after_stop(move || {
                let guard = match settings.lock() {
                    Ok(guard) => guard,
                    Err(_) => return,
                };
                if let Err(err) = save_json_sync(SETTINGS_METADATA, &*guard, &settings_path) {
                    error!(%err, "failed to sync wallet settings during shutdown");
                }
            });
        }

        Ok(Wallet {
            state: RwLock::new(WalletState::new()),
            db,
            settings,
            persist_dir: config.persist_dir,
            profile: config.profile,
            tg,
        })
    }

    fn settings_guard(&self) -> WalletResult<MutexGuard<'_, WalletSettings>> {
        self.settings
            .lock()
            .map_err(|_| WalletError::Corruption("wallet settings lock poisoned".to_string()))
    }

    fn state_read(&self) -> WalletResult<RwLockReadGuard<'_, WalletState>> {
        self.state
            .read()
            .map_err(|_| WalletError::Corruption("wallet state lock poisoned".to_string()))
    }

    fn state_write(&self) -> WalletResult<RwLockWriteGuard<'_, WalletState>> {
        self.state
            .write()
            .map_err(|_| WalletError::Corruption("wallet state lock poisoned".to_string()))
    }

    fn save_settings(&self, settings: &WalletSettings) -> WalletResult<()> {
        save_json(
            SETTINGS_METADATA,
            settings,
            &self.persist_dir.join(SETTINGS_FILE),
        )
    }

    /// Current lifecycle state.
    pub fn status(&self) -> WalletStatus {
        if self.tg.is_stopped() {
            return WalletStatus::Closing;
        }
        let encrypted = self
            .settings
            .lock()
            .map(|settings| settings.is_encrypted())
            .unwrap_or(false);
        if !encrypted {
            return WalletStatus::Open;
        }
        let unlocked = self
            .state
            .read()
            .map(|state| state.unlocked)
            .unwrap_or(false);
        if unlocked {
            WalletStatus::Unlocked
        } else {
            WalletStatus::Locked
        }
    }

    /// Whether an encryption key has been established.
    pub fn is_encrypted(&self) -> WalletResult<bool> {
        Ok(self.settings_guard()?.is_encrypted())
    }

    /// Whether spendable keys are currently loaded.
    pub fn is_unlocked(&self) -> WalletResult<bool> {
        Ok(self.state_read()?.unlocked)
    }

    /// Establish the wallet's encryption key and primary seed. Returns the
    /// generated seed so the caller can record it offline. The wallet
    /// stays locked until [`Wallet::unlock`].
    pub fn encrypt(&self, passphrase: &str) -> WalletResult<Seed> {
        let _guard = self.tg.add()?;
        let mut settings = self.settings_guard()?;
        if settings.is_encrypted() {
            return Err(WalletError::AlreadyEncrypted);
        }

        let seed = Seed::random();
        let cipher = cipher_for(passphrase, &settings.uid);
        settings.encryption_verification = verification_ciphertext(&cipher)?;
        settings.primary_seed_file = Some(SeedFile::new(&seed, passphrase)?);
        settings.primary_seed_progress = 0;
        self.save_settings(&settings)?;
        Ok(seed)
    }

    /// Recover a wallet from `seed`: scan the blockchain to discover how
    /// many addresses were used, then establish `seed` as the primary seed
    /// with a progress counter covering every used index. The caller
    /// unlocks and resubscribes from the beginning afterwards.
    pub fn init_from_seed(
        &self,
        passphrase: &str,
        seed: Seed,
        consensus_set: &dyn ConsensusSet,
    ) -> WalletResult<()> {
        let _guard = self.tg.add()?;
        if self.settings_guard()?.is_encrypted() {
            return Err(WalletError::AlreadyEncrypted);
        }

        let mut scanner = SeedScanner::new(seed.clone(), self.profile);
        scanner.scan(consensus_set)?;
        let progress = scanner.largest_index_seen() + 1;

        let mut settings = self.settings_guard()?;
        let cipher = cipher_for(passphrase, &settings.uid);
        settings.encryption_verification = verification_ciphertext(&cipher)?;
        settings.primary_seed_file = Some(SeedFile::new(&seed, passphrase)?);
        settings.primary_seed_progress = progress;
        save_json_sync(
            SETTINGS_METADATA,
            &*settings,
            &self.persist_dir.join(SETTINGS_FILE),
        )
    }

    /// Verify `passphrase` and load every spendable key into memory.
    /// A wrong passphrase fails with [`WalletError::WrongPassword`] and
    /// leaves the wallet unchanged.
    pub fn unlock(&self, passphrase: &str) -> WalletResult<()> {
        let _guard = self.tg.add()?;
        let settings = self.settings_guard()?;
        if !settings.is_encrypted() {
            return Err(WalletError::Unsupported("unlock of an unencrypted wallet"));
        }

        let cipher = cipher_for(passphrase, &settings.uid);
        check_verification(&cipher, &settings.encryption_verification)?;

        let mut keys = HashMap::new();
        let mut primary_seed = None;
        if let Some(seed_file) = &settings.primary_seed_file {
            let seed = seed_file.decrypt(passphrase)?;
            for (i, key) in generate_keys(&seed, 0, settings.primary_seed_progress)
                .into_iter()
                .enumerate()
            {
                keys.insert(
                    key.unlock_hash(),
                    WalletKey {
                        seed_index: Some(i as u64),
                        key,
                    },
                );
            }
            primary_seed = Some(seed);
        }
        for auxiliary in &settings.auxiliary_seed_files {
            let seed = auxiliary.file.decrypt(passphrase)?;
            for key in generate_keys(&seed, 0, auxiliary.progress) {
                keys.insert(
                    key.unlock_hash(),
                    WalletKey {
                        seed_index: None,
                        key,
                    },
                );
            }
        }
        for key_file in &settings.unseeded_keys {
            let key = key_file.decrypt(passphrase)?;
            keys.insert(
                key.unlock_hash(),
                WalletKey {
                    seed_index: None,
                    key,
                },
            );
        }
        drop(settings);

        let mut state = self.state_write()?;
        state.keys = keys;
        state.primary_seed = primary_seed;
        state.unlocked = true;
        Ok(())
    }

    /// Drop all key material from memory.
    pub fn lock(&self) -> WalletResult<()> {
        let _guard = self.tg.add()?;
        let mut state = self.state_write()?;
        state.keys.clear();
        state.primary_seed = None;
        state.unlocked = false;
        Ok(())
    }

    /// Derive the next primary-seed address, advance the progress counter,
    /// and persist it.
    pub fn next_address(&self) -> WalletResult<UnlockConditions> {
        let _guard = self.tg.add()?;
        let mut state = self.state_write()?;
        if !state.unlocked {
            return Err(WalletError::Locked);
        }
        let seed = state.primary_seed.clone().ok_or(WalletError::Locked)?;

        let mut settings = self.settings_guard()?;
        let index = settings.primary_seed_progress;
        let key = generate_key(&seed, index);
        let conditions = key.unlock_conditions.clone();
        state.keys.insert(
            key.unlock_hash(),
            WalletKey {
                seed_index: Some(index),
                key,
            },
        );
        settings.primary_seed_progress = index + 1;
        self.save_settings(&settings)?;
        Ok(conditions)
    }

    /// Record an externally supplied encrypted spendable key. The key
    /// joins the in-memory map at the next unlock.
    pub fn add_unseeded_key(&self, key_file: SpendableKeyFile) -> WalletResult<()> {
        let _guard = self.tg.add()?;
        let mut settings = self.settings_guard()?;
        settings.unseeded_keys.push(key_file);
        self.save_settings(&settings)
    }

    /// The primary-seed index of `address`, when it was derived from the
    /// primary seed.
    pub fn lookup(&self, address: &UnlockHash) -> WalletResult<Option<u64>> {
        let state = self.state_read()?;
        Ok(state.keys.get(address).and_then(|key| key.seed_index))
    }

    /// Whether `address` belongs to this wallet.
    pub fn is_wallet_address(&self, address: &UnlockHash) -> WalletResult<bool> {
        Ok(self.state_read()?.keys.contains_key(address))
    }

    /// The spendable key for `address`, for handing to a signer. Requires
    /// an unlocked wallet.
    pub fn spendable_key(&self, address: &UnlockHash) -> WalletResult<Option<SpendableKey>> {
        let state = self.state_read()?;
        if !state.unlocked {
            return Err(WalletError::Locked);
        }
        Ok(state.keys.get(address).map(|entry| entry.key.clone()))
    }

    /// Height of the wallet's view of consensus.
    pub fn consensus_height(&self) -> WalletResult<u64> {
        Ok(self.state_read()?.consensus_height)
    }

    /// The siafund pool as of the last processed change.
    pub fn siafund_pool(&self) -> WalletResult<Currency> {
        Ok(self.state_read()?.siafund_pool)
    }

    /// The chronological confirmed history.
    pub fn processed_transactions(&self) -> WalletResult<Vec<ProcessedTransaction>> {
        Ok(self.state_read()?.processed_transactions.clone())
    }

    /// The current unconfirmed view.
    pub fn unconfirmed_transactions(&self) -> WalletResult<Vec<ProcessedTransaction>> {
        Ok(self
            .state_read()?
            .unconfirmed_processed_transactions
            .clone())
    }

    /// Fetch one processed transaction by id. The index always resolves to
    /// the most recent entry for the id.
    pub fn transaction(&self, id: TransactionId) -> WalletResult<Option<ProcessedTransaction>> {
        let state = self.state_read()?;
        Ok(state
            .processed_transaction_index
            .get(&id)
            .and_then(|&position| state.processed_transactions.get(position))
            .cloned())
    }

    /// Sum of all confirmed siacoin outputs owned by the wallet.
    pub fn confirmed_siacoin_balance(&self) -> WalletResult<Currency> {
        let _guard = self.tg.add()?;
        let mut balance = Currency::ZERO;
        for (_, value) in self.db.bucket_dump(database::BUCKET_SIACOIN_OUTPUTS)? {
            let output: SiacoinOutput = serde_json::from_slice(&value)?;
            balance = balance
                .checked_add(output.value)
                .ok_or_else(|| WalletError::Corruption("siacoin balance overflow".to_string()))?;
        }
        Ok(balance)
    }

    /// Sum of all confirmed siafund outputs owned by the wallet.
    pub fn confirmed_siafund_balance(&self) -> WalletResult<Currency> {
        let _guard = self.tg.add()?;
        let mut balance = Currency::ZERO;
        for (_, value) in self.db.bucket_dump(database::BUCKET_SIAFUND_OUTPUTS)? {
            let output: SiafundOutput = serde_json::from_slice(&value)?;
            balance = balance
                .checked_add(output.value)
                .ok_or_else(|| WalletError::Corruption("siafund balance overflow".to_string()))?;
        }
        Ok(balance)
    }

    /// Every `(key, value)` pair of a database bucket, ordered by key.
    /// Supports byte-level state comparison in tests and backup tooling;
    /// bucket names are the constants in [`database`].
    pub fn bucket_dump(&self, bucket: &str) -> WalletResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.db.bucket_dump(bucket)
    }

    /// Write a synced copy of the settings file to `backup_path`.
    pub fn create_backup(&self, backup_path: &Path) -> WalletResult<()> {
        let _guard = self.tg.add()?;
        let settings = self.settings_guard()?;
        save_json_sync(SETTINGS_METADATA, &*settings, backup_path)
    }

    /// Merge a backup's seeds into this wallet. Not yet supported: the
    /// re-encryption semantics for auxiliary seeds are unresolved.
    pub fn load_backup(&self, _backup_path: &Path) -> WalletResult<()> {
        let _guard = self.tg.add()?;
        Err(WalletError::Unsupported("load_backup"))
    }

    /// Shut down: reject new operations, wait for in-flight ones, sync
    /// settings. The database closes when the wallet value drops.
    pub fn close(&self) -> WalletResult<()> {
        self.tg.stop()
    }
}
