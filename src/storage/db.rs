//! Bucketed key-value store over an embedded sqlite database.
//!
//! The wallet persists its confirmed-output view in named buckets. A bucket
//! is a flat byte-key to byte-value map; all mutations for one consensus
//! change happen inside a single write transaction so a crash never leaves
//! a change half-applied. Bucket values are serde_json documents; keys are
//! the raw identifier bytes.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use super::settings::Metadata;
use crate::errors::{WalletError, WalletResult};

/// An embedded bucketed store bound to one database file.
#[derive(Debug)]
pub struct WalletDb {
    conn: Mutex<Connection>,
    metadata: Metadata,
}

impl WalletDb {
    /// Open (or create) the database at `path`. Fails with
    /// [`WalletError::WrongHeader`] / [`WalletError::WrongVersion`] when
    /// the file was written by an incompatible build.
    pub fn open(metadata: Metadata, path: &Path) -> WalletResult<Self> {
        let conn = Connection::open(path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        Self::init(conn, metadata)
    }

    /// Open a throwaway in-memory store. Test support.
    pub fn open_in_memory(metadata: Metadata) -> WalletResult<Self> {
        Self::init(Connection::open_in_memory()?, metadata)
    }

    fn init(conn: Connection, metadata: Metadata) -> WalletResult<Self> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS wallet_metadata (
                id INTEGER PRIMARY KEY CHECK (id = 0),
                header TEXT NOT NULL,
                version TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS bucket_registry (
                name TEXT PRIMARY KEY
            );
            CREATE TABLE IF NOT EXISTS bucket_entries (
                bucket TEXT NOT NULL,
                key BLOB NOT NULL,
                value BLOB NOT NULL,
                PRIMARY KEY (bucket, key)
            );
            "#,
        )?;

        let stored: Option<(String, String)> = conn
            .query_row(
                "SELECT header, version FROM wallet_metadata WHERE id = 0",
                [],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match stored {
            Some((header, _)) if header != metadata.header => {
                return Err(WalletError::WrongHeader {
                    expected: metadata.header.to_string(),
                    found: header,
                });
            }
            Some((_, version)) if version != metadata.version => {
                return Err(WalletError::WrongVersion {
                    expected: metadata.version.to_string(),
                    found: version,
                });
            }
            Some(_) => {}
            None => {
                conn.execute(
                    "INSERT INTO wallet_metadata (id, header, version) VALUES (0, ?1, ?2)",
                    params![metadata.header, metadata.version],
                )?;
            }
        }

        Ok(WalletDb {
            conn: Mutex::new(conn),
            metadata,
        })
    }

    /// The compiled-in metadata this store was opened with.
    pub fn metadata(&self) -> Metadata {
        self.metadata
    }

    fn lock(&self) -> WalletResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| WalletError::Corruption("database lock poisoned".to_string()))
    }

    /// Register a bucket. Idempotent.
    pub fn create_bucket_if_not_exists(&self, bucket: &str) -> WalletResult<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO bucket_registry (name) VALUES (?1)",
            params![bucket],
        )?;
        Ok(())
    }

    /// Run `f` inside a writable transaction. Writes become durable
    /// atomically when `f` returns `Ok`; on `Err` every buffered write is
    /// rolled back and the error is returned unchanged.
    pub fn update<T, F>(&self, f: F) -> WalletResult<T>
    where
        F: FnOnce(&DbTx<'_>) -> WalletResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let handle = DbTx { tx, writable: true };
        match f(&handle) {
            Ok(value) => {
                handle.tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                // Dropping the transaction rolls it back.
                Err(err)
            }
        }
    }

    /// Run `f` inside a read-only transaction with snapshot semantics.
    pub fn view<T, F>(&self, f: F) -> WalletResult<T>
    where
        F: FnOnce(&DbTx<'_>) -> WalletResult<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Deferred)?;
        let handle = DbTx {
            tx,
            writable: false,
        };
        f(&handle)
    }

    /// Every `(key, value)` pair of a bucket, ordered by key. Used to
    /// compare on-disk state byte for byte.
    pub fn bucket_dump(&self, bucket: &str) -> WalletResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.view(|tx| tx.dump(bucket))
    }
}

/// Handle to an open transaction. Reads are snapshot reads; writes are
/// buffered until the enclosing [`WalletDb::update`] commits.
pub struct DbTx<'conn> {
    tx: rusqlite::Transaction<'conn>,
    writable: bool,
}

impl DbTx<'_> {
    fn check_bucket(&self, bucket: &str) -> WalletResult<()> {
        let known: Option<String> = self
            .tx
            .query_row(
                "SELECT name FROM bucket_registry WHERE name = ?1",
                params![bucket],
                |row| row.get(0),
            )
            .optional()?;
        if known.is_none() {
            return Err(WalletError::Corruption(format!(
                "bucket {bucket:?} does not exist"
            )));
        }
        Ok(())
    }

    fn check_writable(&self) -> WalletResult<()> {
        if !self.writable {
            return Err(WalletError::Unsupported(
                "write inside read-only transaction",
            ));
        }
        Ok(())
    }

    /// Insert or replace `key` in `bucket`.
    pub fn put(&self, bucket: &str, key: &[u8], value: &[u8]) -> WalletResult<()> {
        self.check_writable()?;
        self.check_bucket(bucket)?;
        self.tx.execute(
            "INSERT OR REPLACE INTO bucket_entries (bucket, key, value) VALUES (?1, ?2, ?3)",
            params![bucket, key, value],
        )?;
        Ok(())
    }

    /// Fetch `key` from `bucket`, or `None` when absent.
    pub fn get(&self, bucket: &str, key: &[u8]) -> WalletResult<Option<Vec<u8>>> {
        self.check_bucket(bucket)?;
        let value = self
            .tx
            .query_row(
                "SELECT value FROM bucket_entries WHERE bucket = ?1 AND key = ?2",
                params![bucket, key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    /// Remove `key` from `bucket`. Removing an absent key is not an error.
    pub fn delete(&self, bucket: &str, key: &[u8]) -> WalletResult<()> {
        self.check_writable()?;
        self.check_bucket(bucket)?;
        self.tx.execute(
            "DELETE FROM bucket_entries WHERE bucket = ?1 AND key = ?2",
            params![bucket, key],
        )?;
        Ok(())
    }

    fn dump(&self, bucket: &str) -> WalletResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.check_bucket(bucket)?;
        let mut stmt = self.tx.prepare(
            "SELECT key, value FROM bucket_entries WHERE bucket = ?1 ORDER BY key",
        )?;
        let rows = stmt.query_map(params![bucket], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(row?);
        }
        Ok(entries)
    }
}
