//! Metadata-versioned JSON persistence files.
//!
//! Every file the wallet writes outside the database carries a header and
//! version so that a build refuses to load state written by an
//! incompatible build. The payload is wrapped as
//! `{"header": ..., "version": ..., "data": ...}`.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, Write};
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::errors::{WalletError, WalletResult};

/// Compiled-in identity of a persistence file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Metadata {
    pub header: &'static str,
    pub version: &'static str,
}

/// Metadata of the wallet settings file.
pub const SETTINGS_METADATA: Metadata = Metadata {
    header: "Wallet Settings",
    version: "0.4.0",
};

/// Metadata of seed files embedded in the settings payload.
pub const SEED_METADATA: Metadata = Metadata {
    header: "Wallet Seed",
    version: "0.4.0",
};

/// Metadata of the wallet database.
pub const DB_METADATA: Metadata = Metadata {
    header: "Wallet Database",
    version: "1.1.0",
};

#[derive(Serialize, Deserialize)]
struct PersistFile {
    header: String,
    version: String,
    data: serde_json::Value,
}

/// Load a metadata-checked JSON file. Fails with
/// [`WalletError::WrongHeader`] or [`WalletError::WrongVersion`] before any
/// payload field is interpreted.
pub fn load_json<T: DeserializeOwned>(metadata: Metadata, path: &Path) -> WalletResult<T> {
    let file = File::open(path)?;
    let wrapper: PersistFile = serde_json::from_reader(BufReader::new(file))?;
    if wrapper.header != metadata.header {
        return Err(WalletError::WrongHeader {
            expected: metadata.header.to_string(),
            found: wrapper.header,
        });
    }
    if wrapper.version != metadata.version {
        return Err(WalletError::WrongVersion {
            expected: metadata.version.to_string(),
            found: wrapper.version,
        });
    }
    Ok(serde_json::from_value(wrapper.data)?)
}

fn write_json<T: Serialize>(metadata: Metadata, payload: &T, path: &Path) -> WalletResult<File> {
    let wrapper = PersistFile {
        header: metadata.header.to_string(),
        version: metadata.version.to_string(),
        data: serde_json::to_value(payload)?,
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    serde_json::to_writer_pretty(&mut file, &wrapper)?;
    file.write_all(b"\n")?;
    Ok(file)
}

/// Write a metadata-wrapped JSON file, replacing any existing file.
pub fn save_json<T: Serialize>(metadata: Metadata, payload: &T, path: &Path) -> WalletResult<()> {
    write_json(metadata, payload, path)?;
    Ok(())
}

/// Write a metadata-wrapped JSON file and fsync it before returning. Used
/// for backups and for the settings sync during shutdown.
pub fn save_json_sync<T: Serialize>(
    metadata: Metadata,
    payload: &T,
    path: &Path,
) -> WalletResult<()> {
    let file = write_json(metadata, payload, path)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Payload {
        name: String,
        progress: u64,
    }

    fn sample() -> Payload {
        Payload {
            name: "primary".to_string(),
            progress: 410,
        }
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        save_json(SETTINGS_METADATA, &sample(), &path).unwrap();
        let loaded: Payload = load_json(SETTINGS_METADATA, &path).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_save_sync_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        save_json_sync(SETTINGS_METADATA, &sample(), &path).unwrap();
        let loaded: Payload = load_json(SETTINGS_METADATA, &path).unwrap();
        assert_eq!(loaded, sample());
    }

    #[test]
    fn test_wrong_header_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        save_json(SEED_METADATA, &sample(), &path).unwrap();
        let err = load_json::<Payload>(SETTINGS_METADATA, &path).unwrap_err();
        assert!(matches!(err, WalletError::WrongHeader { .. }));
    }

    #[test]
    fn test_wrong_version_detected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let old = Metadata {
            header: "Wallet Settings",
            version: "0.3.3",
        };
        save_json(old, &sample(), &path).unwrap();
        let err = load_json::<Payload>(SETTINGS_METADATA, &path).unwrap_err();
        assert!(matches!(err, WalletError::WrongVersion { .. }));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_json::<Payload>(SETTINGS_METADATA, &dir.path().join("absent.json"))
            .unwrap_err();
        assert!(matches!(err, WalletError::Io(_)));
    }
}
