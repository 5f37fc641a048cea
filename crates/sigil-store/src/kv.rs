//! # Key/Value Storage Contract
//!
//! The durable store the rest of the workspace writes through: string
//! keys, JSON-document values, synchronous reads and writes. Atomicity
//! is per key — one write either lands fully or not at all; there is no
//! cross-key transaction.
//!
//! Keys must match `^[a-z0-9][a-z0-9._-]*$` (max 64 chars), so a key is
//! always usable verbatim as a file name.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use dashmap::DashMap;
use thiserror::Error;

/// Persistence read/write failures. Always surfaced to the caller;
/// nothing in the workspace retries or swallows these.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Underlying I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The key does not satisfy the storage key grammar.
    #[error("invalid storage key {0:?}: must match ^[a-z0-9][a-z0-9._-]*$ (max 64 chars)")]
    InvalidKey(String),
}

/// Validate a storage key.
fn validate_key(key: &str) -> Result<(), StorageError> {
    if key.is_empty() || key.len() > 64 {
        return Err(StorageError::InvalidKey(key.to_string()));
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() || c.is_ascii_digit() => {}
        _ => return Err(StorageError::InvalidKey(key.to_string())),
    }
    for c in chars {
        if !(c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.' || c == '_' || c == '-') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
    }
    Ok(())
}

/// Synchronous durable key/value store holding JSON documents.
pub trait KeyValueStore {
    /// Read the document at `key`, `None` if absent.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write the document at `key`, replacing any previous value.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Remove the document at `key`. Removing an absent key is a no-op.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// In-memory store. Used by tests and as a scratch session store.
#[derive(Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        validate_key(key)?;
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        validate_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

/// One JSON file per key under a base directory: `{base_dir}/{key}.json`.
pub struct JsonFileStore {
    base_dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `base_dir`, creating the directory if needed.
    pub fn open(base_dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir)?;
        Ok(Self { base_dir })
    }

    /// The directory this store writes into.
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.base_dir.join(format!("{key}.json")))
    }
}

impl KeyValueStore for JsonFileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        // Write to a sibling temp file, then rename: the rename is the
        // atomic step, so a crash mid-write never leaves a torn document
        // at the real key.
        let tmp = self.base_dir.join(format!("{key}.json.tmp"));
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}
