// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Persisted key-value storage.
//!
//! The alias store does not care where its state lives. It only needs a
//! place that can hand back a value by key, and replace a value by key as
//! one complete operation. This module provides that place on disk through a
//! TOML file, and in memory for tests.

use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
};
use toml::{Table, Value};
use tracing::{debug, instrument};

/// Layer of indirection for persisted state.
#[async_trait]
pub trait StateBackend: Send + Sync {
    /// Fetch value stored under key, if any.
    async fn get(&self, key: &str) -> Result<Option<Value>>;

    /// Replace value stored under key.
    ///
    /// Either the whole value lands or nothing does.
    async fn update(&self, key: &str, value: Value) -> Result<()>;
}

/// State kept in a single TOML file.
///
/// Each top-level key of the file is one entry. Updates rewrite the file
/// through a temporary sibling that is renamed over the original, so readers
/// never observe a half-written file.
#[derive(Debug, Clone)]
pub struct TomlFileBackend {
    path: PathBuf,
}

impl TomlFileBackend {
    /// Construct new file backend at target path.
    ///
    /// File and parent directories are created lazily on first update.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of backing state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_table(&self) -> Result<Table> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => {
                toml::from_str::<Table>(&content).map_err(|source| StoreError::Deserialize {
                    source,
                    path: self.path.clone(),
                })
            }
            Err(error) if error.kind() == ErrorKind::NotFound => Ok(Table::new()),
            Err(error) => Err(StoreError::Io {
                source: error,
                path: self.path.clone(),
            }),
        }
    }
}

#[async_trait]
impl StateBackend for TomlFileBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.read_table().await?.remove(key))
    }

    #[instrument(skip(self, value), level = "debug")]
    async fn update(&self, key: &str, value: Value) -> Result<()> {
        let mut table = self.read_table().await?;
        table.insert(key.to_string(), value);
        let content = toml::to_string(&table)?;

        if let Some(parent) = self.path.parent() {
            mkdirp::mkdirp(parent).map_err(|source| StoreError::Io {
                source,
                path: parent.to_path_buf(),
            })?;
        }

        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        tokio::fs::write(&staging, content)
            .await
            .map_err(|source| StoreError::Io {
                source,
                path: staging.clone(),
            })?;
        tokio::fs::rename(&staging, &self.path)
            .await
            .map_err(|source| StoreError::Io {
                source,
                path: self.path.clone(),
            })?;
        debug!("wrote {key:?} to {:?}", self.path.display());

        Ok(())
    }
}

/// State kept in memory.
///
/// Counts writes, and can be told to reject them, so tests can observe how
/// often state gets flushed and what happens when flushing breaks.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    table: Mutex<Table>,
    writes: AtomicUsize,
    reject_writes: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Construct memory backend seeded with existing entries.
    pub fn with_table(table: Table) -> Self {
        Self {
            table: Mutex::new(table),
            ..Default::default()
        }
    }

    /// Number of successful updates so far.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make every following update fail.
    pub fn reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Snapshot of stored entries.
    pub fn snapshot(&self) -> Table {
        self.table
            .lock()
            .map(|table| table.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl StateBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let table = self.table.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(table.get(key).cloned())
    }

    async fn update(&self, key: &str, value: Value) -> Result<()> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Rejected { key: key.into() });
        }

        let mut table = self.table.lock().map_err(|_| StoreError::Poisoned)?;
        table.insert(key.into(), value);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(())
    }
}

/// All possible error types for persisted state.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// State file cannot be read or written.
    #[error("failed to access state file at {:?}", path.display())]
    Io {
        #[source]
        source: std::io::Error,
        path: PathBuf,
    },

    /// State file is not valid TOML.
    #[error("failed to parse state file at {:?}", path.display())]
    Deserialize {
        #[source]
        source: toml::de::Error,
        path: PathBuf,
    },

    /// State cannot be serialized.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Backend refused to store entry.
    #[error("state backend rejected write of {key:?}")]
    Rejected { key: String },

    /// In-memory state lock was poisoned.
    #[error("state lock poisoned")]
    Poisoned,
}

/// Friendly result alias :3
pub type Result<T, E = StoreError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn file_backend_replaces_entries_by_key() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let backend = TomlFileBackend::new(dir.path().join("nested").join("state.toml"));

        assert_eq!(backend.get("show_remote").await?, None);

        backend.update("show_remote", Value::Boolean(true)).await?;
        backend
            .update("expanded_repos", Value::Array(vec!["/repo".into()]))
            .await?;
        backend.update("show_remote", Value::Boolean(false)).await?;

        assert_eq!(backend.get("show_remote").await?, Some(Value::Boolean(false)));
        assert_eq!(
            backend.get("expanded_repos").await?,
            Some(Value::Array(vec!["/repo".into()]))
        );
        assert!(!dir.path().join("nested").join("state.toml.tmp").exists());

        Ok(())
    }

    #[tokio::test]
    async fn file_backend_rejects_corrupt_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("state.toml");
        std::fs::write(&path, "this is = = not toml")?;
        let backend = TomlFileBackend::new(&path);

        assert!(matches!(
            backend.get("aliases").await,
            Err(StoreError::Deserialize { .. })
        ));

        Ok(())
    }

    #[tokio::test]
    async fn memory_backend_counts_and_rejects_writes() -> anyhow::Result<()> {
        let backend = MemoryBackend::new();
        backend.update("a", Value::Integer(1)).await?;
        assert_eq!(backend.writes(), 1);

        backend.reject_writes(true);
        assert!(backend.update("a", Value::Integer(2)).await.is_err());
        assert_eq!(backend.writes(), 1);
        assert_eq!(backend.get("a").await?, Some(Value::Integer(1)));

        Ok(())
    }
}
