// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Alias store management.
//!
//! Branch-alias remembers every alias it has ever resolved inside of the
//! __alias store__. The alias store maps the root path of each repository to
//! a map of normalized branch names to alias text. Next to the aliases live
//! two bits of view state: which repositories are expanded, and whether
//! remote branches are shown.
//!
//! # Persistence
//!
//! State is loaded once through a [`StateBackend`], mutated in memory, and
//! flushed back explicitly. Nothing is saved behind the caller's back. The
//! alias map is flushed with [`AliasStore::save_cache`], while the view state
//! has its own save methods with their own keys.
//!
//! # State Layout
//!
//! | key              | shape                                      |
//! |------------------|--------------------------------------------|
//! | `aliases`        | repository path -> (branch name -> alias)  |
//! | `expanded_repos` | list of repository paths                   |
//! | `show_remote`    | boolean                                    |

pub mod backend;

pub use backend::{MemoryBackend, StateBackend, StoreError, TomlFileBackend};

use serde::de::DeserializeOwned;
use std::{
    collections::{BTreeMap, BTreeSet},
    path::{Path, PathBuf},
};
use toml::Value;
use tracing::{debug, instrument, warn};

const CACHE_KEY: &str = "aliases";
const EXPANDED_REPOS_KEY: &str = "expanded_repos";
const REMOTE_STATE_KEY: &str = "show_remote";

/// Normalized branch name to alias text of one repository.
pub type AliasMap = BTreeMap<String, String>;

/// Repository root path to alias map.
pub type RepositoryAliasMap = BTreeMap<PathBuf, AliasMap>;

/// In-memory alias state with explicit persistence.
#[derive(Debug)]
pub struct AliasStore<B = TomlFileBackend>
where
    B: StateBackend,
{
    backend: B,
    aliases: RepositoryAliasMap,
    expanded: BTreeSet<PathBuf>,
    show_remote: bool,
}

impl<B> AliasStore<B>
where
    B: StateBackend,
{
    /// Load alias store from backend.
    ///
    /// Missing entries start out empty. An entry whose shape does not match
    /// is discarded with a warning, and starts out empty as well.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if backend cannot be read.
    #[instrument(skip(backend), level = "debug")]
    pub async fn load(backend: B) -> Result<Self> {
        let aliases: RepositoryAliasMap = load_entry(&backend, CACHE_KEY).await?;
        let expanded: BTreeSet<PathBuf> = load_entry(&backend, EXPANDED_REPOS_KEY).await?;
        let show_remote: bool = load_entry(&backend, REMOTE_STATE_KEY).await?;
        debug!(
            "loaded aliases for {} repositories, {} expanded",
            aliases.len(),
            expanded.len()
        );

        Ok(Self {
            backend,
            aliases,
            expanded,
            show_remote,
        })
    }

    /// Aliases recorded for repository.
    ///
    /// Returns a copy. Changes must go back through [`AliasStore::set_aliases`].
    pub fn get_aliases(&self, repo_path: impl AsRef<Path>) -> AliasMap {
        self.aliases
            .get(repo_path.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Replace entire alias map of repository.
    pub fn set_aliases(&mut self, repo_path: impl Into<PathBuf>, aliases: AliasMap) {
        self.aliases.insert(repo_path.into(), aliases);
    }

    /// Forget every alias of every repository.
    pub fn clear_aliases(&mut self) {
        self.aliases.clear();
    }

    /// View of every repository's aliases.
    pub fn all_aliases(&self) -> &RepositoryAliasMap {
        &self.aliases
    }

    /// Flush alias map to backend.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if backend refuses the write. Every change
    ///   since the last successful save is then only held in memory.
    #[instrument(skip(self), level = "debug")]
    pub async fn save_cache(&self) -> Result<()> {
        self.backend
            .update(CACHE_KEY, Value::try_from(&self.aliases)?)
            .await
    }

    /// Check if repository is expanded in listings.
    pub fn is_repository_expanded(&self, repo_path: impl AsRef<Path>) -> bool {
        self.expanded.contains(repo_path.as_ref())
    }

    /// Flip expansion state of repository.
    ///
    /// Returns new expansion state.
    pub fn toggle_repository(&mut self, repo_path: impl Into<PathBuf>) -> bool {
        let repo_path = repo_path.into();
        if self.expanded.remove(&repo_path) {
            false
        } else {
            self.expanded.insert(repo_path);
            true
        }
    }

    /// Every expanded repository.
    pub fn expanded_repos(&self) -> &BTreeSet<PathBuf> {
        &self.expanded
    }

    /// Flush expanded repository set to backend.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if backend refuses the write.
    pub async fn save_expanded_repos(&self) -> Result<()> {
        self.backend
            .update(EXPANDED_REPOS_KEY, Value::try_from(&self.expanded)?)
            .await
    }

    /// Check if remote branches should be listed.
    pub fn show_remote_branches(&self) -> bool {
        self.show_remote
    }

    pub fn set_show_remote_branches(&mut self, value: bool) {
        self.show_remote = value;
    }

    /// Flush remote visibility flag to backend.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if backend refuses the write.
    pub async fn save_remote_state(&self) -> Result<()> {
        self.backend
            .update(REMOTE_STATE_KEY, Value::Boolean(self.show_remote))
            .await
    }

    /// Backend that state is persisted to.
    pub fn backend(&self) -> &B {
        &self.backend
    }
}

async fn load_entry<T>(backend: &impl StateBackend, key: &str) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    let Some(value) = backend.get(key).await? else {
        return Ok(T::default());
    };

    match value.try_into() {
        Ok(entry) => Ok(entry),
        Err(error) => {
            warn!("discard malformed state entry {key:?}: {error}");
            Ok(T::default())
        }
    }
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
