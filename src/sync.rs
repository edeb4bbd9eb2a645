// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Alias synchronization.
//!
//! The sync engine keeps the alias store in step with the live branches of
//! every repository and with Jira. It offers two passes:
//!
//! 1. __Incremental sync__ ([`SyncEngine::check_and_sync_missing_aliases`])
//!    only looks at local branches that have an issue key but no alias yet.
//!    Existing aliases are never touched. Nothing is reported when there is
//!    nothing to do, so it can run on every repository change.
//! 2. __Full sync__ ([`SyncEngine::sync_with_jira`]) rebuilds the alias map
//!    of every repository from scratch. Aliases of branches that no longer
//!    exist, or whose issue no longer resolves, are dropped.
//!
//! Both passes batch every issue key into a single Jira lookup, flush the
//! alias store before reporting success, and never let an error escape.
//! Failures are reported as a failed [`SyncResult`] instead.
//!
//! # Failure Semantics
//!
//! A full sync builds every new alias map before replacing any of them, so
//! a failure halfway through leaves the previous maps intact. An incremental
//! sync applies its additions repository by repository, and does not roll
//! them back if a later step fails.

use crate::{
    event::{Publisher, Subscription},
    extract::normalize_branch_name,
    git::{BranchRef, BranchSource, Git2BranchSource, GitError, RepoHandle},
    jira::{JiraService, JiraTransport, ReqwestTransport},
    notify::Notifier,
    store::{AliasMap, AliasStore, RepositoryAliasMap, StateBackend, StoreError, TomlFileBackend},
};

use std::{
    collections::{BTreeMap, BTreeSet},
    sync::Arc,
};
use tracing::{debug, error, info, instrument};

/// Which pass produced a sync result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncKind {
    Incremental,
    Full,
}

/// Outcome of one sync pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    pub kind: SyncKind,
    pub success: bool,

    /// Number of distinct issue keys looked up.
    pub synced_count: usize,
    pub errors: Vec<String>,

    /// Aliases written by this pass, per repository.
    pub new_aliases: RepositoryAliasMap,
}

impl SyncResult {
    fn success(kind: SyncKind, synced_count: usize, new_aliases: RepositoryAliasMap) -> Self {
        Self {
            kind,
            success: true,
            synced_count,
            errors: Vec::new(),
            new_aliases,
        }
    }

    fn failure(kind: SyncKind, error: &SyncError) -> Self {
        Self {
            kind,
            success: false,
            synced_count: 0,
            errors: vec![error.to_string()],
            new_aliases: RepositoryAliasMap::new(),
        }
    }
}

/// Orchestrates branch enumeration, Jira lookups, and alias store updates.
pub struct SyncEngine<S = Git2BranchSource, T = ReqwestTransport, B = TomlFileBackend>
where
    S: BranchSource,
    T: JiraTransport,
    B: StateBackend,
{
    source: S,
    tracker: JiraService<T>,
    store: AliasStore<B>,
    notifier: Arc<dyn Notifier>,
    on_did_sync: Publisher<SyncResult>,
}

impl<S, T, B> SyncEngine<S, T, B>
where
    S: BranchSource,
    T: JiraTransport,
    B: StateBackend,
{
    /// Construct new sync engine.
    pub fn new(
        source: S,
        tracker: JiraService<T>,
        store: AliasStore<B>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            source,
            tracker,
            store,
            notifier,
            on_did_sync: Publisher::new(),
        }
    }

    /// Register listener for results of sync passes.
    pub fn on_did_sync(
        &mut self,
        listener: impl Fn(&SyncResult) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_sync.subscribe(listener)
    }

    /// Remove sync result listener.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.on_did_sync.unsubscribe(subscription)
    }

    /// Resolve aliases for local branches that do not have one yet.
    ///
    /// Returns the result that was reported to listeners, or none if there
    /// was nothing to sync.
    #[instrument(skip(self), level = "debug")]
    pub async fn check_and_sync_missing_aliases(&mut self) -> Option<SyncResult> {
        let result = match self.try_check_and_sync().await {
            Ok(Some(result)) => result,
            Ok(None) => return None,
            Err(error) => {
                error!("error occurred while checking and syncing missing aliases: {error}");
                SyncResult::failure(SyncKind::Incremental, &error)
            }
        };

        self.on_did_sync.fire(&result);
        Some(result)
    }

    /// Rebuild alias map of every repository.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync_with_jira(&mut self) -> SyncResult {
        let result = match self.try_sync_with_jira().await {
            Ok(result) => result,
            Err(error) => {
                error!("error occurred while syncing with JIRA: {error}");
                SyncResult::failure(SyncKind::Full, &error)
            }
        };

        self.on_did_sync.fire(&result);
        result
    }

    /// Rebuild alias map of one repository.
    ///
    /// Does not flush the alias store, and does not notify listeners. Returns
    /// an empty map on failure.
    #[instrument(skip(self), level = "debug")]
    pub async fn sync_repository(&mut self, repo: &RepoHandle) -> AliasMap {
        match self.try_sync_repository(repo).await {
            Ok(aliases) => aliases,
            Err(error) => {
                error!(
                    "error occurred while syncing repository {:?}: {error}",
                    repo.root().display()
                );
                AliasMap::new()
            }
        }
    }

    async fn try_check_and_sync(&mut self) -> Result<Option<SyncResult>> {
        let mut pending = BTreeSet::new();
        for repo in self.source.repositories() {
            let branches = self.source.active_branches(&repo, false).await?;
            let existing = self.store.get_aliases(repo.root());
            for branch in &branches {
                let name = normalize_branch_name(&branch.name);
                if existing.contains_key(name) {
                    continue;
                }

                if let Some(key) = self.tracker.extract_jira_key(name) {
                    pending.insert(key);
                }
            }
        }

        if pending.is_empty() {
            debug!("every branch with an issue key already has an alias");
            return Ok(None);
        }

        info!(
            "detected {} new branches that need to sync JIRA information: {}",
            pending.len(),
            pending.iter().map(String::as_str).collect::<Vec<_>>().join(", ")
        );
        let summaries = self.tracker.get_batch_issue_summaries(&pending).await;

        // INVARIANT: Branch lists may have changed during lookup, so list them again.
        let mut new_aliases = RepositoryAliasMap::new();
        for repo in self.source.repositories() {
            let branches = self.source.active_branches(&repo, false).await?;
            let mut aliases = self.store.get_aliases(repo.root());
            let mut added = AliasMap::new();
            for branch in &branches {
                let name = normalize_branch_name(&branch.name);
                if aliases.contains_key(name) {
                    continue;
                }

                if let Some(alias) = self.resolve_alias(name, &summaries) {
                    info!("added new alias: {name} -> {alias}");
                    aliases.insert(name.to_string(), alias.clone());
                    added.insert(name.to_string(), alias);
                }
            }

            if !added.is_empty() {
                self.store.set_aliases(repo.root(), aliases);
                new_aliases.insert(repo.root().to_path_buf(), added);
            }
        }

        if new_aliases.is_empty() {
            debug!("no summaries found for {} pending issue keys", pending.len());
            return Ok(None);
        }

        self.store.save_cache().await?;
        self.notifier.info(&format!(
            "Synced JIRA information for {} new branches",
            pending.len()
        ));

        Ok(Some(SyncResult::success(
            SyncKind::Incremental,
            pending.len(),
            new_aliases,
        )))
    }

    async fn try_sync_with_jira(&mut self) -> Result<SyncResult> {
        let include_remote = self.store.show_remote_branches();
        let mut listings = Vec::new();
        let mut keys = BTreeSet::new();
        for repo in self.source.repositories() {
            let branches = self.source.active_branches(&repo, include_remote).await?;
            keys.extend(self.collect_keys(&branches));
            listings.push((repo, branches));
        }

        let summaries = self.tracker.get_batch_issue_summaries(&keys).await;

        // INVARIANT: Build every map before replacing any of them.
        let rebuilt = listings
            .iter()
            .map(|(repo, branches)| {
                let aliases = self.build_aliases(branches, &summaries);
                (repo.root().to_path_buf(), aliases)
            })
            .collect::<RepositoryAliasMap>();
        for (root, aliases) in &rebuilt {
            self.store.set_aliases(root, aliases.clone());
        }

        self.store.save_cache().await?;
        info!(
            "synced {} issue keys across {} repositories",
            keys.len(),
            rebuilt.len()
        );

        Ok(SyncResult::success(SyncKind::Full, keys.len(), rebuilt))
    }

    async fn try_sync_repository(&mut self, repo: &RepoHandle) -> Result<AliasMap> {
        let include_remote = self.store.show_remote_branches();
        let branches = self.source.active_branches(repo, include_remote).await?;
        let keys = self.collect_keys(&branches);
        let summaries = self.tracker.get_batch_issue_summaries(&keys).await;
        let aliases = self.build_aliases(&branches, &summaries);
        self.store.set_aliases(repo.root(), aliases.clone());

        Ok(aliases)
    }

    fn collect_keys(&self, branches: &[BranchRef]) -> BTreeSet<String> {
        branches
            .iter()
            .filter_map(|branch| self.tracker.extract_jira_key(normalize_branch_name(&branch.name)))
            .collect()
    }

    fn build_aliases(
        &self,
        branches: &[BranchRef],
        summaries: &BTreeMap<String, String>,
    ) -> AliasMap {
        branches
            .iter()
            .filter_map(|branch| {
                let name = normalize_branch_name(&branch.name);
                let alias = self.resolve_alias(name, summaries)?;
                Some((name.to_string(), alias))
            })
            .collect()
    }

    fn resolve_alias(
        &self,
        branch_name: &str,
        summaries: &BTreeMap<String, String>,
    ) -> Option<String> {
        let key = self.tracker.extract_jira_key(branch_name)?;
        let summary = summaries.get(&key)?;
        Some(format!("{key}: {summary}"))
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn tracker(&self) -> &JiraService<T> {
        &self.tracker
    }

    pub fn store(&self) -> &AliasStore<B> {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut AliasStore<B> {
        &mut self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }
}

/// Failures that abort a sync pass.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// Branch enumeration fails.
    #[error(transparent)]
    Git(#[from] GitError),

    /// Alias store cannot be flushed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Friendly result alias :3
type Result<T, E = SyncError> = std::result::Result<T, E>;
