// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Presentation facade over the sync engine.
//!
//! The [`BranchAliasManager`] is what user interfaces talk to. It owns the
//! [`SyncEngine`], answers listing and status queries, persists view state
//! toggles, and tells listeners when whatever they display should be
//! refreshed through [`BranchAliasManager::on_did_change_aliases`].

use crate::{
    event::{Publisher, Subscription},
    git::{BranchSource, Git2BranchSource},
    jira::{JiraTransport, ReqwestTransport},
    status::{self, JiraLinks, StatusSummary},
    store::{StateBackend, StoreError, TomlFileBackend},
    sync::{SyncEngine, SyncKind, SyncResult},
    view::{self, AliasEntry},
};

use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Entry point for presentation layers.
pub struct BranchAliasManager<S = Git2BranchSource, T = ReqwestTransport, B = TomlFileBackend>
where
    S: BranchSource,
    T: JiraTransport,
    B: StateBackend,
{
    engine: SyncEngine<S, T, B>,
    on_did_change_aliases: Publisher<()>,
}

impl<S, T, B> BranchAliasManager<S, T, B>
where
    S: BranchSource,
    T: JiraTransport,
    B: StateBackend,
{
    pub fn new(engine: SyncEngine<S, T, B>) -> Self {
        Self {
            engine,
            on_did_change_aliases: Publisher::new(),
        }
    }

    /// Register listener for "displayed aliases are stale" events.
    pub fn on_did_change_aliases(
        &mut self,
        listener: impl Fn(&()) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_aliases.subscribe(listener)
    }

    /// Remove alias change listener.
    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.on_did_change_aliases.unsubscribe(subscription)
    }

    /// Ask listeners to refresh.
    pub fn refresh(&self) {
        self.on_did_change_aliases.fire(&());
    }

    /// Branches of repository in presentation order.
    pub async fn get_aliases(&self, repo_path: impl AsRef<Path>) -> Vec<AliasEntry> {
        view::get_aliases(self.engine.source(), self.engine.store(), repo_path.as_ref()).await
    }

    pub fn is_repository_expanded(&self, repo_path: impl AsRef<Path>) -> bool {
        self.engine.store().is_repository_expanded(repo_path)
    }

    /// Flip expansion state of repository and persist it.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if expansion state cannot be persisted. The
    ///   new state still holds in memory.
    #[instrument(skip(self, repo_path), level = "debug")]
    pub async fn toggle_repository(&mut self, repo_path: impl Into<PathBuf>) -> Result<bool> {
        let expanded = self.engine.store_mut().toggle_repository(repo_path);
        self.engine.store().save_expanded_repos().await?;
        self.refresh();

        Ok(expanded)
    }

    pub fn show_remote_branches(&self) -> bool {
        self.engine.store().show_remote_branches()
    }

    /// Flip remote branch visibility and persist it.
    ///
    /// # Errors
    ///
    /// - Return [`StoreError`] if visibility flag cannot be persisted.
    #[instrument(skip(self), level = "debug")]
    pub async fn toggle_remote_branches(&mut self) -> Result<bool> {
        let store = self.engine.store_mut();
        let show_remote = !store.show_remote_branches();
        store.set_show_remote_branches(show_remote);
        store.save_remote_state().await?;
        debug!("remote branches are now {}", if show_remote { "shown" } else { "hidden" });
        self.refresh();

        Ok(show_remote)
    }

    /// Run full sync and react to its result.
    pub async fn sync_with_jira(&mut self) -> SyncResult {
        let result = self.engine.sync_with_jira().await;
        self.handle_sync_result(&result);
        result
    }

    /// Run incremental sync after the set of branches changed.
    pub async fn on_repositories_changed(&mut self) -> Option<SyncResult> {
        let result = self.engine.check_and_sync_missing_aliases().await?;
        self.handle_sync_result(&result);
        Some(result)
    }

    /// React to sync result.
    ///
    /// Successful syncs that looked anything up trigger a refresh. Failed
    /// full syncs are reported to the user, while failed incremental syncs
    /// have already been logged and stay quiet.
    pub fn handle_sync_result(&self, result: &SyncResult) {
        if result.success {
            if result.synced_count > 0 {
                self.refresh();
            }
            return;
        }

        if result.kind == SyncKind::Full {
            let message = result
                .errors
                .first()
                .map(String::as_str)
                .unwrap_or("unknown error");
            self.engine
                .notifier()
                .error(&format!("Failed to sync with JIRA: {message}"));
        }
    }

    /// One-line summary of checked out branches.
    pub async fn status_summary(&self) -> StatusSummary {
        let statuses = status::collect(self.engine.source(), self.engine.store()).await;
        status::summarize(&statuses)
    }

    /// Browse links of checked out issues.
    pub async fn jira_links(&self) -> JiraLinks {
        let statuses = status::collect(self.engine.source(), self.engine.store()).await;
        let tracker = self.engine.tracker();
        status::links(&statuses, |branch| {
            let key = tracker.extract_jira_key(branch)?;
            tracker.get_jira_url(key)
        })
    }

    pub fn engine(&self) -> &SyncEngine<S, T, B> {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut SyncEngine<S, T, B> {
        &mut self.engine
    }
}

/// Friendly result alias :3
type Result<T, E = StoreError> = std::result::Result<T, E>;
