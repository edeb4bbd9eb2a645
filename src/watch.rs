// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository change detection.
//!
//! Changes are detected by polling. Every poll takes a __fingerprint__ of
//! all repositories, i.e., the local branch names and checked out branch of
//! each one. A fingerprint that differs from the previous one means that
//! something happened that may call for new aliases.

use crate::{
    event::{Publisher, Subscription},
    git::BranchSource,
};

use std::{collections::BTreeMap, path::PathBuf};
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct RepoFingerprint {
    head: Option<String>,
    branches: Vec<String>,
}

type Fingerprint = BTreeMap<PathBuf, RepoFingerprint>;

/// Polling repository watcher.
#[derive(Debug, Default)]
pub struct RepositoryWatcher {
    last: Option<Fingerprint>,
    on_did_change_repositories: Publisher<()>,
}

impl RepositoryWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register listener for repository changes.
    pub fn on_did_change_repositories(
        &mut self,
        listener: impl Fn(&()) + Send + Sync + 'static,
    ) -> Subscription {
        self.on_did_change_repositories.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, subscription: Subscription) -> bool {
        self.on_did_change_repositories.unsubscribe(subscription)
    }

    /// Take fresh fingerprint and compare it with the previous one.
    ///
    /// The first poll only records a baseline. Returns true and notifies
    /// listeners if repositories changed since the last poll.
    #[instrument(skip(self, source), level = "debug")]
    pub async fn poll(&mut self, source: &impl BranchSource) -> bool {
        let current = fingerprint(source).await;
        let changed = self.last.as_ref().is_some_and(|last| *last != current);
        self.last = Some(current);

        if changed {
            debug!("repositories changed");
            self.on_did_change_repositories.fire(&());
        }

        changed
    }
}

async fn fingerprint(source: &impl BranchSource) -> Fingerprint {
    let mut fingerprint = Fingerprint::new();
    for repo in source.repositories() {
        // INVARIANT: Unreadable repositories fingerprint as empty, so they
        //   register as changed once they become readable again.
        let branches = match source.active_branches(&repo, false).await {
            Ok(branches) => {
                let mut names = branches.into_iter().map(|branch| branch.name).collect::<Vec<_>>();
                names.sort();
                names
            }
            Err(error) => {
                warn!("cannot list branches of {:?}: {error}", repo.root().display());
                Vec::new()
            }
        };
        let head = source.head_branch(&repo).await.ok().flatten();

        fingerprint.insert(repo.root().to_path_buf(), RepoFingerprint { head, branches });
    }

    fingerprint
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::{BranchRef, RepoHandle};
    use async_trait::async_trait;
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    };

    #[derive(Debug, Default)]
    struct MutableSource {
        branches: Mutex<Vec<String>>,
        head: Mutex<Option<String>>,
    }

    #[async_trait]
    impl BranchSource for MutableSource {
        fn repositories(&self) -> Vec<RepoHandle> {
            vec![RepoHandle::new("/repo")]
        }

        async fn active_branches(
            &self,
            _: &RepoHandle,
            _: bool,
        ) -> crate::git::Result<Vec<BranchRef>> {
            Ok(self
                .branches
                .lock()
                .unwrap()
                .iter()
                .map(|name| BranchRef::local(name.as_str()))
                .collect())
        }

        async fn head_branch(&self, _: &RepoHandle) -> crate::git::Result<Option<String>> {
            Ok(self.head.lock().unwrap().clone())
        }
    }

    #[tokio::test]
    async fn first_poll_records_baseline() {
        let source = MutableSource::default();
        let mut watcher = RepositoryWatcher::new();

        assert!(!watcher.poll(&source).await);
        assert!(!watcher.poll(&source).await);
    }

    #[tokio::test]
    async fn detects_new_branch_and_checkout() {
        let source = MutableSource::default();
        *source.branches.lock().unwrap() = vec!["main".into()];
        let mut watcher = RepositoryWatcher::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        watcher.on_did_change_repositories(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        watcher.poll(&source).await;

        source.branches.lock().unwrap().push("feature_PROJ-1".into());
        assert!(watcher.poll(&source).await);

        *source.head.lock().unwrap() = Some("feature_PROJ-1".into());
        assert!(watcher.poll(&source).await);
        assert!(!watcher.poll(&source).await);

        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn branch_order_does_not_matter() {
        let source = MutableSource::default();
        *source.branches.lock().unwrap() = vec!["a".into(), "b".into()];
        let mut watcher = RepositoryWatcher::new();
        watcher.poll(&source).await;

        *source.branches.lock().unwrap() = vec!["b".into(), "a".into()];
        assert!(!watcher.poll(&source).await);
    }
}
