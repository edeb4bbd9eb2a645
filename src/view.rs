// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Presentation ordering of branches and their aliases.

use crate::{
    extract::normalize_branch_name,
    git::BranchSource,
    store::{AliasStore, StateBackend},
};

use icu_collator::{Collator, CollatorOptions, Strength};
use std::{cmp::Ordering, path::Path};
use tracing::{instrument, warn};

/// Branch as it should be presented.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasEntry {
    /// Normalized branch name.
    pub branch_name: String,

    /// Alias text, or the branch name itself if no alias is known.
    pub display_text: String,

    /// Display text comes from the alias store.
    pub aliased: bool,
}

impl AliasEntry {
    fn aliased(branch_name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            branch_name: branch_name.into(),
            display_text: alias.into(),
            aliased: true,
        }
    }

    fn plain(branch_name: impl Into<String>) -> Self {
        let branch_name = branch_name.into();
        Self {
            display_text: branch_name.clone(),
            branch_name,
            aliased: false,
        }
    }
}

/// List active branches of repository with their display text.
///
/// Branches with an alias come first, followed by branches without one.
/// Both groups are sorted by branch name with [`locale_cmp`]. A repository
/// that the branch source does not know about, or whose branches cannot be
/// listed, yields nothing.
#[instrument(skip(source, store), level = "debug")]
pub async fn get_aliases<S, B>(
    source: &S,
    store: &AliasStore<B>,
    repo_path: &Path,
) -> Vec<AliasEntry>
where
    S: BranchSource,
    B: StateBackend,
{
    let Some(repo) = source
        .repositories()
        .into_iter()
        .find(|repo| repo.root() == repo_path)
    else {
        return Vec::new();
    };

    let branches = match source
        .active_branches(&repo, store.show_remote_branches())
        .await
    {
        Ok(branches) => branches,
        Err(error) => {
            warn!("cannot list branches of {:?}: {error}", repo_path.display());
            return Vec::new();
        }
    };

    let aliases = store.get_aliases(repo_path);
    let (mut aliased, mut plain): (Vec<_>, Vec<_>) = branches
        .iter()
        .map(|branch| {
            let name = normalize_branch_name(&branch.name);
            match aliases.get(name) {
                Some(alias) => AliasEntry::aliased(name, alias),
                None => AliasEntry::plain(name),
            }
        })
        .partition(|entry| entry.aliased);

    aliased.sort_by(|a, b| locale_cmp(&a.branch_name, &b.branch_name));
    plain.sort_by(|a, b| locale_cmp(&a.branch_name, &b.branch_name));
    aliased.extend(plain);

    aliased
}

thread_local! {
    static COLLATOR: Option<Collator> = root_collator();
}

/// Compare strings the way a human would alphabetize them.
///
/// Uses the root collation order at tertiary strength. Accents and case only
/// break ties between otherwise equal strings, with lowercase first.
/// Punctuation sorts ahead of digits, and digits ahead of letters.
pub fn locale_cmp(a: &str, b: &str) -> Ordering {
    COLLATOR.with(|collator| match collator {
        Some(collator) => collator.compare(a, b),
        None => a
            .to_lowercase()
            .cmp(&b.to_lowercase())
            .then_with(|| b.cmp(a)),
    })
}

fn root_collator() -> Option<Collator> {
    let mut options = CollatorOptions::new();
    options.strength = Some(Strength::Tertiary);

    Collator::try_new(&Default::default(), options)
        .map_err(|error| warn!("cannot load root collation, using case folded order: {error}"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        git::{BranchRef, GitError, RepoHandle},
        store::{AliasMap, MemoryBackend},
    };
    use async_trait::async_trait;
    use simple_test_case::test_case;

    struct FixedSource {
        root: &'static str,
        local: Vec<&'static str>,
        remote: Vec<&'static str>,
    }

    #[async_trait]
    impl BranchSource for FixedSource {
        fn repositories(&self) -> Vec<RepoHandle> {
            vec![RepoHandle::new(self.root)]
        }

        async fn active_branches(
            &self,
            _: &RepoHandle,
            include_remote: bool,
        ) -> crate::git::Result<Vec<BranchRef>> {
            let names = if include_remote { &self.remote } else { &self.local };
            if names.contains(&"!") {
                return Err(GitError::Git2(git2::Error::from_str("broken")));
            }

            Ok(names
                .iter()
                .map(|name| BranchRef {
                    name: name.to_string(),
                    is_remote: include_remote,
                })
                .collect())
        }

        async fn head_branch(&self, _: &RepoHandle) -> crate::git::Result<Option<String>> {
            Ok(None)
        }
    }

    async fn store_with(entries: &[(&str, &str)]) -> AliasStore<MemoryBackend> {
        let mut store = AliasStore::load(MemoryBackend::new()).await.unwrap();
        let aliases = entries
            .iter()
            .map(|(branch, alias)| (branch.to_string(), alias.to_string()))
            .collect::<AliasMap>();
        store.set_aliases("/repo", aliases);
        store
    }

    fn pairs(entries: &[AliasEntry]) -> Vec<(&str, &str)> {
        entries
            .iter()
            .map(|entry| (entry.branch_name.as_str(), entry.display_text.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn aliased_branches_come_first() {
        let source = FixedSource {
            root: "/repo",
            local: vec!["b2", "b1"],
            remote: vec![],
        };
        let store = store_with(&[("b1", "K-1: Foo")]).await;

        let result = get_aliases(&source, &store, Path::new("/repo")).await;
        pretty_assertions::assert_eq!(pairs(&result), vec![("b1", "K-1: Foo"), ("b2", "b2")]);
    }

    #[tokio::test]
    async fn partitions_sort_independently() {
        let source = FixedSource {
            root: "/repo",
            local: vec!["zeta_K-9", "Alpha", "main", "beta_K-2", "delta"],
            remote: vec![],
        };
        let store = store_with(&[("zeta_K-9", "K-9: Last"), ("beta_K-2", "K-2: Second")]).await;

        let result = get_aliases(&source, &store, Path::new("/repo")).await;
        pretty_assertions::assert_eq!(
            pairs(&result),
            vec![
                ("beta_K-2", "K-2: Second"),
                ("zeta_K-9", "K-9: Last"),
                ("Alpha", "Alpha"),
                ("delta", "delta"),
                ("main", "main"),
            ]
        );
    }

    #[tokio::test]
    async fn remote_branches_are_normalized() {
        let source = FixedSource {
            root: "/repo",
            local: vec!["main"],
            remote: vec!["origin/release_PROJ-7", "origin/main"],
        };
        let mut store = store_with(&[("release_PROJ-7", "PROJ-7: Ship it")]).await;
        store.set_show_remote_branches(true);

        let result = get_aliases(&source, &store, Path::new("/repo")).await;
        pretty_assertions::assert_eq!(
            pairs(&result),
            vec![("release_PROJ-7", "PROJ-7: Ship it"), ("main", "main")]
        );
    }

    #[tokio::test]
    async fn unknown_repository_yields_nothing() {
        let source = FixedSource {
            root: "/repo",
            local: vec!["main"],
            remote: vec![],
        };
        let store = store_with(&[]).await;

        assert!(get_aliases(&source, &store, Path::new("/elsewhere")).await.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_yields_nothing() {
        let source = FixedSource {
            root: "/repo",
            local: vec!["!"],
            remote: vec![],
        };
        let store = store_with(&[]).await;

        assert!(get_aliases(&source, &store, Path::new("/repo")).await.is_empty());
    }

    #[test_case("apple", "Banana", Ordering::Less; "case insensitive")]
    #[test_case("Zebra", "apple", Ordering::Greater; "uppercase does not jump ahead")]
    #[test_case("abc", "aBc", Ordering::Less; "lowercase first on tie")]
    #[test_case("same", "same", Ordering::Equal; "equal")]
    #[test_case("feature_x", "feature-x", Ordering::Less; "underscore before hyphen")]
    #[test_case("feature-x", "feature/x", Ordering::Less; "hyphen before slash")]
    #[test_case("v_", "v1", Ordering::Less; "punctuation before digits")]
    #[test_case("v9", "va", Ordering::Less; "digits before letters")]
    #[test_case("Ébauche", "epsilon", Ordering::Less; "accent does not push past z")]
    #[test_case("resume", "résumé", Ordering::Less; "unaccented first on tie")]
    #[test]
    fn locale_ordering(a: &str, b: &str, expect: Ordering) {
        assert_eq!(locale_cmp(a, b), expect);
    }

    #[test]
    fn sorts_typical_branch_names() {
        let mut names = vec![
            "feature-x",
            "feature_x",
            "feature/x",
            "v1",
            "v_",
            "Ébauche",
            "zeta",
            "epsilon",
        ];
        names.sort_by(|a, b| locale_cmp(a, b));

        pretty_assertions::assert_eq!(
            names,
            vec![
                "Ébauche",
                "epsilon",
                "feature_x",
                "feature-x",
                "feature/x",
                "v_",
                "v1",
                "zeta",
            ]
        );
    }
}
