// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Repository and branch enumeration.
//!
//! Branch-alias only needs three things from Git: the list of repositories
//! it should care about, the active branches of each repository, and the
//! branch each repository currently has checked out. The [`BranchSource`]
//! trait captures exactly that, and [`Git2BranchSource`] implements it on
//! top of libgit2.
//!
//! # Remote Branches
//!
//! Listing remote branches first fetches "origin" with pruning enabled.
//! Pruning drops remote-tracking references whose upstream branch has been
//! deleted, so gone branches never show up in the listing. The symbolic
//! "origin/HEAD" reference is skipped as well.

use crate::extract::REMOTE_PREFIX;

use async_trait::async_trait;
use auth_git2::{GitAuthenticator, Prompter};
use git2::{
    BranchType, ErrorCode, FetchOptions, FetchPrune, ReferenceType, RemoteCallbacks, Repository,
};
use indicatif::ProgressBar;
use inquire::{Password, Text};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

/// Name of remote that remote branches are listed from.
pub const REMOTE_NAME: &str = "origin";

/// Branch reported by a branch source.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BranchRef {
    /// Short branch name, e.g., "feature_PROJ-1" or "origin/feature_PROJ-1".
    pub name: String,

    /// Branch is a remote-tracking branch.
    pub is_remote: bool,
}

impl BranchRef {
    pub fn local(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_remote: false,
        }
    }

    pub fn remote(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_remote: true,
        }
    }
}

/// Repository identified by its root path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoHandle {
    root: PathBuf,
}

impl RepoHandle {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root path of repository. Doubles as its identity in the alias store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Last component of root path.
    pub fn name(&self) -> String {
        self.root
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "unknown".into())
    }
}

/// Layer of indirection for repository and branch enumeration.
#[async_trait]
pub trait BranchSource: Send + Sync {
    /// Every known repository.
    fn repositories(&self) -> Vec<RepoHandle>;

    /// Active branches of repository.
    ///
    /// Lists local branches, or remote branches of "origin" if
    /// `include_remote` is set.
    async fn active_branches(
        &self,
        repo: &RepoHandle,
        include_remote: bool,
    ) -> Result<Vec<BranchRef>>;

    /// Name of checked out branch, if HEAD points to a branch at all.
    async fn head_branch(&self, repo: &RepoHandle) -> Result<Option<String>>;
}

/// Branch source through libgit2.
#[derive(Debug, Clone)]
pub struct Git2BranchSource {
    paths: Vec<PathBuf>,
    repositories: Vec<RepoHandle>,
    interactive: bool,
    progress: Option<ProgressBar>,
}

impl Git2BranchSource {
    /// Construct new branch source over configured repository paths.
    ///
    /// Paths that do not lead to a Git repository are skipped with a warning.
    /// If `interactive` is set, fetching remote branches may prompt the user
    /// for credentials.
    pub fn new(paths: impl IntoIterator<Item = impl Into<PathBuf>>, interactive: bool) -> Self {
        let mut source = Self {
            paths: paths.into_iter().map(Into::into).collect(),
            repositories: Vec::new(),
            interactive,
            progress: None,
        };
        source.refresh();
        source
    }

    /// Suspend progress bar whenever credentials are prompted for.
    pub fn set_progress(&mut self, bar: Option<ProgressBar>) {
        self.progress = bar;
    }

    /// Rescan configured paths for repositories.
    #[instrument(skip(self), level = "debug")]
    pub fn refresh(&mut self) {
        self.repositories = self
            .paths
            .iter()
            .filter_map(|path| match Repository::open(path) {
                Ok(repository) => {
                    // INVARIANT: Roots are canonical so that they match no matter
                    //   how the user spelled them.
                    let root = repository.workdir().unwrap_or(path.as_path());
                    let root = root
                        .canonicalize()
                        .unwrap_or_else(|_| root.components().collect());
                    debug!("found repository {:?}", root.display());
                    Some(RepoHandle::new(root))
                }
                Err(error) => {
                    warn!("skip {:?}: {}", path.display(), error.message());
                    None
                }
            })
            .collect();
    }
}

#[async_trait]
impl BranchSource for Git2BranchSource {
    fn repositories(&self) -> Vec<RepoHandle> {
        self.repositories.clone()
    }

    #[instrument(skip(self), level = "debug")]
    async fn active_branches(
        &self,
        repo: &RepoHandle,
        include_remote: bool,
    ) -> Result<Vec<BranchRef>> {
        let root = repo.root().to_path_buf();
        let prompter = self.interactive.then(|| InquirePrompter::new(self.progress.clone()));
        tokio::task::spawn_blocking(move || {
            let repository = Repository::open(&root)?;
            if include_remote {
                fetch_remote(&repository, prompter);
                list_remote_branches(&repository)
            } else {
                list_local_branches(&repository)
            }
        })
        .await?
    }

    async fn head_branch(&self, repo: &RepoHandle) -> Result<Option<String>> {
        let root = repo.root().to_path_buf();
        tokio::task::spawn_blocking(move || {
            let repository = Repository::open(&root)?;
            head_branch_name(&repository)
        })
        .await?
    }
}

fn list_local_branches(repository: &Repository) -> Result<Vec<BranchRef>> {
    let mut branches = Vec::new();
    for entry in repository.branches(Some(BranchType::Local))? {
        let (branch, _) = entry?;
        if let Some(name) = branch.name()? {
            branches.push(BranchRef::local(name));
        }
    }

    Ok(branches)
}

fn list_remote_branches(repository: &Repository) -> Result<Vec<BranchRef>> {
    let mut branches = Vec::new();
    for entry in repository.branches(Some(BranchType::Remote))? {
        let (branch, _) = entry?;

        // INVARIANT: Skip "origin/HEAD" and friends.
        if branch.get().kind() == Some(ReferenceType::Symbolic) {
            continue;
        }

        match branch.name()? {
            Some(name) if name.starts_with(REMOTE_PREFIX) && name != "origin/HEAD" => {
                branches.push(BranchRef::remote(name));
            }
            _ => continue,
        }
    }

    Ok(branches)
}

fn head_branch_name(repository: &Repository) -> Result<Option<String>> {
    match repository.head() {
        Ok(head) if head.is_branch() => Ok(head.shorthand().map(ToString::to_string)),
        Ok(_) => Ok(None),
        // INVARIANT: Fresh repositories still name the branch HEAD will point to.
        Err(error) if error.code() == ErrorCode::UnbornBranch => Ok(repository
            .find_reference("HEAD")?
            .symbolic_target()
            .and_then(|target| target.strip_prefix("refs/heads/"))
            .map(ToString::to_string)),
        Err(error) => Err(error.into()),
    }
}

/// Fetch remote-tracking references with pruning.
///
/// Failure to fetch is not fatal. The listing falls back to whatever
/// remote-tracking references already exist locally.
#[instrument(skip(repository, prompter), level = "debug")]
fn fetch_remote(repository: &Repository, prompter: Option<InquirePrompter>) {
    let mut remote = match repository.find_remote(REMOTE_NAME) {
        Ok(remote) => remote,
        Err(error) => {
            debug!("no remote {REMOTE_NAME:?}: {}", error.message());
            return;
        }
    };

    let authenticator = match prompter {
        Some(prompter) => GitAuthenticator::default().set_prompter(prompter),
        None => GitAuthenticator::default()
            .try_password_prompt(0)
            .prompt_ssh_key_password(false),
    };
    let config = match repository.config() {
        Ok(config) => config,
        Err(error) => {
            warn!("cannot read config of {:?}: {}", repository.path().display(), error.message());
            return;
        }
    };

    let mut rc = RemoteCallbacks::new();
    rc.credentials(authenticator.credentials(&config));
    let mut fo = FetchOptions::new();
    fo.remote_callbacks(rc);
    fo.prune(FetchPrune::On);

    match remote.fetch(&[] as &[&str], Some(&mut fo), None) {
        Ok(()) => debug!("fetched {REMOTE_NAME:?} of {:?}", repository.path().display()),
        Err(error) => warn!(
            "failed to fetch {REMOTE_NAME:?} of {:?}: {}",
            repository.path().display(),
            error.message()
        ),
    }
}

/// Git2 authentication prompter through terminal.
///
/// Hides the progress bar, if any, while the user types.
#[derive(Debug, Clone, Default)]
pub struct InquirePrompter {
    bar: Option<ProgressBar>,
}

impl InquirePrompter {
    pub fn new(bar: Option<ProgressBar>) -> Self {
        Self { bar }
    }

    fn suspend<R>(&self, prompt: impl FnOnce() -> R) -> R {
        match &self.bar {
            Some(bar) => bar.suspend(prompt),
            None => prompt(),
        }
    }
}

impl Prompter for InquirePrompter {
    #[instrument(skip(self, url, _config), level = "debug")]
    fn prompt_username_password(
        &mut self,
        url: &str,
        _config: &git2::Config,
    ) -> Option<(String, String)> {
        info!("authentication required at {url}");
        self.suspend(|| {
            let username = Text::new("username").prompt().ok()?;
            let password = Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()?;
            Some((username, password))
        })
    }

    #[instrument(skip(self, username, url, _config), level = "debug")]
    fn prompt_password(
        &mut self,
        username: &str,
        url: &str,
        _config: &git2::Config,
    ) -> Option<String> {
        info!("authentication required at {url} for user {username}");
        self.suspend(|| {
            Password::new("password")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }

    #[instrument(skip(self, ssh_key_path, _config), level = "debug")]
    fn prompt_ssh_key_passphrase(
        &mut self,
        ssh_key_path: &Path,
        _config: &git2::Config,
    ) -> Option<String> {
        info!(
            "authentication required with ssh key at {}",
            ssh_key_path.display()
        );
        self.suspend(|| {
            Password::new("passphrase")
                .without_confirmation()
                .prompt()
                .ok()
        })
    }
}

/// All possible error types for branch enumeration.
#[derive(Debug, thiserror::Error)]
pub enum GitError {
    /// Operations from libgit2 fail.
    #[error(transparent)]
    Git2(#[from] git2::Error),

    /// Blocking libgit2 task did not finish.
    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

/// Friendly result alias :3
pub type Result<T, E = GitError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn repo_handle_name_is_last_component() {
        assert_eq!(RepoHandle::new("/home/blah/app").name(), "app");
        assert_eq!(RepoHandle::new("/").name(), "unknown");
    }

    #[test]
    fn skip_paths_that_are_not_repositories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = Git2BranchSource::new([dir.path().join("missing")], false);
        assert!(source.repositories().is_empty());

        Ok(())
    }
}
