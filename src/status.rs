// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Summary of checked out branches.
//!
//! Branch-alias can summarize which branch every repository currently has
//! checked out in a single line of text. Repositories that show the same
//! text are grouped together, so a set of repositories that all sit on the
//! same issue collapse into one segment:
//!
//! ```text
//! [app,lib]: PROJ-42: Fix login | docs: main
//! ```
//!
//! The same information yields the browse links of every checked out issue.

use crate::{
    extract::normalize_branch_name,
    git::{BranchSource, RepoHandle},
    store::{AliasStore, StateBackend},
};

use tracing::warn;

const UNKNOWN_BRANCH: &str = "Unknown Branch";
const NO_REPOSITORY: &str = "No Repository";

/// Checked out branch of one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoStatus {
    pub name: String,
    pub branch: Option<String>,
    pub alias: Option<String>,
}

impl RepoStatus {
    fn display_text(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.branch.as_deref())
            .unwrap_or(UNKNOWN_BRANCH)
    }
}

/// One-line summary with detailed tooltip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusSummary {
    pub text: String,
    pub tooltip: String,
}

/// Browse links of checked out issues.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JiraLinks {
    /// Repositories sit on more than one distinct branch.
    pub diverged: bool,
    pub urls: Vec<String>,
}

/// Gather checked out branch of every repository.
///
/// A repository whose HEAD cannot be read is reported without a branch.
pub async fn collect<S, B>(source: &S, store: &AliasStore<B>) -> Vec<RepoStatus>
where
    S: BranchSource,
    B: StateBackend,
{
    let mut statuses = Vec::new();
    for repo in source.repositories() {
        let branch = head_branch(source, &repo).await;
        let alias = branch.as_deref().and_then(|branch| {
            store
                .get_aliases(repo.root())
                .get(normalize_branch_name(branch))
                .cloned()
        });
        statuses.push(RepoStatus {
            name: repo.name(),
            branch,
            alias,
        });
    }

    statuses
}

async fn head_branch(source: &impl BranchSource, repo: &RepoHandle) -> Option<String> {
    match source.head_branch(repo).await {
        Ok(branch) => branch,
        Err(error) => {
            warn!("cannot read HEAD of {:?}: {error}", repo.root().display());
            None
        }
    }
}

/// Summarize repository statuses into one line.
pub fn summarize(statuses: &[RepoStatus]) -> StatusSummary {
    if statuses.is_empty() {
        return StatusSummary {
            text: NO_REPOSITORY.into(),
            tooltip: NO_REPOSITORY.into(),
        };
    }

    // INVARIANT: Groups keep the order their display text was first seen in.
    let mut groups: Vec<(&str, Vec<&str>)> = Vec::new();
    for status in statuses {
        let text = status.display_text();
        match groups.iter_mut().find(|(seen, _)| *seen == text) {
            Some((_, names)) => names.push(status.name.as_str()),
            None => groups.push((text, vec![status.name.as_str()])),
        }
    }

    let text = groups
        .iter()
        .map(|(text, names)| match names.as_slice() {
            [name] => format!("{name}: {text}"),
            names => format!("[{}]: {text}", names.join(",")),
        })
        .collect::<Vec<_>>()
        .join(" | ");

    let tooltip = statuses
        .iter()
        .map(|status| match (&status.branch, &status.alias) {
            (Some(branch), Some(alias)) => format!("{}: {alias} ({branch})", status.name),
            (Some(branch), None) => format!("{}: {branch} (No alias found)", status.name),
            (None, _) => format!("{}: No corresponding Git branch found", status.name),
        })
        .collect::<Vec<_>>()
        .join("\n");

    StatusSummary { text, tooltip }
}

/// Build browse links for checked out issues.
///
/// The `browse_url` callback maps a normalized branch name to the link of
/// its issue. Links are deduplicated in the order they were first seen. If
/// every repository sits on the same branch only the first link is returned.
pub fn links(
    statuses: &[RepoStatus],
    browse_url: impl Fn(&str) -> Option<String>,
) -> JiraLinks {
    let mut branches: Vec<&str> = Vec::new();
    let mut urls: Vec<String> = Vec::new();
    for branch in statuses.iter().filter_map(|status| status.branch.as_deref()) {
        let branch = normalize_branch_name(branch);
        if !branches.contains(&branch) {
            branches.push(branch);
        }

        let Some(url) = browse_url(branch) else {
            continue;
        };
        if !urls.contains(&url) {
            urls.push(url);
        }
    }

    let diverged = branches.len() > 1;
    if !diverged {
        urls.truncate(1);
    }

    JiraLinks { diverged, urls }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::KeyPattern;
    use indoc::indoc;
    use pretty_assertions::assert_eq;

    fn status(name: &str, branch: Option<&str>, alias: Option<&str>) -> RepoStatus {
        RepoStatus {
            name: name.into(),
            branch: branch.map(Into::into),
            alias: alias.map(Into::into),
        }
    }

    fn browse(branch: &str) -> Option<String> {
        let key = KeyPattern::new(r".*_(PROJ-\d+)").extract(branch)?;
        Some(format!("https://jira.blah.org/browse/{key}"))
    }

    #[test]
    fn summarize_without_repositories() {
        let result = summarize(&[]);
        assert_eq!(result.text, "No Repository");
        assert_eq!(result.tooltip, "No Repository");
    }

    #[test]
    fn summarize_groups_by_display_text() {
        let statuses = [
            status("app", Some("feature_PROJ-42"), Some("PROJ-42: Fix login")),
            status("docs", Some("main"), None),
            status("lib", Some("feature_PROJ-42"), Some("PROJ-42: Fix login")),
            status("bare", None, None),
        ];

        let result = summarize(&statuses);
        assert_eq!(
            result.text,
            "[app,lib]: PROJ-42: Fix login | docs: main | bare: Unknown Branch"
        );
        assert_eq!(
            result.tooltip,
            indoc! {"
                app: PROJ-42: Fix login (feature_PROJ-42)
                docs: main (No alias found)
                lib: PROJ-42: Fix login (feature_PROJ-42)
                bare: No corresponding Git branch found"}
        );
    }

    #[test]
    fn tooltip_of_single_repository_has_one_line() {
        let result = summarize(&[status("app", Some("main"), None)]);
        assert_eq!(result.text, "app: main");
        assert_eq!(result.tooltip, "app: main (No alias found)");
    }

    #[test]
    fn links_of_single_branch() {
        let statuses = [
            status("app", Some("feature_PROJ-42"), None),
            status("lib", Some("origin/feature_PROJ-42"), None),
        ];

        let result = links(&statuses, browse);
        assert_eq!(
            result,
            JiraLinks {
                diverged: false,
                urls: vec!["https://jira.blah.org/browse/PROJ-42".into()],
            }
        );
    }

    #[test]
    fn links_of_diverged_branches() {
        let statuses = [
            status("app", Some("feature_PROJ-42"), None),
            status("docs", Some("main"), None),
            status("lib", Some("fix_PROJ-7"), None),
            status("cli", Some("other_PROJ-42"), None),
        ];

        let result = links(&statuses, browse);
        assert_eq!(
            result,
            JiraLinks {
                diverged: true,
                urls: vec![
                    "https://jira.blah.org/browse/PROJ-42".into(),
                    "https://jira.blah.org/browse/PROJ-7".into(),
                ],
            }
        );
    }

    #[test]
    fn links_without_keys() {
        let statuses = [status("app", Some("main"), None), status("lib", None, None)];

        let result = links(&statuses, browse);
        assert_eq!(result, JiraLinks::default());
    }
}
