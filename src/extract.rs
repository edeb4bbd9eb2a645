// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Issue key extraction.
//!
//! Branch names carry their issue key somewhere inside of them, e.g.,
//! "feature_PROJ-42" refers to issue "PROJ-42". The location of the key is
//! described by a user supplied regular expression that must contain exactly
//! one capture group. Whatever that group captures is the issue key.
//!
//! Extraction never fails. A pattern that does not compile, or does not
//! match, or whose group captures nothing simply means that the branch has
//! no issue key.

use regex::Regex;
use tracing::debug;

/// Remote-tracking prefix stripped from branch names.
pub const REMOTE_PREFIX: &str = "origin/";

/// Compiled branch pattern.
///
/// Holds onto the compiled regular expression so that bulk extraction over
/// many branches does not recompile the pattern for every branch.
#[derive(Clone, Debug)]
pub struct KeyPattern {
    regex: Option<Regex>,
}

impl KeyPattern {
    /// Compile branch pattern.
    ///
    /// An invalid pattern is kept around as a pattern that matches nothing.
    pub fn new(pattern: impl AsRef<str>) -> Self {
        let regex = match Regex::new(pattern.as_ref()) {
            Ok(regex) => Some(regex),
            Err(error) => {
                debug!("branch pattern {:?} does not compile: {error}", pattern.as_ref());
                None
            }
        };

        Self { regex }
    }

    /// Extract issue key from branch name.
    pub fn extract(&self, branch_name: impl AsRef<str>) -> Option<String> {
        self.regex
            .as_ref()?
            .captures(branch_name.as_ref())?
            .get(1)
            .map(|capture| capture.as_str())
            .filter(|key| !key.is_empty())
            .map(ToString::to_string)
    }

    /// Check if pattern compiled.
    pub fn is_valid(&self) -> bool {
        self.regex.is_some()
    }
}

/// Extract issue key from branch name through branch pattern.
pub fn extract_issue_key(branch_name: impl AsRef<str>, pattern: impl AsRef<str>) -> Option<String> {
    KeyPattern::new(pattern).extract(branch_name)
}

/// Strip one leading remote-tracking prefix from branch name.
///
/// The result is the key used for the alias cache, so a local branch and its
/// remote-tracking counterpart share the same alias.
pub fn normalize_branch_name(branch_name: &str) -> &str {
    branch_name
        .strip_prefix(REMOTE_PREFIX)
        .unwrap_or(branch_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use simple_test_case::test_case;

    #[test_case("feature_PROJ-42", r".*_(PROJ-\d+)", Some("PROJ-42"); "underscore separated key")]
    #[test_case("PROJ-42", r".*_(PROJ-\d+)", None; "missing separator")]
    #[test_case("feature/ABC-7-login", r"([A-Z]+-\d+)", Some("ABC-7"); "unanchored search")]
    #[test_case("feature_PROJ-42", r"feature_PROJ-\d+", None; "no capture group")]
    #[test_case("feature_PROJ-42", r".*_(PROJ-\d+", None; "malformed pattern")]
    #[test_case("feature_", r".*_(\w*)", None; "empty capture")]
    #[test_case("feature_PROJ-42", "", None; "empty pattern")]
    #[test]
    fn extract_issue_key_cases(branch: &str, pattern: &str, expect: Option<&str>) {
        assert_eq!(extract_issue_key(branch, pattern), expect.map(String::from));
    }

    #[test]
    fn extract_issue_key_is_deterministic() {
        for pattern in [r".*_(PROJ-\d+)", r"(", r"(?P<key>[A-Z]+-\d+)"] {
            let first = extract_issue_key("fix_PROJ-9", pattern);
            let second = extract_issue_key("fix_PROJ-9", pattern);
            assert_eq!(first, second);
        }
    }

    #[test]
    fn key_pattern_reports_validity() {
        assert!(KeyPattern::new(r".*_(PROJ-\d+)").is_valid());
        assert!(!KeyPattern::new(r"[").is_valid());
    }

    #[test_case("origin/feature_X", "feature_X"; "remote prefix")]
    #[test_case("feature_X", "feature_X"; "already normalized")]
    #[test_case("origin/origin/feature_X", "origin/feature_X"; "strips exactly one prefix")]
    #[test_case("upstream/feature_X", "upstream/feature_X"; "other remotes untouched")]
    #[test]
    fn normalize_branch_name_cases(branch: &str, expect: &str) {
        assert_eq!(normalize_branch_name(branch), expect);
    }

    #[test]
    fn normalize_branch_name_is_idempotent() {
        let once = normalize_branch_name("origin/feature_X");
        assert_eq!(normalize_branch_name(once), once);
    }
}
