// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Configuration layout.
//!
//! Specify the layout of the settings file that branch-alias uses to simplify
//! the process of serialization and deserialization. File I/O is left to the
//! caller to figure out.
//!
//! # General Layout
//!
//! ```toml
//! jira_base_url = "https://jira.example.com"
//! jira_token = "$JIRA_TOKEN"
//! branch_pattern = '.*_(PROJ-\d+)'
//! repositories = ["~/src/app", "~/src/lib"]
//! ```
//!
//! Every field is optional. Missing fields fall back to defaults that let
//! the tool run, but leave tracker lookups inert until the user supplies a
//! real base URL and token.

use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::{
    fmt::{Display, Error as FmtError, Formatter, Result as FmtResult},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Placeholder base URL used until the user configures a real instance.
pub const DEFAULT_JIRA_BASE_URL: &str = "https://your-jira-instance.com";

/// Default pattern for extracting issue keys out of branch names.
pub const DEFAULT_BRANCH_PATTERN: &str = r".*_(PROJ-\d+)";

/// Settings layout.
#[derive(Debug, PartialEq, Eq, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Base URL of Jira instance, e.g., "https://jira.example.com".
    pub jira_base_url: String,

    /// Personal access token sent as bearer token.
    pub jira_token: String,

    /// Regular expression with exactly one capture group for the issue key.
    pub branch_pattern: String,

    /// Override location of persisted state file.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_file: Option<PathBuf>,

    /// Root paths of repositories to annotate.
    pub repositories: Vec<PathBuf>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            jira_base_url: DEFAULT_JIRA_BASE_URL.into(),
            jira_token: String::new(),
            branch_pattern: DEFAULT_BRANCH_PATTERN.into(),
            state_file: None,
            repositories: Vec::new(),
        }
    }
}

impl Settings {
    /// Check settings for problems that would keep tracker integration from
    /// working.
    ///
    /// Errors block explicit sync operations. Warnings are informational.
    pub fn validate(&self) -> ConfigValidation {
        let mut validation = ConfigValidation::default();

        let base_url = self.jira_base_url.trim();
        if base_url.is_empty() {
            validation.errors.push("JIRA base URL is required".into());
        } else if base_url == DEFAULT_JIRA_BASE_URL {
            validation.warnings.push(
                "JIRA base URL is set to default value, please configure your actual JIRA instance URL"
                    .into(),
            );
        } else if Url::parse(base_url).is_err() {
            validation
                .errors
                .push("JIRA base URL is not a valid URL".into());
        }

        if self.jira_token.trim().is_empty() {
            validation
                .warnings
                .push("JIRA token is not configured, JIRA integration will not work".into());
        }

        if self.branch_pattern.trim().is_empty() {
            validation.errors.push("Branch pattern is required".into());
        } else if regex::Regex::new(&self.branch_pattern).is_err() {
            validation
                .errors
                .push("Branch pattern is not a valid regular expression".into());
        }

        validation
    }

    /// Check if base URL is still the placeholder default.
    pub fn has_default_base_url(&self) -> bool {
        self.jira_base_url == DEFAULT_JIRA_BASE_URL
    }
}

impl FromStr for Settings {
    type Err = ConfigError;

    fn from_str(data: &str) -> Result<Self, Self::Err> {
        let mut settings: Settings = toml::de::from_str(data).map_err(ConfigError::Deserialize)?;

        // INVARIANT: Token may reference environment, paths may also use tilde.
        settings.jira_token = shellexpand::env(&settings.jira_token)
            .map_err(ConfigError::ShellExpansion)?
            .into_owned();
        settings.state_file = settings
            .state_file
            .map(expand_path)
            .transpose()?;
        settings.repositories = settings
            .repositories
            .iter()
            .map(expand_path)
            .collect::<Result<Vec<_>>>()?;

        Ok(settings)
    }
}

impl Display for Settings {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.write_str(
            toml::ser::to_string_pretty(self)
                .map_err(ConfigError::Serialize)?
                .as_str(),
        )
    }
}

fn expand_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    Ok(PathBuf::from(
        shellexpand::full(path.as_ref().to_string_lossy().as_ref())
            .map_err(ConfigError::ShellExpansion)?
            .into_owned(),
    ))
}

/// Outcome of [`Settings::validate`].
#[derive(Default, Debug, PartialEq, Eq, Clone)]
pub struct ConfigValidation {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ConfigValidation {
    /// Settings are valid if no errors were found.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Configuration error types.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error(transparent)]
    Deserialize(#[from] toml::de::Error),

    /// Failed to serialize configuration.
    #[error(transparent)]
    Serialize(#[from] toml::ser::Error),

    /// Failed to perform shell expansion on configuration.
    #[error(transparent)]
    ShellExpansion(#[from] shellexpand::LookupError<std::env::VarError>),
}

impl From<ConfigError> for FmtError {
    fn from(_: ConfigError) -> Self {
        FmtError
    }
}

/// Friendly result alias :3
type Result<T, E = ConfigError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use sealed_test::prelude::*;
    use simple_test_case::test_case;

    #[sealed_test(env = [("JIRA_TOKEN", "s3cr3t"), ("WORK", "/home/blah/work")])]
    fn deserialize_settings() -> anyhow::Result<()> {
        let result: Settings = r#"
            jira_base_url = "https://jira.blah.org"
            jira_token = "$JIRA_TOKEN"
            branch_pattern = '.*_(BLAH-\d+)'
            state_file = "$WORK/state.toml"
            repositories = ["$WORK/foo", "/home/blah/bar"]
        "#
        .parse()?;

        let expect = Settings {
            jira_base_url: "https://jira.blah.org".into(),
            jira_token: "s3cr3t".into(),
            branch_pattern: r".*_(BLAH-\d+)".into(),
            state_file: Some("/home/blah/work/state.toml".into()),
            repositories: vec!["/home/blah/work/foo".into(), "/home/blah/bar".into()],
        };

        pretty_assertions::assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn deserialize_empty_settings_uses_defaults() -> anyhow::Result<()> {
        let result: Settings = "".parse()?;
        pretty_assertions::assert_eq!(result, Settings::default());
        assert!(result.has_default_base_url());

        Ok(())
    }

    #[test]
    fn serialize_settings_parses_back() -> anyhow::Result<()> {
        let settings = Settings {
            jira_base_url: "https://jira.blah.org".into(),
            jira_token: "token".into(),
            branch_pattern: r"feature/(BLAH-\d+)".into(),
            state_file: None,
            repositories: vec!["/home/blah/foo".into()],
        };

        let result: Settings = settings.to_string().parse()?;
        pretty_assertions::assert_eq!(result, settings);

        Ok(())
    }

    #[test]
    fn validate_well_formed_settings() {
        let settings = Settings {
            jira_base_url: "https://jira.blah.org".into(),
            jira_token: "token".into(),
            ..Default::default()
        };

        pretty_assertions::assert_eq!(settings.validate(), ConfigValidation::default());
    }

    #[test_case("", r".*_(PROJ-\d+)", "JIRA base URL is required"; "missing base url")]
    #[test_case("not a url", r".*_(PROJ-\d+)", "JIRA base URL is not a valid URL"; "bad base url")]
    #[test_case("https://jira.blah.org", "", "Branch pattern is required"; "missing pattern")]
    #[test_case(
        "https://jira.blah.org",
        r".*_(PROJ-\d+",
        "Branch pattern is not a valid regular expression";
        "bad pattern"
    )]
    #[test]
    fn validate_reports_errors(base_url: &str, pattern: &str, expect: &str) {
        let settings = Settings {
            jira_base_url: base_url.into(),
            jira_token: "token".into(),
            branch_pattern: pattern.into(),
            ..Default::default()
        };

        let result = settings.validate();
        assert!(!result.is_valid());
        assert_eq!(result.errors, vec![expect.to_string()]);
    }

    #[test]
    fn validate_warns_about_defaults() {
        let result = Settings::default().validate();

        assert!(result.is_valid());
        assert_eq!(result.warnings.len(), 2);
    }
}
