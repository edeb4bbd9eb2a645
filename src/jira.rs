// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Issue summary lookup through Jira.
//!
//! Only two read endpoints of the Jira REST API are used:
//!
//! 1. `GET /rest/api/2/issue/{key}` to fetch the summary of one issue.
//! 2. `GET /rest/api/2/search` with a JQL query of the form
//!    `issuekey in (A-1,B-2)` to fetch the summaries of many issues in one
//!    round-trip.
//!
//! Lookups never fail from the caller's point of view. Missing settings,
//! unknown issues, and transport errors all collapse into "no summary".
//! The one exception that is surfaced is a rejected access token, which is
//! reported to the user through the [`Notifier`].

use crate::{config::Settings, extract::KeyPattern, notify::Notifier};

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::Deserialize;
use serde_json::Value;
use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{Debug, Formatter, Result as FmtResult},
    sync::Arc,
    time::Duration,
};
use tracing::{debug, instrument, warn};

const REQUEST_TIMEOUT_SECS: u64 = 20;
const AUTH_FAILED_MESSAGE: &str =
    "Jira authentication failed, please check if the configured token is correct";
const TOKEN_PAGE_PATH: &str =
    "secure/ViewProfile.jspa?selectedTab=com.atlassian.pats.pats-plugin:jira-user-personal-access-tokens";

/// Layer of indirection for HTTP access to Jira.
#[async_trait]
pub trait JiraTransport: Send + Sync {
    /// Perform authenticated GET request and decode JSON response body.
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<Value>;
}

/// Jira transport through reqwest.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// Construct new transport.
    ///
    /// # Errors
    ///
    /// - Return [`TrackerError::Request`] if HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("branch-alias/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|error| {
                TrackerError::Request(format!("failed to build HTTP client: {error}"))
            })?;

        Ok(Self { client })
    }
}

impl Debug for ReqwestTransport {
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("ReqwestTransport")
            .field("client", &self.client)
            .finish()
    }
}

#[async_trait]
impl JiraTransport for ReqwestTransport {
    async fn get_json(
        &self,
        url: &str,
        query: &[(&str, String)],
        token: &str,
    ) -> Result<Value> {
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(token)
            .header(header::CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|error| TrackerError::Request(format!("Jira request failed: {error}")))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|error| TrackerError::Request(format!("Jira response read failed: {error}")))?;

        if !status.is_success() {
            return Err(TrackerError::Status {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str(&body).map_err(TrackerError::Malformed)
    }
}

/// Issue summary service.
pub struct JiraService<T = ReqwestTransport>
where
    T: JiraTransport,
{
    base_url: String,
    token: String,
    pattern: KeyPattern,
    transport: T,
    notifier: Arc<dyn Notifier>,
}

impl<T> JiraService<T>
where
    T: JiraTransport,
{
    /// Construct new service from settings.
    pub fn new(settings: &Settings, transport: T, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            base_url: settings.jira_base_url.trim().trim_end_matches('/').to_string(),
            token: settings.jira_token.trim().to_string(),
            pattern: KeyPattern::new(&settings.branch_pattern),
            transport,
            notifier,
        }
    }

    /// Extract issue key from branch name through configured branch pattern.
    pub fn extract_jira_key(&self, branch_name: impl AsRef<str>) -> Option<String> {
        self.pattern.extract(branch_name)
    }

    /// Browse URL of issue.
    pub fn get_jira_url(&self, key: impl AsRef<str>) -> Option<String> {
        if self.base_url.is_empty() || key.as_ref().is_empty() {
            return None;
        }

        Some(format!("{}/browse/{}", self.base_url, key.as_ref()))
    }

    /// URL of page where personal access tokens are generated.
    ///
    /// Returns none while base URL is missing or still the placeholder.
    pub fn token_page_url(&self) -> Option<String> {
        if self.base_url.is_empty() || self.base_url == crate::config::DEFAULT_JIRA_BASE_URL {
            return None;
        }

        Some(format!("{}/{TOKEN_PAGE_PATH}", self.base_url))
    }

    /// Fetch summary of one issue.
    #[instrument(skip(self), level = "debug")]
    pub async fn get_issue_title(&self, key: &str) -> Option<String> {
        if !self.is_configured() || key.is_empty() {
            return None;
        }

        let url = format!("{}/rest/api/2/issue/{key}", self.base_url);
        let payload = match self.transport.get_json(&url, &[], &self.token).await {
            Ok(payload) => payload,
            Err(error) => {
                self.report(&error);
                return None;
            }
        };

        payload
            .pointer("/fields/summary")
            .and_then(Value::as_str)
            .map(ToString::to_string)
    }

    /// Fetch summaries of many issues in one request.
    ///
    /// Issues unknown to Jira are simply absent from the result. An empty
    /// key set returns an empty result without touching the network.
    #[instrument(skip(self, keys), fields(count = keys.len()), level = "debug")]
    pub async fn get_batch_issue_summaries(
        &self,
        keys: &BTreeSet<String>,
    ) -> BTreeMap<String, String> {
        if keys.is_empty() || !self.is_configured() {
            return BTreeMap::new();
        }

        let url = format!("{}/rest/api/2/search", self.base_url);
        let jql = format!(
            "issuekey in ({})",
            keys.iter().map(String::as_str).collect::<Vec<_>>().join(",")
        );
        let query = [
            ("jql", jql),
            ("fields", "summary".to_string()),
            ("maxResults", keys.len().to_string()),
        ];

        let payload = match self.transport.get_json(&url, &query, &self.token).await {
            Ok(payload) => payload,
            Err(error) => {
                self.report(&error);
                return BTreeMap::new();
            }
        };

        let response = match SearchResponse::deserialize(payload) {
            Ok(response) => response,
            Err(error) => {
                warn!("unexpected Jira search response: {error}");
                return BTreeMap::new();
            }
        };

        let summaries = response
            .issues
            .into_iter()
            .filter_map(|issue| {
                let summary = issue.fields.summary.filter(|summary| !summary.is_empty())?;
                Some((issue.key, summary))
            })
            .collect::<BTreeMap<_, _>>();
        debug!("resolved {} of {} issue summaries", summaries.len(), keys.len());

        summaries
    }

    /// Transport that requests go through.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn is_configured(&self) -> bool {
        !self.base_url.is_empty() && !self.token.is_empty()
    }

    fn report(&self, error: &TrackerError) {
        if error.is_unauthorized() {
            self.notifier.error(AUTH_FAILED_MESSAGE);
        }
        warn!("Jira lookup failed: {error}");
    }
}

impl<T> Debug for JiraService<T>
where
    T: JiraTransport + Debug,
{
    fn fmt(&self, fmt: &mut Formatter<'_>) -> FmtResult {
        fmt.debug_struct("JiraService")
            .field("base_url", &self.base_url)
            .field("token", &"<redacted>")
            .field("pattern", &self.pattern)
            .field("transport", &self.transport)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    issues: Vec<SearchIssue>,
}

#[derive(Debug, Deserialize)]
struct SearchIssue {
    key: String,
    #[serde(default)]
    fields: SearchFields,
}

#[derive(Debug, Default, Deserialize)]
struct SearchFields {
    summary: Option<String>,
}

/// All possible error types for Jira access.
#[derive(Debug, thiserror::Error)]
pub enum TrackerError {
    /// Request could not be sent or its response could not be read.
    #[error("{0}")]
    Request(String),

    /// Jira answered with a non-success status code.
    #[error("Jira request failed with status {status}: {body}")]
    Status { status: u16, body: String },

    /// Response body is not valid JSON.
    #[error("Jira response was malformed JSON: {0}")]
    Malformed(#[source] serde_json::Error),
}

impl TrackerError {
    /// Check if Jira rejected the access token.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Status { status: 401, .. })
    }
}

/// Friendly result alias :3
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;
