// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Jira REST v2 page source.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use trawl_core::{RemoteItem, SyncTarget};

use super::{Page, PageRequest, PageSource, SourceError, SourceResult};
use crate::config::SourceConfig;

const SEARCH_PATH: &str = "/rest/api/2/search";
const PROJECT_PATH: &str = "/rest/api/2/project";
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Clone)]
enum Auth {
    Basic { user: String, token: String },
    Bearer(String),
    Anonymous,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    issues: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct ProjectEntry {
    key: String,
    #[serde(default)]
    name: Option<String>,
}

/// Client for a Jira-compatible tracker.
#[derive(Debug, Clone)]
pub struct JiraSource {
    client: reqwest::Client,
    base_url: String,
    auth: Auth,
}

impl JiraSource {
    pub fn new(
        base_url: &str,
        user: Option<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> SourceResult<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        let auth = match (user, token) {
            (Some(user), Some(token)) => Auth::Basic { user, token },
            (None, Some(token)) => Auth::Bearer(token),
            _ => Auth::Anonymous,
        };
        Ok(JiraSource {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn from_config(config: &SourceConfig) -> SourceResult<Self> {
        Self::new(
            &config.url,
            config.user.clone(),
            config.token.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        let builder = self.client.get(format!("{}{}", self.base_url, path));
        match &self.auth {
            Auth::Basic { user, token } => builder.basic_auth(user, Some(token)),
            Auth::Bearer(token) => builder.bearer_auth(token),
            Auth::Anonymous => builder,
        }
    }

    async fn search(&self, request: &PageRequest) -> SourceResult<Page> {
        let jql = build_jql(&request.target_id, request.updated_since, Utc::now());
        tracing::debug!(
            target_id = %request.target_id,
            offset = request.offset,
            %jql,
            "fetching page"
        );

        let start_at = request.offset.to_string();
        let max_results = request.page_size.to_string();
        let response = self
            .get(SEARCH_PATH)
            .query(&[
                ("jql", jql.as_str()),
                ("startAt", start_at.as_str()),
                ("maxResults", max_results.as_str()),
                ("expand", "changelog"),
                ("fields", "*all"),
            ])
            .send()
            .await?;
        let body: SearchResponse = parse_response(response).await?;

        let items = body
            .issues
            .into_iter()
            .map(|issue| {
                RemoteItem::from_payload(&request.target_id, issue)
                    .map_err(|e| SourceError::InvalidItem(e.to_string()))
            })
            .collect::<SourceResult<Vec<_>>>()?;

        Ok(Page {
            items,
            total: body.total,
        })
    }

    async fn projects(&self) -> SourceResult<Vec<SyncTarget>> {
        let response = self.get(PROJECT_PATH).send().await?;
        let projects: Vec<ProjectEntry> = parse_response(response).await?;
        Ok(projects
            .into_iter()
            .map(|p| SyncTarget::discovered(p.key, p.name))
            .collect())
    }
}

impl PageSource for JiraSource {
    fn fetch_page(&self, request: PageRequest) -> BoxFuture<'_, SourceResult<Page>> {
        Box::pin(async move { self.search(&request).await })
    }

    fn list_targets(&self) -> BoxFuture<'_, SourceResult<Vec<SyncTarget>>> {
        Box::pin(self.projects())
    }
}

/// JQL selecting one project in ascending update order.
///
/// Absolute JQL dates are read in the user's profile timezone, so the lower
/// bound is sent as a relative offset (`-Nm`) from `now`, rounded up to a
/// whole minute. Rounding and the time between requests only widen the window.
pub(crate) fn build_jql(
    target_id: &str,
    updated_since: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> String {
    let project = target_id.replace('\\', "\\\\").replace('"', "\\\"");
    match updated_since {
        Some(since) => format!(
            "project = \"{}\" AND updated >= \"-{}m\" ORDER BY updated ASC, key ASC",
            project,
            minutes_since(since, now)
        ),
        None => format!("project = \"{}\" ORDER BY updated ASC, key ASC", project),
    }
}

/// Minutes from `since` to `now`, rounded up past any partial minute. Zero
/// when `since` is not in the past.
fn minutes_since(since: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    let millis = now.signed_duration_since(since).num_milliseconds();
    if millis <= 0 {
        return 0;
    }
    millis / 60_000 + 1
}

async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> SourceResult<T> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        let mut preview: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        if body.chars().count() > MAX_ERROR_BODY_CHARS {
            preview.push_str("...");
        }
        return Err(SourceError::Status {
            status: status.as_u16(),
            body: preview,
        });
    }

    serde_json::from_str(&body).map_err(|e| SourceError::InvalidResponse(e.to_string()))
}
