//! GitHub REST issue source.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use super::{IssuePayload, IssueSource, PageRequest, SourceError, SourcePage};
use crate::config::GitHubSourceConfig;

const ERROR_BODY_LIMIT: usize = 500;

/// GitHub API client configuration
#[derive(Debug, Clone)]
pub struct GitHubApiConfig {
    pub base_url: String,
    pub accept_header: String,
    pub user_agent: String,
    /// Bearer token; anonymous requests when absent
    pub token: Option<String>,
    pub request_timeout: Duration,
    /// Label names of which an issue must carry at least one (exact match);
    /// empty disables label filtering
    pub labels_filter: Vec<String>,
}

impl GitHubApiConfig {
    pub fn from_config(config: &GitHubSourceConfig) -> Self {
        Self {
            base_url: config.api_base.trim_end_matches('/').to_string(),
            accept_header: "application/vnd.github.v3+json".to_string(),
            user_agent: config.user_agent.clone(),
            token: config.token.clone(),
            request_timeout: Duration::from_millis(config.request_timeout_ms),
            labels_filter: config.labels_filter.clone(),
        }
    }
}

/// Issue as returned by `GET /repos/{owner}/{repo}/issues`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubIssue {
    pub id: u64,
    pub number: u64,
    pub title: String,
    pub state: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub html_url: String,
    #[serde(default)]
    pub labels: Vec<GitHubLabel>,
    /// Present only on pull requests, which the endpoint mixes in with issues
    pub pull_request: Option<GitHubPullRequestLink>,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubLabel {
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GitHubPullRequestLink {
    #[serde(default)]
    pub html_url: Option<String>,
}

impl GitHubIssue {
    pub fn is_pull_request(&self) -> bool {
        self.pull_request.is_some()
    }

    pub fn has_any_label(&self, allowed: &[String]) -> bool {
        self.labels
            .iter()
            .any(|label| allowed.iter().any(|wanted| wanted == &label.name))
    }

    pub fn into_payload(self) -> IssuePayload {
        IssuePayload {
            source_issue_id: self.id,
            number: self.number,
            title: self.title,
            body: self.body.unwrap_or_default(),
            state: self.state,
            labels: self.labels.into_iter().map(|label| label.name).collect(),
            html_url: self.html_url,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Drop pull requests and, when an allow-list is set, issues without an allowed
/// label. Upstream order is kept.
pub fn retain_eligible(raw: Vec<GitHubIssue>, allowed: &[String]) -> Vec<IssuePayload> {
    raw.into_iter()
        .filter(|issue| !issue.is_pull_request())
        .filter(|issue| allowed.is_empty() || issue.has_any_label(allowed))
        .map(GitHubIssue::into_payload)
        .collect()
}

/// Paginated reader over a repository's open GitHub issues
#[derive(Clone)]
pub struct GitHubIssueSource {
    client: reqwest::Client,
    api_config: GitHubApiConfig,
}

impl GitHubIssueSource {
    pub fn new(api_config: GitHubApiConfig) -> Result<Self, SourceError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_str(&api_config.accept_header)
                .map_err(|err| SourceError::Config(format!("accept header: {}", err)))?,
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&api_config.user_agent)
                .map_err(|err| SourceError::Config(format!("user agent: {}", err)))?,
        );
        if let Some(token) = api_config.token.as_deref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| SourceError::Config("token is not a valid header value".into()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(api_config.request_timeout)
            .build()?;

        Ok(Self { client, api_config })
    }

    fn issues_url(&self, owner: &str, name: &str, request: &PageRequest) -> Result<Url, SourceError> {
        let mut url = Url::parse(&format!(
            "{}/repos/{}/{}/issues",
            self.api_config.base_url, owner, name
        ))?;
        url.query_pairs_mut()
            .append_pair("state", "open")
            .append_pair("per_page", &request.per_page.to_string())
            .append_pair("page", &request.page.to_string())
            .append_pair("sort", request.sort.as_str())
            .append_pair("direction", request.direction.as_str());
        Ok(url)
    }

    async fn fetch_raw(
        &self,
        owner: &str,
        name: &str,
        request: &PageRequest,
    ) -> Result<Vec<GitHubIssue>, SourceError> {
        let url = self.issues_url(owner, name, request)?;
        debug!(%url, "Fetching GitHub issues page");

        let response = self.client.get(url).send().await?;
        let status = response.status();

        if status.is_success() {
            let body = response.text().await?;
            return Ok(serde_json::from_str(&body)?);
        }

        let rate_limit_exhausted = response
            .headers()
            .get("X-RateLimit-Remaining")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.trim() == "0");

        if status.as_u16() == 429 || (status.as_u16() == 403 && rate_limit_exhausted) {
            let reset_at = response
                .headers()
                .get("X-RateLimit-Reset")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|timestamp| DateTime::from_timestamp(timestamp, 0));
            warn!(owner, name, ?reset_at, "Rate limited by GitHub API");
            return Err(SourceError::RateLimited { reset_at });
        }

        let body = response.text().await.unwrap_or_default();
        let message: String = body.chars().take(ERROR_BODY_LIMIT).collect();
        warn!(owner, name, status = status.as_u16(), "GitHub API request failed");
        Err(SourceError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl IssueSource for GitHubIssueSource {
    async fn fetch_page(
        &self,
        owner: &str,
        name: &str,
        request: &PageRequest,
    ) -> Result<SourcePage, SourceError> {
        let raw = self.fetch_raw(owner, name, request).await?;
        let raw_count = raw.len();
        let issues = retain_eligible(raw, &self.api_config.labels_filter);

        debug!(
            owner,
            name,
            page = request.page,
            raw_count,
            eligible = issues.len(),
            "Filtered GitHub issues page"
        );

        Ok(SourcePage { raw_count, issues })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn api_config(base_url: &str, token: Option<&str>) -> GitHubApiConfig {
        GitHubApiConfig {
            base_url: base_url.to_string(),
            accept_header: "application/vnd.github.v3+json".to_string(),
            user_agent: "BeginnerContributeApp".to_string(),
            token: token.map(str::to_string),
            request_timeout: Duration::from_secs(10),
            labels_filter: vec!["good first issue".to_string(), "help wanted".to_string()],
        }
    }

    fn issue_json(id: u64, number: u64, labels: &[&str], is_pr: bool) -> serde_json::Value {
        let mut value = json!({
            "id": id,
            "number": number,
            "title": format!("Issue {}", number),
            "state": "open",
            "created_at": "2024-01-01T00:00:00Z",
            "updated_at": "2024-01-02T00:00:00Z",
            "html_url": format!("https://github.com/o/r/issues/{}", number),
            "labels": labels.iter().map(|name| json!({"name": name, "color": "7057ff"})).collect::<Vec<_>>(),
            "body": null
        });
        if is_pr {
            value["pull_request"] = json!({"html_url": format!("https://github.com/o/r/pull/{}", number)});
        }
        value
    }

    #[tokio::test]
    async fn fetch_page_sends_expected_request_and_filters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/issues"))
            .and(query_param("state", "open"))
            .and(query_param("per_page", "50"))
            .and(query_param("page", "2"))
            .and(query_param("sort", "updated"))
            .and(query_param("direction", "desc"))
            .and(header("accept", "application/vnd.github.v3+json"))
            .and(header("user-agent", "BeginnerContributeApp"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                issue_json(11, 1, &["good first issue"], false),
                issue_json(12, 2, &["good first issue"], true),
                issue_json(13, 3, &["Good First Issue"], false),
                issue_json(14, 4, &["bug", "help wanted"], false),
                issue_json(15, 5, &[], false),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let source = GitHubIssueSource::new(api_config(&server.uri(), Some("secret-token"))).unwrap();
        let page = source
            .fetch_page("octo", "widgets", &PageRequest::new(2, 50))
            .await
            .unwrap();

        assert_eq!(page.raw_count, 5);
        let numbers: Vec<u64> = page.issues.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 4]);
        assert_eq!(page.issues[0].body, "");
        assert_eq!(page.issues[1].labels, vec!["bug", "help wanted"]);
        assert_eq!(page.issues[1].document_id("r"), "r_14");
    }

    #[tokio::test]
    async fn anonymous_requests_omit_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/repos/octo/widgets/issues"))
            .respond_with(move |request: &wiremock::Request| {
                if request.headers.contains_key("authorization") {
                    ResponseTemplate::new(400)
                } else {
                    ResponseTemplate::new(200).set_body_json(json!([]))
                }
            })
            .mount(&server)
            .await;

        let source = GitHubIssueSource::new(api_config(&server.uri(), None)).unwrap();
        let page = source
            .fetch_page("octo", "widgets", &PageRequest::new(1, 50))
            .await
            .unwrap();
        assert_eq!(page.raw_count, 0);
        assert!(page.issues.is_empty());
    }

    #[tokio::test]
    async fn non_success_status_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let source = GitHubIssueSource::new(api_config(&server.uri(), None)).unwrap();
        let err = source
            .fetch_page("octo", "missing", &PageRequest::new(1, 50))
            .await
            .unwrap_err();

        match err {
            SourceError::Status { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "Not Found");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn exhausted_rate_limit_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(403)
                    .insert_header("X-RateLimit-Remaining", "0")
                    .insert_header("X-RateLimit-Reset", "1700000000"),
            )
            .mount(&server)
            .await;

        let source = GitHubIssueSource::new(api_config(&server.uri(), None)).unwrap();
        let err = source
            .fetch_page("octo", "widgets", &PageRequest::new(1, 50))
            .await
            .unwrap_err();

        assert!(err.is_rate_limited());
        match err {
            SourceError::RateLimited { reset_at } => {
                assert_eq!(reset_at, DateTime::from_timestamp(1_700_000_000, 0));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn malformed_body_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let source = GitHubIssueSource::new(api_config(&server.uri(), None)).unwrap();
        let err = source
            .fetch_page("octo", "widgets", &PageRequest::new(1, 50))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::Decode(_)));
    }

    #[test]
    fn empty_allow_list_keeps_every_issue_but_pull_requests() {
        let raw: Vec<GitHubIssue> = serde_json::from_value(json!([
            issue_json(1, 1, &[], false),
            issue_json(2, 2, &["bug"], false),
            issue_json(3, 3, &["good first issue"], true),
        ]))
        .unwrap();

        let kept = retain_eligible(raw, &[]);
        let numbers: Vec<u64> = kept.iter().map(|i| i.number).collect();
        assert_eq!(numbers, vec![1, 2]);
    }

    #[test]
    fn from_config_trims_trailing_slash() {
        let config = GitHubSourceConfig {
            api_base: "https://api.github.com/".to_string(),
            ..GitHubSourceConfig::default()
        };
        let api = GitHubApiConfig::from_config(&config);
        assert_eq!(api.base_url, "https://api.github.com");
        assert_eq!(api.accept_header, "application/vnd.github.v3+json");
        assert_eq!(api.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn invalid_token_is_rejected() {
        let err = GitHubIssueSource::new(api_config("http://localhost", Some("bad\ntoken")))
            .err()
            .unwrap();
        assert!(matches!(err, SourceError::Config(_)));
    }
}
