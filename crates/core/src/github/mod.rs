//! GitHub REST client for a single repository.
//!
//! Every operation funnels through one request loop ([`GitHubClient::api_call`]) that applies
//! the failure policy:
//!
//! - **Rate limited** (`403` with `x-ratelimit-remaining: 0` and a reset time): sleep until the
//!   reset plus a one second pad, then resend. These waits do not consume retry attempts.
//! - **Transient** (any status `>= 500`, or `429`): exponential backoff, `1.5s * 2^(attempt-1)`, for at most
//!   five attempts in total.
//! - **Not found** (`404`): surfaced as [`GitHubError::NotFound`]; file reads turn it into
//!   `None`.
//! - Anything else is fatal and returned with the status and response body.
//!
//! The multi-file commit sequence lives in [`batch`].

pub mod batch;
pub mod transport;
pub mod types;

use crate::config::GitHubConfig;
use crate::constants::GITHUB_API_VERSION;
use crate::{GitHubError, GitHubResult};
use base64::{engine::general_purpose, Engine as _};
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT,
};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::time::Duration;

pub use batch::{
    BatchCommit, BlobsWritten, CommitWritten, HeadRead, Pending, RefUpdated, TreeRead,
    TreeWritten,
};
pub use transport::{ApiRequest, ApiResponse, ReqwestTransport, Transport};
pub use types::{
    BatchFile, BlobContent, CommitInfo, FileCommit, FileContent, RepoInfo, ShaRef, TreeEntry,
};

use types::ContentsEntry;

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";

/// Retry and rate-limit timing used by [`GitHubClient`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts for transient failures, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: u32,
    /// Added on top of the time remaining until the rate-limit reset.
    pub rate_limit_padding: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_millis(1500),
            backoff_factor: 2,
            rate_limit_padding: Duration::from_millis(1000),
        }
    }
}

impl RetryPolicy {
    /// Backoff before retrying after a transient failure on `attempt` (1-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = self
            .backoff_factor
            .saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }

    /// Wait until a rate-limit window resets. `reset_epoch_secs` is the header value and
    /// `now_ms` the current unix time in milliseconds.
    pub fn rate_limit_wait(&self, reset_epoch_secs: i64, now_ms: i64) -> Duration {
        let remaining_ms = reset_epoch_secs
            .saturating_mul(1000)
            .saturating_sub(now_ms)
            .max(0);
        Duration::from_millis(remaining_ms as u64) + self.rate_limit_padding
    }
}

/// What the request loop does after a non-2xx response.
#[derive(Debug)]
enum NextStep {
    /// Sleep, then resend without consuming an attempt.
    WaitForRateLimit(Duration),
    /// Sleep, then resend as the next attempt.
    Retry(Duration),
    Fail(GitHubError),
}

fn next_step(policy: &RetryPolicy, response: &ApiResponse, attempt: u32, now_ms: i64) -> NextStep {
    let status = response.status;

    if status == StatusCode::FORBIDDEN && response.header(RATE_LIMIT_REMAINING) == Some("0") {
        return match response
            .header(RATE_LIMIT_RESET)
            .and_then(|v| v.trim().parse::<i64>().ok())
        {
            Some(reset) => NextStep::WaitForRateLimit(policy.rate_limit_wait(reset, now_ms)),
            None => NextStep::Fail(GitHubError::RateLimited {
                status: status.as_u16(),
                body: response.body.clone(),
            }),
        };
    }

    let retriable = status.as_u16() >= 500 || status == StatusCode::TOO_MANY_REQUESTS;
    if retriable {
        if attempt < policy.max_attempts {
            return NextStep::Retry(policy.delay_for_attempt(attempt));
        }
        return NextStep::Fail(GitHubError::Transient {
            status: status.as_u16(),
            body: response.body.clone(),
        });
    }

    if status == StatusCode::NOT_FOUND {
        return NextStep::Fail(GitHubError::NotFound {
            body: response.body.clone(),
        });
    }

    NextStep::Fail(GitHubError::Fatal {
        status: status.as_u16(),
        body: response.body.clone(),
    })
}

/// Authenticated client bound to one repository.
pub struct GitHubClient<T = ReqwestTransport> {
    config: GitHubConfig,
    transport: T,
    retry: RetryPolicy,
}

impl GitHubClient<ReqwestTransport> {
    /// Create a client that talks to GitHub over HTTPS.
    pub fn new(config: GitHubConfig) -> GitHubResult<Self> {
        Ok(Self::with_transport(config, ReqwestTransport::new()?))
    }
}

impl<T: Transport> GitHubClient<T> {
    pub fn with_transport(config: GitHubConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn config(&self) -> &GitHubConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn build_request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<&Value>,
    ) -> GitHubResult<ApiRequest> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {}", self.config.token()))
            .map_err(|e| GitHubError::InvalidRequest(format!("invalid token header: {e}")))?;
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("reports-admin/", env!("CARGO_PKG_VERSION"))),
        );
        headers.insert(
            HeaderName::from_static("x-github-api-version"),
            HeaderValue::from_static(GITHUB_API_VERSION),
        );

        Ok(ApiRequest {
            method,
            url: format!("{}{}", self.config.api_base_url(), endpoint),
            headers,
            body: body.map(Value::to_string),
        })
    }

    /// Issue one API call with the retry and rate-limit policy applied.
    ///
    /// A 2xx with an empty body decodes from `{}`.
    pub async fn api_call<R: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<Value>,
    ) -> GitHubResult<R> {
        let request = self.build_request(method, endpoint, body.as_ref())?;
        let mut attempt: u32 = 1;

        loop {
            let response = self.transport.send(&request).await?;

            if response.status.is_success() {
                let value = if response.body.trim().is_empty() {
                    Value::Object(Default::default())
                } else {
                    serde_json::from_str(&response.body)?
                };
                return Ok(serde_json::from_value(value)?);
            }

            let now_ms = chrono::Utc::now().timestamp_millis();
            match next_step(&self.retry, &response, attempt, now_ms) {
                NextStep::WaitForRateLimit(wait) => {
                    tracing::warn!(
                        "GitHub rate limit hit on {} {}, waiting {:.1}s",
                        request.method,
                        endpoint,
                        wait.as_secs_f64()
                    );
                    tokio::time::sleep(wait).await;
                }
                NextStep::Retry(delay) => {
                    tracing::warn!(
                        "GitHub API call failed ({}), retry {} of {} in {}ms",
                        response.status.as_u16(),
                        attempt,
                        self.retry.max_attempts - 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                NextStep::Fail(err) => return Err(err),
            }
        }
    }

    pub async fn get_repo_info(&self) -> GitHubResult<RepoInfo> {
        self.api_call(Method::GET, &self.config.repo_path(), None)
            .await
    }

    /// Fetch and decode a file.
    ///
    /// Returns `Ok(None)` when the path does not exist or is not a file. Every other failure is
    /// propagated.
    pub async fn get_file_content(&self, path: &str) -> GitHubResult<Option<FileContent>> {
        let endpoint = format!("{}/contents/{}", self.config.repo_path(), path);
        let entry: ContentsEntry = match self.api_call(Method::GET, &endpoint, None).await {
            Ok(entry) => entry,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        let Some(encoded) = entry.content else {
            return Ok(None);
        };

        Ok(Some(FileContent {
            content: decode_content(&encoded)?,
            sha: entry.sha,
            path: entry.path,
            name: entry.name,
        }))
    }

    /// Create a file, or update it when `sha` names its current blob.
    pub async fn create_or_update_file(
        &self,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> GitHubResult<FileCommit> {
        let endpoint = format!("{}/contents/{}", self.config.repo_path(), path);
        let mut body = json!({
            "message": message,
            "content": general_purpose::STANDARD.encode(content.as_bytes()),
        });
        if let Some(sha) = sha {
            body["sha"] = Value::String(sha.to_string());
        }

        self.api_call(Method::PUT, &endpoint, Some(body)).await
    }

    pub async fn delete_file(&self, path: &str, sha: &str, message: &str) -> GitHubResult<FileCommit> {
        let endpoint = format!("{}/contents/{}", self.config.repo_path(), path);
        let body = json!({ "message": message, "sha": sha });

        self.api_call(Method::DELETE, &endpoint, Some(body)).await
    }

    /// Write several files in one commit on the main branch.
    ///
    /// See [`BatchCommit`] for the step sequence and its failure semantics.
    pub async fn batch_commit(&self, files: &[BatchFile], message: &str) -> GitHubResult<CommitInfo> {
        if files.is_empty() {
            return Err(GitHubError::InvalidRequest(
                "batch commit needs at least one file".into(),
            ));
        }

        let commit = BatchCommit::start(self, message)
            .read_head()
            .await?
            .read_base_tree()
            .await?
            .write_blobs(files)
            .await?
            .write_tree()
            .await?
            .write_commit()
            .await?
            .update_ref()
            .await?
            .into_commit();

        tracing::info!(
            "committed {} file(s) to {} as {}",
            files.len(),
            self.config.repo_path(),
            commit.sha
        );
        Ok(commit)
    }
}

/// Decode contents-API base64, which GitHub wraps at 60 columns.
fn decode_content(encoded: &str) -> GitHubResult<String> {
    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = general_purpose::STANDARD.decode(compact)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedTransport;
    use crate::ErrorKind;

    fn client(transport: ScriptedTransport) -> GitHubClient<ScriptedTransport> {
        let cfg = GitHubConfig::new("octo", "site", "ghp_test", Some("https://gh.test".into()))
            .expect("config should be valid");
        GitHubClient::with_transport(cfg, transport)
    }

    fn response(status: u16, body: &str) -> ApiResponse {
        ApiResponse {
            status: StatusCode::from_u16(status).unwrap(),
            headers: HeaderMap::new(),
            body: body.to_string(),
        }
    }

    fn rate_limited(reset: &str) -> ApiResponse {
        let mut resp = response(403, "API rate limit exceeded");
        resp.headers
            .insert(RATE_LIMIT_REMAINING, HeaderValue::from_static("0"));
        resp.headers
            .insert(RATE_LIMIT_RESET, HeaderValue::from_str(reset).unwrap());
        resp
    }

    #[test]
    fn backoff_doubles_from_one_and_a_half_seconds() {
        let policy = RetryPolicy::default();
        let delays: Vec<u128> = (1..=5)
            .map(|a| policy.delay_for_attempt(a).as_millis())
            .collect();
        assert_eq!(delays, vec![1500, 3000, 6000, 12000, 24000]);
    }

    #[test]
    fn rate_limit_wait_is_time_to_reset_plus_pad() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.rate_limit_wait(1_700_000_010, 1_700_000_000_000),
            Duration::from_millis(11_000)
        );
        // A reset in the past still waits the pad.
        assert_eq!(
            policy.rate_limit_wait(1_600_000_000, 1_700_000_000_000),
            Duration::from_millis(1000)
        );
    }

    #[test]
    fn next_step_classifies_responses() {
        let policy = RetryPolicy::default();

        for attempt in 1..5 {
            match next_step(&policy, &response(503, ""), attempt, 0) {
                NextStep::Retry(d) => {
                    assert_eq!(d.as_millis(), 1500 * 2u128.pow(attempt - 1));
                }
                other => panic!("expected retry, got {other:?}"),
            }
        }

        assert!(matches!(
            next_step(&policy, &response(503, "down"), 5, 0),
            NextStep::Fail(GitHubError::Transient { status: 503, .. })
        ));
        assert!(matches!(
            next_step(&policy, &response(429, ""), 1, 0),
            NextStep::Retry(_)
        ));
        // Non-standard codes above 599 are still server-side failures.
        assert!(matches!(
            next_step(&policy, &response(600, ""), 1, 0),
            NextStep::Retry(_)
        ));
        assert!(matches!(
            next_step(&policy, &response(999, "edge"), 5, 0),
            NextStep::Fail(GitHubError::Transient { status: 999, .. })
        ));
        assert!(matches!(
            next_step(&policy, &response(404, ""), 1, 0),
            NextStep::Fail(GitHubError::NotFound { .. })
        ));
        assert!(matches!(
            next_step(&policy, &response(422, ""), 1, 0),
            NextStep::Fail(GitHubError::Fatal { status: 422, .. })
        ));
        // A plain 403 is a permissions problem, not a rate limit.
        assert!(matches!(
            next_step(&policy, &response(403, "forbidden"), 1, 0),
            NextStep::Fail(GitHubError::Fatal { status: 403, .. })
        ));
    }

    #[test]
    fn exhausted_quota_without_reset_is_rate_limited_error() {
        let mut resp = response(403, "limit");
        resp.headers
            .insert(RATE_LIMIT_REMAINING, HeaderValue::from_static("0"));

        match next_step(&RetryPolicy::default(), &resp, 1, 0) {
            NextStep::Fail(err) => assert_eq!(err.kind(), Some(ErrorKind::RateLimited)),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn requests_carry_auth_and_json_headers() {
        let transport = ScriptedTransport::new();
        transport.push_body(200, r#"{"name":"site","full_name":"octo/site","private":true,"default_branch":"main"}"#);
        let client = client(transport);

        let info = client.get_repo_info().await.unwrap();
        assert_eq!(info.full_name, "octo/site");
        assert!(info.private);

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 1);
        let req = &requests[0];
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.url, "https://gh.test/repos/octo/site");
        assert_eq!(req.headers[AUTHORIZATION], "Bearer ghp_test");
        assert_eq!(req.headers[ACCEPT], "application/vnd.github+json");
        assert!(req.headers.contains_key(USER_AGENT));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transient_failures_with_exponential_backoff() {
        let transport = ScriptedTransport::new();
        transport.push_body(503, "unavailable");
        transport.push_body(502, "bad gateway");
        transport.push_body(200, r#"{"name":"site","full_name":"octo/site"}"#);
        let client = client(transport);

        let start = tokio::time::Instant::now();
        let info = client.get_repo_info().await.unwrap();

        assert_eq!(info.name, "site");
        assert_eq!(start.elapsed(), Duration::from_millis(1500 + 3000));
        assert_eq!(client.transport().requests().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_five_attempts() {
        let transport = ScriptedTransport::new();
        for _ in 0..5 {
            transport.push_body(503, "still down");
        }
        let client = client(transport);

        let start = tokio::time::Instant::now();
        let err = client.get_repo_info().await.unwrap_err();

        assert_eq!(err.kind(), Some(ErrorKind::Transient));
        assert_eq!(err.status(), Some(503));
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("still down"));
        assert_eq!(client.transport().requests().len(), 5);
        assert_eq!(
            start.elapsed(),
            Duration::from_millis(1500 + 3000 + 6000 + 12000)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_waits_do_not_consume_attempts() {
        let transport = ScriptedTransport::new();
        // Reset in the past: each wait is exactly the one second pad.
        for _ in 0..6 {
            transport.push(rate_limited("0"));
        }
        transport.push_body(200, r#"{"name":"site","full_name":"octo/site"}"#);
        let client = client(transport);

        let start = tokio::time::Instant::now();
        client.get_repo_info().await.unwrap();

        let requests = client.transport().requests();
        assert_eq!(requests.len(), 7);
        assert!(requests.iter().all(|r| r.url == requests[0].url));
        assert_eq!(start.elapsed(), Duration::from_millis(6 * 1000));
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_then_transient_keeps_full_retry_budget() {
        let transport = ScriptedTransport::new();
        transport.push(rate_limited("0"));
        for _ in 0..4 {
            transport.push_body(500, "boom");
        }
        transport.push_body(200, r#"{"name":"site","full_name":"octo/site"}"#);
        let client = client(transport);

        client.get_repo_info().await.unwrap();
        assert_eq!(client.transport().requests().len(), 6);
    }

    #[tokio::test]
    async fn fatal_status_is_not_retried() {
        let transport = ScriptedTransport::new();
        transport.push_body(401, r#"{"message":"Bad credentials"}"#);
        let client = client(transport);

        let err = client.get_repo_info().await.unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Fatal));
        assert_eq!(err.status(), Some(401));
        assert!(err.to_string().contains("Bad credentials"));
        assert_eq!(client.transport().requests().len(), 1);
    }

    #[tokio::test]
    async fn get_file_content_decodes_wrapped_base64() {
        let transport = ScriptedTransport::new();
        let encoded = general_purpose::STANDARD.encode("<h1>Hello</h1>\n");
        let wrapped = format!("{}\n{}\n", &encoded[..8], &encoded[8..]);
        transport.push_body(
            200,
            &json!({
                "content": wrapped,
                "sha": "blob1",
                "path": "reports/a.html",
                "name": "a.html",
                "encoding": "base64",
            })
            .to_string(),
        );
        let client = client(transport);

        let file = client
            .get_file_content("reports/a.html")
            .await
            .unwrap()
            .expect("file should exist");
        assert_eq!(file.content, "<h1>Hello</h1>\n");
        assert_eq!(file.sha, "blob1");
        assert_eq!(file.name, "a.html");
        assert_eq!(
            client.transport().requests()[0].url,
            "https://gh.test/repos/octo/site/contents/reports/a.html"
        );
    }

    #[tokio::test]
    async fn get_file_content_maps_404_to_none() {
        let transport = ScriptedTransport::new();
        transport.push_body(404, r#"{"message":"Not Found"}"#);
        let client = client(transport);

        assert!(client.get_file_content("missing.json").await.unwrap().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn get_file_content_propagates_server_errors() {
        let transport = ScriptedTransport::new();
        for _ in 0..5 {
            transport.push_body(500, "oops");
        }
        let client = client(transport);

        let err = client.get_file_content("data.json").await.unwrap_err();
        assert_eq!(err.status(), Some(500));
    }

    #[tokio::test]
    async fn create_or_update_sends_sha_only_when_given() {
        let transport = ScriptedTransport::new();
        transport.push_body(201, r#"{"content":{"sha":"new"},"commit":{"sha":"c1"}}"#);
        transport.push_body(200, r#"{"content":{"sha":"newer"},"commit":{"sha":"c2"}}"#);
        let client = client(transport);

        let created = client
            .create_or_update_file("a.txt", "hi", "add a", None)
            .await
            .unwrap();
        assert_eq!(created.content.unwrap().sha, "new");
        client
            .create_or_update_file("a.txt", "hi again", "edit a", Some("new"))
            .await
            .unwrap();

        let requests = client.transport().requests();
        let first: Value = serde_json::from_str(requests[0].body.as_deref().unwrap()).unwrap();
        let second: Value = serde_json::from_str(requests[1].body.as_deref().unwrap()).unwrap();
        assert_eq!(requests[0].method, Method::PUT);
        assert_eq!(first["content"], general_purpose::STANDARD.encode("hi"));
        assert!(first.get("sha").is_none());
        assert_eq!(second["sha"], "new");
    }

    #[tokio::test]
    async fn delete_file_sends_sha_and_accepts_empty_body() {
        let transport = ScriptedTransport::new();
        transport.push_body(200, "");
        let client = client(transport);

        let result = client.delete_file("a.txt", "abc", "remove a").await.unwrap();
        assert_eq!(result, FileCommit::default());

        let requests = client.transport().requests();
        let req = &requests[0];
        assert_eq!(req.method, Method::DELETE);
        let body: Value = serde_json::from_str(req.body.as_deref().unwrap()).unwrap();
        assert_eq!(body, json!({"message": "remove a", "sha": "abc"}));
    }
}
