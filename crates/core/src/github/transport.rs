//! HTTP transport seam for the GitHub client.
//!
//! The client builds fully-formed [`ApiRequest`]s and interprets [`ApiResponse`]s; a
//! [`Transport`] only moves bytes. Retry, backoff and rate-limit handling stay in the client so
//! they can be exercised against a scripted transport.

use crate::GitHubResult;
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Method, StatusCode};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: String,
}

impl ApiResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send one request and return whatever the server answered.
    ///
    /// Non-2xx statuses are a successful transport result; only connection-level failures are
    /// errors.
    async fn send(&self, request: &ApiRequest) -> GitHubResult<ApiResponse>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> GitHubResult<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> GitHubResult<ApiResponse> {
        let mut builder = self
            .client
            .request(request.method.clone(), &request.url)
            .headers(request.headers.clone());
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.text().await?;

        Ok(ApiResponse {
            status,
            headers,
            body,
        })
    }
}
