//! HTTP transport seam.
//!
//! Remote clients talk to the network through [`HttpTransport`] so that the
//! fallback chains built on top of it can be tested without sockets.  A
//! non-2xx status is a normal [`HttpResponse`]; only transport failures are
//! errors.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::{KernelError, Result};

/// User agent sent with every request.
const USER_AGENT: &str = concat!("SkillPad/", env!("CARGO_PKG_VERSION"));

/// HTTP verbs used by SkillPad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Head,
    Post,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Get => "GET",
            Self::Head => "HEAD",
            Self::Post => "POST",
        })
    }
}

/// An outgoing request.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub json: Option<Value>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    pub fn post_json(url: impl Into<String>, body: Value) -> Self {
        let mut req = Self::new(HttpMethod::Post, url);
        req.json = Some(body);
        req
    }

    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            json: None,
        }
    }

    /// Add a request header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A response that arrived, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// 2xx.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Canonical reason phrase, e.g. `Not Found`.
    pub fn reason(&self) -> String {
        reqwest::StatusCode::from_u16(self.status)
            .ok()
            .and_then(|s| s.canonical_reason())
            .map(str::to_owned)
            .unwrap_or_else(|| format!("HTTP {}", self.status))
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        serde_json::from_str(&self.body).map_err(|e| KernelError::Decode {
            url: url.to_owned(),
            reason: e.to_string(),
        })
    }
}

/// Sends requests and returns whatever the server answered.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// [`HttpTransport`] backed by a shared `reqwest::Client`.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with the SkillPad user agent.
    ///
    /// No request timeout is configured; reqwest's connect defaults apply.
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| KernelError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    /// Wrap an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Post => reqwest::Method::POST,
        };

        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.json {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| KernelError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = if request.method == HttpMethod::Head {
            String::new()
        } else {
            response
                .text()
                .await
                .map_err(|e| KernelError::Transport(e.to_string()))?
        };

        debug!(method = %request.method, url = %request.url, status, "http response");
        Ok(HttpResponse { status, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(301, "").is_success());
        assert!(!HttpResponse::new(404, "").is_success());
    }

    #[test]
    fn reason_phrases() {
        assert_eq!(HttpResponse::new(404, "").reason(), "Not Found");
        assert_eq!(HttpResponse::new(500, "").reason(), "Internal Server Error");
        assert_eq!(HttpResponse::new(599, "").reason(), "HTTP 599");
    }

    #[test]
    fn json_decode_error_names_url() {
        let resp = HttpResponse::new(200, "not json");
        let err = resp.json::<Value>("https://example.com/x").unwrap_err();
        assert!(err.to_string().contains("https://example.com/x"));
    }

    #[test]
    fn post_json_carries_body() {
        let req = HttpRequest::post_json("https://example.com", serde_json::json!({"a": 1}))
            .header("Accept", "application/json");
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.json, Some(serde_json::json!({"a": 1})));
        assert_eq!(req.headers.len(), 1);
    }
}
