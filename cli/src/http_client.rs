use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use crate::error::ApiError;

/// One-shot JSON client for the missions API. Every call is a single
/// request: no retries, no backoff.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl Client {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn api_key(&self) -> Result<&str, ApiError> {
        self.api_key.as_deref().ok_or(ApiError::MissingApiKey)
    }

    // Paths are appended verbatim so a base like https://host/v1 keeps its prefix.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn headers(&self) -> Result<HeaderMap, ApiError> {
        let key = self.api_key()?;
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {}", key))
            .map_err(|_| ApiError::InvalidApiKey)?;
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Sends one authenticated request and decodes the JSON response. An
    /// empty success body decodes to `{}`.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, ApiError> {
        let headers = self.headers()?;
        let url = self.url(path);
        debug!(%method, %url, "missions api request");

        let mut req = self.http.request(method, &url).headers(headers);
        if let Some(b) = body.filter(|b| !is_empty_body(b)) {
            req = req.json(b);
        }

        let resp = req.send().await.map_err(|e| ApiError::transport(&e))?;
        let status = resp.status();
        let text = resp.text().await.map_err(|e| ApiError::transport(&e))?;
        debug!(status = status.as_u16(), bytes = text.len(), "missions api response");

        if !status.is_success() {
            return Err(ApiError::http(status, &text));
        }
        if text.trim().is_empty() {
            return Ok(Value::Object(Default::default()));
        }
        serde_json::from_str(&text).map_err(|source| ApiError::InvalidResponse {
            path: path.to_string(),
            source,
        })
    }

    pub async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn patch(&self, path: &str, body: &Value) -> Result<Value, ApiError> {
        self.request(Method::PATCH, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(Method::DELETE, path, None).await
    }
}

fn is_empty_body(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}
