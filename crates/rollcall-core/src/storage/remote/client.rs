//! HTTP client for the hosted PostgREST endpoint.

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, warn};

use crate::error::{Result, StorageError};

/// HTTP request timeout in seconds.
/// 30s tolerates a slow hosted database while still failing visibly.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting, doubled per retry.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// REST path prefix under the service base URL
const REST_PATH: &str = "rest/v1";

/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        let mut headers = header::HeaderMap::new();
        let key = header::HeaderValue::from_str(api_key).map_err(|_| StorageError::Unauthorized)?;
        let bearer = header::HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|_| StorageError::Unauthorized)?;
        headers.insert("apikey", key);
        headers.insert(header::AUTHORIZATION, bearer);
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/json"),
        );

        let mut builder = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .default_headers(headers);
        if is_loopback(base_url) {
            // A local service stack is never behind the configured proxy
            builder = builder.no_proxy();
        }
        let client = builder.build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub(crate) fn table_url(&self, table: &str) -> String {
        format!("{}/{}/{}", self.base_url, REST_PATH, table)
    }

    /// Check if response is successful.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(response: reqwest::Response) -> Result<Option<reqwest::Response>> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(StorageError::from_status(status, &body))
        }
    }

    /// Send a request built by `build`, rebuilding and retrying it on 429.
    async fn send<F>(&self, table: &str, build: F) -> Result<reqwest::Response>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = build().send().await?;
            match Self::check_response_for_retry(response).await? {
                Some(response) => return Ok(response),
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(StorageError::RateLimited);
                    }
                    warn!(table = table, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2;
                }
            }
        }
    }

    async fn rows<R: DeserializeOwned>(table: &str, response: reqwest::Response) -> Result<Vec<R>> {
        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&body)
            .map_err(|e| StorageError::InvalidResponse(format!("{} rows: {}", table, e)))
    }

    fn request(&self, method: Method, table: &str, params: &[(String, String)]) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .query(params)
    }

    pub async fn select<R: DeserializeOwned>(&self, table: &str, params: &[(String, String)]) -> Result<Vec<R>> {
        debug!(table = table, ?params, "Select");
        let response = self
            .send(table, || self.request(Method::GET, table, params))
            .await?;
        Self::rows(table, response).await
    }

    pub async fn insert<R: DeserializeOwned, B: Serialize + Sync>(&self, table: &str, body: &B) -> Result<Vec<R>> {
        debug!(table = table, "Insert");
        let response = self
            .send(table, || {
                self.request(Method::POST, table, &[])
                    .header("Prefer", "return=representation")
                    .json(body)
            })
            .await?;
        Self::rows(table, response).await
    }

    pub async fn update<R: DeserializeOwned, B: Serialize + Sync>(
        &self,
        table: &str,
        filter: &[(String, String)],
        body: &B,
    ) -> Result<Vec<R>> {
        debug!(table = table, ?filter, "Update");
        let response = self
            .send(table, || {
                self.request(Method::PATCH, table, filter)
                    .header("Prefer", "return=representation")
                    .json(body)
            })
            .await?;
        Self::rows(table, response).await
    }

    pub async fn delete(&self, table: &str, filter: &[(String, String)]) -> Result<()> {
        debug!(table = table, ?filter, "Delete");
        self.send(table, || self.request(Method::DELETE, table, filter))
            .await?;
        Ok(())
    }
}

fn is_loopback(base_url: &str) -> bool {
    let rest = base_url
        .strip_prefix("http://")
        .or_else(|| base_url.strip_prefix("https://"))
        .unwrap_or(base_url);
    let host = rest.split(['/', ':']).next().unwrap_or_default();
    matches!(host, "localhost" | "127.0.0.1")
}
