//! Upstream GitHub API client
//!
//! Issues one authenticated GET per call: fixed User-Agent, bearer
//! authorization from the caller-supplied credential, bounded by the
//! configured timeout. Transport failures (DNS, connection refused, timeout)
//! surface as a distinct `TransportError`; HTTP error statuses are returned
//! to the caller for classification, never mapped here.

use std::time::Duration;

use bytes::Bytes;
use reqwest::header;
use thiserror::Error;

/// Client identifier sent with every upstream request. GitHub rejects
/// requests without a User-Agent.
pub const CLIENT_USER_AGENT: &str = "gitport-proxy";

/// Rate-limit header read opportunistically from every upstream response.
const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";

/// Network-level failure reaching upstream (DNS, refused, timeout).
#[derive(Debug, Error)]
#[error("transport error: {0}")]
pub struct TransportError(#[from] reqwest::Error);

/// One upstream response: status, body bytes, and the headers we care about.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: u16,
    pub body: Bytes,
    /// Parsed `x-ratelimit-remaining`, when present.
    pub rate_limit_remaining: Option<u64>,
}

/// Reqwest wrapper for authenticated GETs against the GitHub REST API.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(client: reqwest::Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Issue a GET for `url` authorized by `credential`.
    pub async fn fetch(
        &self,
        url: &str,
        credential: &str,
    ) -> Result<UpstreamResponse, TransportError> {
        let response = self
            .client
            .get(url)
            .timeout(self.timeout)
            .header(header::USER_AGENT, CLIENT_USER_AGENT)
            .bearer_auth(credential)
            .send()
            .await?;

        let status = response.status().as_u16();
        let rate_limit_remaining = response
            .headers()
            .get(RATE_LIMIT_REMAINING)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            body,
            rate_limit_remaining,
        })
    }
}
