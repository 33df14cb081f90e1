//! Rotation-and-retry fetch wrapper
//!
//! Wraps one upstream call with the credential-failover policy: a 403 from
//! GitHub is treated as quota exhaustion, triggering exactly one rotation to
//! the next pool token and one retry. No further retries regardless of
//! outcome, and no retry on transport failures.
//!
//! Note: GitHub also returns 403 for genuine permission denials (e.g. a
//! blocked user), so those cost one wasted rotation before the error is
//! surfaced.

use std::sync::Arc;

use bytes::Bytes;
use token_pool::TokenPool;
use tracing::warn;

use crate::error::FetchError;
use crate::metrics;
use crate::stats::{RouteKind, Stats};
use crate::upstream::UpstreamClient;

/// Upstream status interpreted as quota exhaustion on the current token.
const QUOTA_EXHAUSTED_STATUS: u16 = 403;

/// Fetcher combining the token pool and the upstream client.
pub struct RotatingFetcher {
    pool: Arc<TokenPool>,
    client: UpstreamClient,
}

impl RotatingFetcher {
    pub fn new(pool: Arc<TokenPool>, client: UpstreamClient) -> Self {
        Self { pool, client }
    }

    /// Fetch `url`, rotating the pool and retrying once on a 403.
    ///
    /// On success the body bytes pass through untouched and the caller
    /// responds 200 regardless of the upstream's exact 2xx status. Every
    /// failure path increments `route`'s error counter before returning.
    pub async fn fetch_with_rotation(
        &self,
        url: &str,
        route: RouteKind,
        stats: &Stats,
    ) -> Result<Bytes, FetchError> {
        let credential = match self.pool.current() {
            Ok(c) => c,
            Err(e) => {
                stats.record_error(route);
                metrics::record_upstream_outcome(false);
                return Err(FetchError::Internal(e.to_string()));
            }
        };

        let mut result = self.client.fetch(url, &credential).await;

        if let Ok(response) = &result
            && response.status == QUOTA_EXHAUSTED_STATUS
        {
            warn!(
                route = route.as_str(),
                "upstream 403, rotating credential and retrying once"
            );
            self.pool.rotate();
            metrics::record_rotation();
            match self.pool.current() {
                Ok(next) => result = self.client.fetch(url, &next).await,
                Err(e) => {
                    // Unreachable in practice: the pool was non-empty above
                    stats.record_error(route);
                    metrics::record_upstream_outcome(false);
                    return Err(FetchError::Internal(e.to_string()));
                }
            }
        }

        match result {
            Ok(response) => {
                if let Some(remaining) = response.rate_limit_remaining {
                    metrics::set_rate_limit_remaining(remaining);
                }
                if (200..300).contains(&response.status) {
                    metrics::record_upstream_outcome(true);
                    Ok(response.body)
                } else {
                    stats.record_error(route);
                    metrics::record_upstream_outcome(false);
                    Err(FetchError::Upstream {
                        status: response.status,
                        body: String::from_utf8_lossy(&response.body).into_owned(),
                    })
                }
            }
            Err(e) => {
                stats.record_error(route);
                metrics::record_upstream_outcome(false);
                Err(FetchError::Internal(e.to_string()))
            }
        }
    }
}
