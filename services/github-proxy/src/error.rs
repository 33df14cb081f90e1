//! Service-specific error types

use thiserror::Error;

/// Failures from the upstream fetch path, classified per the client contract.
///
/// `Upstream` carries the final non-2xx status (after at most one
/// rotation-retry) and the raw response body text; route handlers forward
/// the status verbatim and wrap the body in the `{error, details}` envelope.
/// `Internal` covers transport failures and missing credentials; handlers
/// map it to 500. Neither variant ever propagates past a handler.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream returned status {status}")]
    Upstream { status: u16, body: String },

    #[error("{0}")]
    Internal(String),
}
