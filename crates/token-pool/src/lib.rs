//! Credential pool for GitHub API tokens
//!
//! Holds an ordered list of bearer tokens and a rotation cursor. The proxy
//! rotates to the next token when GitHub signals quota exhaustion on the
//! current one, routing around per-credential rate limits.
//!
//! The pool knows nothing about HTTP. Callers read the current token with
//! [`TokenPool::current`] and advance the cursor with [`TokenPool::rotate`];
//! both are safe under concurrent request handling.

pub mod error;
pub mod pool;

pub use error::{Error, Result};
pub use pool::TokenPool;
