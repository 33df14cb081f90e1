//! Round-robin token selection
//!
//! The pool is an ordered token list plus an `AtomicUsize` cursor. The cursor
//! only ever grows; the modulo is applied at read time, so concurrent
//! rotations each advance the sequence by one position with no lost updates.
//!
//! An empty pool is a valid state: `current()` fails deterministically with
//! `NoCredentialsConfigured` and `rotate()` is a no-op.

use std::sync::atomic::{AtomicUsize, Ordering};

use common::Secret;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Pool of GitHub API tokens with a round-robin rotation cursor.
pub struct TokenPool {
    tokens: Vec<Secret<String>>,
    cursor: AtomicUsize,
}

impl TokenPool {
    /// Create a pool from the configured token list. The order is preserved;
    /// rotation walks the list cyclically starting from the first entry.
    pub fn new(tokens: Vec<Secret<String>>) -> Self {
        info!(tokens = tokens.len(), "token pool initialized");
        Self {
            tokens,
            cursor: AtomicUsize::new(0),
        }
    }

    /// The credential at the cursor.
    ///
    /// Fails with [`Error::NoCredentialsConfigured`] when the pool is empty;
    /// callers surface that as an internal error without touching the network.
    pub fn current(&self) -> Result<String> {
        if self.tokens.is_empty() {
            return Err(Error::NoCredentialsConfigured);
        }
        let idx = self.cursor.load(Ordering::Relaxed) % self.tokens.len();
        Ok(self.tokens[idx].expose().clone())
    }

    /// Advance the cursor to the next token.
    ///
    /// Subsequent `current()` calls return the following credential in the
    /// list (wrapping). No-op on an empty pool.
    pub fn rotate(&self) {
        if self.tokens.is_empty() {
            return;
        }
        let prev = self.cursor.fetch_add(1, Ordering::Relaxed);
        debug!(
            previous = prev % self.tokens.len(),
            next = (prev + 1) % self.tokens.len(),
            "rotated to next token"
        );
    }

    /// Number of tokens in the pool.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Whether the pool holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}
