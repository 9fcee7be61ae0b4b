//! Opaque pagination cursors.
//!
//! A cursor is the base64 encoding of `{"offset":N,"limit":M}`. It carries no
//! reference to the query it was produced for, so the same window can be
//! recomputed against any result set.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub offset: usize,
    pub limit: usize,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CursorError {
    #[error("Cursor is not valid base64")]
    InvalidEncoding,
    #[error("Cursor payload is malformed: {0}")]
    InvalidPayload(String),
}

impl Cursor {
    pub fn new(offset: usize, limit: usize) -> Self {
        Self { offset, limit }
    }

    pub fn encode(&self) -> String {
        // Serializing two integers cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    pub fn decode(cursor: &str) -> Result<Self, CursorError> {
        let bytes = STANDARD
            .decode(cursor.trim())
            .map_err(|_| CursorError::InvalidEncoding)?;
        serde_json::from_slice(&bytes).map_err(|e| CursorError::InvalidPayload(e.to_string()))
    }

    /// The window that follows this one.
    pub fn next(&self) -> Self {
        Self {
            offset: self.offset + self.limit,
            limit: self.limit,
        }
    }
}
