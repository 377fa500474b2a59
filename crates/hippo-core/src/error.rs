// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Hippo memory engine.

use thiserror::Error;

/// The primary error type used across all Hippo adapter traits and core operations.
#[derive(Debug, Error)]
pub enum HippoError {
    /// Configuration errors (invalid TOML, out-of-range thresholds).
    #[error("configuration error: {0}")]
    Config(String),

    /// The embedding model failed or returned an unusable vector.
    #[error("embedding error: {message}")]
    Embedding {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// LLM provider errors (summarization delegate, chunking delegate).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The chunker could not turn a response into chunks.
    #[error("chunking error: {0}")]
    Chunking(String),

    /// External knowledge-base retrieval failed.
    #[error("knowledge base error: {0}")]
    Knowledge(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// A session's internal invariants no longer hold. Only that session is affected.
    #[error("session for user {user_id} is corrupted: {detail}")]
    SessionCorrupted { user_id: String, detail: String },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HippoError {
    /// Shorthand for an embedding error without an underlying source.
    pub fn embedding(message: impl Into<String>) -> Self {
        HippoError::Embedding {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a provider error without an underlying source.
    pub fn provider(message: impl Into<String>) -> Self {
        HippoError::Provider {
            message: message.into(),
            source: None,
        }
    }
}
