// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Knowledge adapter trait for external retrieval over a curated corpus.

use async_trait::async_trait;

use crate::error::HippoError;
use crate::traits::adapter::PluginAdapter;

/// Adapter over an external knowledge base (RAG over curated documents).
///
/// Snippets are an extra input to context selection and are never stored
/// in user memory.
#[async_trait]
pub trait KnowledgeAdapter: PluginAdapter {
    /// Returns up to `limit` snippets relevant to `query`.
    async fn retrieve(&self, query: &str, limit: usize) -> Result<Vec<String>, HippoError>;
}
