// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chunker adapter trait: splits an assistant response into tagged drafts.

use async_trait::async_trait;

use crate::error::HippoError;
use crate::traits::adapter::PluginAdapter;
use crate::types::ChunkDraft;

/// Adapter that turns a raw response plus its triggering question into
/// topic-tagged drafts. The memory engine embeds each draft itself.
#[async_trait]
pub trait ChunkerAdapter: PluginAdapter {
    async fn chunk(&self, response: &str, question: &str) -> Result<Vec<ChunkDraft>, HippoError>;
}
