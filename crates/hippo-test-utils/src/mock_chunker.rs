// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted chunker adapter.
//!
//! By default each blank-line separated paragraph becomes one draft with an
//! empty tag; a leading `Topic: ...` line is lifted into the tag.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use hippo_core::types::{AdapterType, ChunkDraft, HealthStatus};
use hippo_core::{ChunkerAdapter, HippoError, PluginAdapter};

pub struct MockChunker {
    fixed: Mutex<Option<Vec<ChunkDraft>>>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockChunker {
    pub fn new() -> Self {
        Self {
            fixed: Mutex::new(None),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Always return these drafts, ignoring the response text.
    pub fn with_drafts(drafts: Vec<ChunkDraft>) -> Self {
        let chunker = Self::new();
        chunker.set_drafts(drafts);
        chunker
    }

    pub fn set_drafts(&self, drafts: Vec<ChunkDraft>) {
        if let Ok(mut fixed) = self.fixed.lock() {
            *fixed = Some(drafts);
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Number of `chunk` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockChunker {
    fn default() -> Self {
        Self::new()
    }
}

fn paragraph_draft(paragraph: &str) -> ChunkDraft {
    let mut lines = paragraph.lines();
    match lines.next() {
        Some(first) if first.trim_start().starts_with("Topic:") => {
            let tag = first.trim_start().trim_start_matches("Topic:").trim();
            let body = lines.collect::<Vec<_>>().join("\n");
            ChunkDraft::new(tag, body.trim())
        }
        _ => ChunkDraft::new("", paragraph.trim()),
    }
}

#[async_trait]
impl PluginAdapter for MockChunker {
    fn name(&self) -> &str {
        "mock-chunker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Chunker
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl ChunkerAdapter for MockChunker {
    async fn chunk(&self, response: &str, _question: &str) -> Result<Vec<ChunkDraft>, HippoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(HippoError::Chunking("mock chunker failure".into()));
        }
        if let Some(drafts) = self.fixed.lock().ok().and_then(|f| f.clone()) {
            return Ok(drafts);
        }
        Ok(response
            .split("\n\n")
            .filter(|p| !p.trim().is_empty())
            .map(paragraph_draft)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn splits_paragraphs_and_lifts_topics() {
        let chunker = MockChunker::new();
        let drafts = chunker
            .chunk("Topic: asthma\nUse the inhaler.\n\nDrink water.", "q")
            .await
            .unwrap();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0], ChunkDraft::new("asthma", "Use the inhaler."));
        assert_eq!(drafts[1], ChunkDraft::new("", "Drink water."));
        assert_eq!(chunker.calls(), 1);
    }

    #[tokio::test]
    async fn fixed_drafts_and_failure() {
        let chunker = MockChunker::with_drafts(vec![ChunkDraft::new("a", "b")]);
        assert_eq!(chunker.chunk("ignored", "q").await.unwrap().len(), 1);
        chunker.set_failing(true);
        assert!(chunker.chunk("ignored", "q").await.is_err());
    }
}
