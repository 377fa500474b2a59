// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic embedding adapter.
//!
//! Texts are hashed token by token into `dim` buckets (bag of words), so
//! texts sharing words are similar and texts sharing none are orthogonal.
//! Exact-text overrides pin a vector when a test needs a precise similarity.

use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;

use hippo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use hippo_core::{EmbeddingAdapter, HippoError, PluginAdapter};

pub struct MockEmbedder {
    dim: usize,
    overrides: Mutex<HashMap<String, Vec<f32>>>,
    fail_substrings: Vec<String>,
    fail_all: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn new(dim: usize) -> Self {
        Self {
            dim,
            overrides: Mutex::new(HashMap::new()),
            fail_substrings: Vec::new(),
            fail_all: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Pin the vector returned for an exact text.
    pub fn with_vector(self, text: &str, vector: Vec<f32>) -> Self {
        self.set_vector(text, vector);
        self
    }

    /// Fail any embed call whose input contains `needle`.
    pub fn failing_on(mut self, needle: &str) -> Self {
        self.fail_substrings.push(needle.to_string());
        self
    }

    /// Pin a vector after construction.
    pub fn set_vector(&self, text: &str, vector: Vec<f32>) {
        if let Ok(mut map) = self.overrides.lock() {
            map.insert(text.to_string(), vector);
        }
    }

    /// Toggle failure of every call.
    pub fn set_failing(&self, failing: bool) {
        self.fail_all.store(failing, Ordering::SeqCst);
    }

    /// Number of `embed` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        if let Some(v) = self.overrides.lock().ok().and_then(|m| m.get(text).cloned()) {
            return v;
        }
        let mut v = vec![0.0f32; self.dim];
        for token in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.to_lowercase().hash(&mut hasher);
            let bucket = (hasher.finish() % self.dim as u64) as usize;
            v[bucket] += 1.0;
        }
        v
    }
}

#[async_trait]
impl PluginAdapter for MockEmbedder {
    fn name(&self) -> &str {
        "mock-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        if self.fail_all.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("mock embedder set to fail".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for MockEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, HippoError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if self.fail_all.load(Ordering::SeqCst) {
            return Err(HippoError::embedding("mock embedder failure"));
        }
        if let Some(text) = input
            .texts
            .iter()
            .find(|t| self.fail_substrings.iter().any(|n| t.contains(n.as_str())))
        {
            return Err(HippoError::embedding(format!("mock failure on `{text}`")));
        }

        Ok(EmbeddingOutput {
            embeddings: input.texts.iter().map(|t| self.vector_for(t)).collect(),
            dimensions: self.dim,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn embed(e: &MockEmbedder, text: &str) -> Vec<f32> {
        e.embed(EmbeddingInput {
            texts: vec![text.to_string()],
        })
        .await
        .unwrap()
        .embeddings
        .remove(0)
    }

    #[tokio::test]
    async fn same_text_same_vector() {
        let e = MockEmbedder::new(64);
        assert_eq!(embed(&e, "chest pain").await, embed(&e, "Chest  pain").await);
        assert_eq!(e.calls(), 2);
    }

    #[tokio::test]
    async fn override_wins() {
        let e = MockEmbedder::new(3).with_vector("x", vec![0.0, 0.0, 1.0]);
        assert_eq!(embed(&e, "x").await, vec![0.0, 0.0, 1.0]);
    }

    #[tokio::test]
    async fn failure_modes() {
        let e = MockEmbedder::new(8).failing_on("bad");
        let err = e
            .embed(EmbeddingInput {
                texts: vec!["a bad text".into()],
            })
            .await;
        assert!(err.is_err());

        e.set_failing(true);
        let err = e
            .embed(EmbeddingInput {
                texts: vec!["good".into()],
            })
            .await;
        assert!(err.is_err());
    }
}
