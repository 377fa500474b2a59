// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory domain types shared by the short-term and long-term tiers.

use chrono::{DateTime, Utc};
use hippo_config::MemoryConfig;
use hippo_core::HippoError;
use serde::Serialize;

/// Similarity cut-offs used when upserting into either tier.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    /// At or above: related, fuse sentences.
    pub merge: f32,
    /// At or above: the same fact, newer wins.
    pub identical: f32,
}

impl Thresholds {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            merge: config.merge_threshold,
            identical: config.identical_threshold,
        }
    }
}

impl Default for Thresholds {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}

/// A topic-tagged, embedded piece of distilled knowledge.
///
/// Construction validates the record: `text` is non-empty and `vector` has the
/// configured dimension with finite, not-all-zero components. The vector is
/// always the embedding of the current `text`.
#[derive(Debug, Clone, Serialize)]
pub struct Chunk {
    /// Unique identifier (UUID v4).
    pub id: String,
    /// Short topic label.
    pub tag: String,
    /// Distilled content.
    pub text: String,
    /// Dense embedding of `text`.
    #[serde(skip)]
    pub vector: Vec<f32>,
    /// Number of served contexts this chunk contributed to.
    pub usage_count: u64,
    pub created_at: DateTime<Utc>,
    pub last_used_at: DateTime<Utc>,
}

impl Chunk {
    /// Build a validated chunk with a fresh id and `usage_count = 0`.
    pub fn new(
        tag: impl Into<String>,
        text: impl Into<String>,
        vector: Vec<f32>,
        dim: usize,
        now: DateTime<Utc>,
    ) -> Result<Self, HippoError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(HippoError::Chunking("chunk text must not be empty".into()));
        }
        validate_vector(&vector, dim)?;
        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            tag: tag.into(),
            text,
            vector,
            usage_count: 0,
            created_at: now,
            last_used_at: now,
        })
    }

    /// Replace text and vector together so they never drift apart.
    pub(crate) fn set_content(&mut self, text: String, vector: Vec<f32>) {
        self.text = text;
        self.vector = vector;
    }

    /// Render as an LTM retrieval hit.
    pub fn as_hit(&self) -> String {
        format!("### Topic: {}\n{}", self.tag, self.text)
    }
}

/// One short-term memory slot: a recent summarized turn.
#[derive(Debug, Clone, Serialize)]
pub struct StmEntry {
    /// The user question this chunk answered.
    pub question_context: String,
    pub chunk: Chunk,
    /// Last time this slot was inserted, replaced or merged into.
    pub updated_at: DateTime<Utc>,
}

impl StmEntry {
    pub fn new(question_context: impl Into<String>, chunk: Chunk) -> Self {
        let updated_at = chunk.last_used_at;
        Self {
            question_context: question_context.into(),
            chunk,
            updated_at,
        }
    }

    /// Render as a history line.
    pub fn render(&self) -> String {
        format!("Topic: {}\n{}", self.chunk.tag, self.chunk.text)
    }
}

/// What an upsert did with an incoming chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertAction {
    /// Stored as a new entry.
    Inserted,
    /// Near-identical entry replaced by the newer chunk.
    Replaced,
    /// Sentences fused into a related entry.
    Merged,
}

/// Outcome of ingesting one assistant response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Chunks the chunker produced (after dropping empty ones).
    pub chunks: usize,
    /// Chunks skipped because their embedding failed.
    pub skipped: usize,
    pub stm_inserted: usize,
    pub stm_replaced: usize,
    pub stm_merged: usize,
    pub ltm_inserted: usize,
    pub ltm_merged: usize,
    /// LTM chunks evicted to make room.
    pub ltm_evicted: usize,
    /// Whether the chunking came from the cache.
    pub cache_hit: bool,
}

/// Check that a vector is usable for cosine similarity.
pub fn validate_vector(vector: &[f32], dim: usize) -> Result<(), HippoError> {
    if vector.len() != dim {
        return Err(HippoError::embedding(format!(
            "expected {dim}-dimensional vector, got {}",
            vector.len()
        )));
    }
    if vector.iter().any(|v| !v.is_finite()) {
        return Err(HippoError::embedding("vector has non-finite components"));
    }
    if vector.iter().all(|v| *v == 0.0) {
        return Err(HippoError::embedding("vector is all zeros"));
    }
    Ok(())
}

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or a zero-norm operand.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na <= f32::EPSILON || nb <= f32::EPSILON {
        return 0.0;
    }
    dot / (na * nb)
}
