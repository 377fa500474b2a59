// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Eviction scoring for the long-term pool.
//!
//! `score = usage_count * w_usage + 0.5^(age / half_life) * w_recency`,
//! where `age` is the time since `last_used_at`. The lowest score goes first.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use hippo_config::MemoryConfig;

use crate::types::Chunk;

/// Weights and half-life of the eviction score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvictionPolicy {
    pub usage_weight: f64,
    pub recency_weight: f64,
    pub half_life_secs: f64,
}

impl EvictionPolicy {
    pub fn from_config(config: &MemoryConfig) -> Self {
        Self {
            usage_weight: config.usage_weight,
            recency_weight: config.recency_weight,
            half_life_secs: config.decay_half_life_secs.max(1) as f64,
        }
    }

    /// Recency factor in `(0, 1]`; 1.0 for a chunk used just now.
    pub fn decay(&self, last_used_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
        let age_secs = (now - last_used_at).num_milliseconds().max(0) as f64 / 1000.0;
        0.5f64.powf(age_secs / self.half_life_secs)
    }

    pub fn score(&self, chunk: &Chunk, now: DateTime<Utc>) -> f64 {
        chunk.usage_count as f64 * self.usage_weight
            + self.decay(chunk.last_used_at, now) * self.recency_weight
    }

    /// Index of the chunk to evict: lowest score, then older `last_used_at`,
    /// then older `created_at`.
    pub fn victim(&self, chunks: &[Chunk], now: DateTime<Utc>) -> Option<usize> {
        chunks
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| self.compare(a, b, now))
            .map(|(i, _)| i)
    }

    fn compare(&self, a: &Chunk, b: &Chunk, now: DateTime<Utc>) -> Ordering {
        self.score(a, now)
            .total_cmp(&self.score(b, now))
            .then(a.last_used_at.cmp(&b.last_used_at))
            .then(a.created_at.cmp(&b.created_at))
    }
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self::from_config(&MemoryConfig::default())
    }
}
