// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Long-term memory: a bounded, usage-weighted pool of chunks with a lazily
//! rebuilt similarity index.
//!
//! Upserts only touch the pool and mark the index stale. The next read
//! rebuilds it under the session lock, so a query never sees rows that
//! disagree with the pool.

use chrono::{DateTime, Utc};
use hippo_core::HippoError;
use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::index::VectorIndex;
use crate::scoring::EvictionPolicy;
use crate::stm::{best_match, fuse};
use crate::text::longer_topic;
use crate::types::{Chunk, Thresholds, UpsertAction, cosine_similarity};

/// Result of a long-term upsert.
#[derive(Debug, Clone)]
pub struct LtmUpsert {
    pub action: UpsertAction,
    /// Chunk dropped to make room, if any.
    pub evicted: Option<Chunk>,
}

#[derive(Debug, Clone)]
pub struct LongTermMemory {
    pool: Vec<Chunk>,
    capacity: usize,
    dim: usize,
    index: VectorIndex,
    dirty: bool,
}

impl LongTermMemory {
    pub fn new(capacity: usize, dim: usize) -> Self {
        Self {
            pool: Vec::new(),
            capacity: capacity.max(1),
            dim,
            index: VectorIndex::empty(dim),
            dirty: false,
        }
    }

    pub fn len(&self) -> usize {
        self.pool.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pool.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.pool
    }

    /// Whether the index lags behind the pool.
    pub fn is_stale(&self) -> bool {
        self.dirty
    }

    /// Merge `chunk` into a near-identical one, or insert it, evicting the
    /// lowest-scoring chunk when full.
    pub async fn upsert(
        &mut self,
        chunk: Chunk,
        embedder: &Embedder,
        thresholds: Thresholds,
        policy: &EvictionPolicy,
        now: DateTime<Utc>,
    ) -> LtmUpsert {
        self.dirty = true;

        let near_identical = best_match(self.pool.iter(), &chunk)
            .filter(|(_, sim)| *sim >= thresholds.identical);
        if let Some((idx, sim)) = near_identical {
            debug!(similarity = sim, "ltm: merging near-identical chunk");
            let existing = &mut self.pool[idx];
            let action = match fuse(existing, &chunk, embedder, now).await {
                Ok(()) => UpsertAction::Merged,
                Err(e) => {
                    warn!(error = %e, "ltm: merge re-embedding failed, keeping newer chunk");
                    let tag = longer_topic(&existing.tag, &chunk.tag).to_string();
                    existing.set_content(chunk.text, chunk.vector);
                    existing.tag = tag;
                    existing.last_used_at = now;
                    UpsertAction::Replaced
                }
            };
            self.collapse_around(idx, thresholds.identical);
            return LtmUpsert {
                action,
                evicted: None,
            };
        }

        let evicted = if self.pool.len() >= self.capacity {
            policy.victim(&self.pool, now).map(|i| {
                let victim = self.pool.remove(i);
                debug!(
                    chunk_id = %victim.id,
                    usage = victim.usage_count,
                    score = policy.score(&victim, now),
                    "ltm: evicted chunk"
                );
                victim
            })
        } else {
            None
        };

        self.pool.push(chunk);
        LtmUpsert {
            action: UpsertAction::Inserted,
            evicted,
        }
    }

    /// Drop chunks near-identical to the one at `idx`, folding their usage in.
    fn collapse_around(&mut self, idx: usize, identical: f32) {
        let anchor = self.pool[idx].vector.clone();
        let mut absorbed_usage = 0;
        let mut i = 0;
        let mut anchor_idx = idx;
        self.pool.retain(|c| {
            let keep = i == idx || cosine_similarity(&anchor, &c.vector) < identical;
            if !keep {
                absorbed_usage = absorbed_usage.max(c.usage_count);
                if i < idx {
                    anchor_idx -= 1;
                }
            }
            i += 1;
            keep
        });
        let survivor = &mut self.pool[anchor_idx];
        survivor.usage_count = survivor.usage_count.max(absorbed_usage);
    }

    /// Rebuild the index if stale and check it covers every chunk.
    pub fn ensure_fresh(&mut self, user_id: &str) -> Result<(), HippoError> {
        if self.dirty {
            self.index = VectorIndex::build(self.pool.iter().map(|c| c.vector.as_slice()), self.dim);
            self.dirty = false;
            debug!(user_id, rows = self.index.len(), "ltm: index rebuilt");
        }
        if self.index.len() != self.pool.len() {
            return Err(HippoError::SessionCorrupted {
                user_id: user_id.to_string(),
                detail: format!(
                    "index has {} rows for {} chunks",
                    self.index.len(),
                    self.pool.len()
                ),
            });
        }
        Ok(())
    }

    /// Up to `top_k` chunks with similarity at least `min_similarity`, best
    /// first. Returned chunks get their usage bumped.
    ///
    /// Ties on similarity go to the higher usage count, then the more recent
    /// use, judged before the bump.
    pub fn query(
        &mut self,
        user_id: &str,
        query: &[f32],
        top_k: usize,
        min_similarity: f32,
        now: DateTime<Utc>,
    ) -> Result<Vec<Chunk>, HippoError> {
        if self.pool.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }
        self.ensure_fresh(user_id)?;

        let mut scored: Vec<(usize, f32)> = self
            .index
            .similarities(query)
            .into_iter()
            .enumerate()
            .filter(|(_, sim)| *sim >= min_similarity)
            .collect();
        scored.sort_by(|(ia, sa), (ib, sb)| {
            let (a, b) = (&self.pool[*ia], &self.pool[*ib]);
            sb.total_cmp(sa)
                .then(b.usage_count.cmp(&a.usage_count))
                .then(b.last_used_at.cmp(&a.last_used_at))
                .then(ia.cmp(ib))
        });
        scored.truncate(top_k);

        Ok(scored
            .into_iter()
            .map(|(i, _)| {
                let chunk = &mut self.pool[i];
                chunk.usage_count += 1;
                chunk.last_used_at = now;
                chunk.clone()
            })
            .collect())
    }

    #[cfg(test)]
    pub(crate) fn corrupt_for_test(&mut self) {
        if let Some(c) = self.pool.first_mut() {
            c.vector.push(1.0);
        }
        self.dirty = true;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::Duration;
    use hippo_test_utils::{MockEmbedder, axis_vector, vector_with_similarity};
    use proptest::prelude::*;

    use super::*;

    const DIM: usize = 64;

    fn chunk_at(tag: &str, text: &str, vector: Vec<f32>, now: DateTime<Utc>) -> Chunk {
        Chunk::new(tag, text, vector, DIM, now).unwrap()
    }

    fn embedder() -> Embedder {
        Embedder::new(Arc::new(MockEmbedder::new(DIM)), DIM)
    }

    #[tokio::test]
    async fn empty_pool_query_is_empty() {
        let mut ltm = LongTermMemory::new(60, DIM);
        let hits = ltm
            .query("u", &axis_vector(DIM, 0), 3, 0.3, Utc::now())
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn insert_marks_index_stale_until_read() {
        let mut ltm = LongTermMemory::new(60, DIM);
        let now = Utc::now();
        let e = embedder();
        ltm.upsert(
            chunk_at("a", "Alpha.", axis_vector(DIM, 0), now),
            &e,
            Thresholds::default(),
            &EvictionPolicy::default(),
            now,
        )
        .await;
        assert!(ltm.is_stale());

        let hits = ltm.query("u", &axis_vector(DIM, 0), 3, 0.3, now).unwrap();
        assert!(!ltm.is_stale());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].usage_count, 1);
        assert_eq!(ltm.chunks()[0].usage_count, 1);
    }

    #[tokio::test]
    async fn query_filters_and_orders() {
        let mut ltm = LongTermMemory::new(60, DIM);
        let now = Utc::now();
        let e = embedder();
        let policy = EvictionPolicy::default();
        for (i, (tag, sim)) in [("low", 0.2f32), ("mid", 0.5), ("high", 0.9)].into_iter().enumerate() {
            let mut v = vec![0.0; DIM];
            v[0] = sim;
            v[10 + i] = (1.0 - sim * sim).sqrt();
            let c = chunk_at(tag, &format!("{tag} fact."), v, now);
            ltm.upsert(c, &e, Thresholds::default(), &policy, now).await;
        }
        assert_eq!(ltm.len(), 3);

        let hits = ltm.query("u", &axis_vector(DIM, 0), 3, 0.3, now).unwrap();
        let tags: Vec<_> = hits.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["high", "mid"]);
    }

    #[tokio::test]
    async fn ties_prefer_higher_usage_then_recency() {
        let now = Utc::now();
        let mut ltm = LongTermMemory::new(60, DIM);
        let e = embedder();
        let policy = EvictionPolicy::default();
        // Three chunks equally similar (0.5) to axis 0 but mutually distinct.
        for (i, tag) in ["a", "b", "c"].into_iter().enumerate() {
            let mut v = vec![0.0; DIM];
            v[0] = 0.5;
            v[10 + i] = 0.75f32.sqrt();
            ltm.upsert(chunk_at(tag, &format!("{tag}."), v, now), &e, Thresholds::default(), &policy, now)
                .await;
        }
        ltm.pool[1].usage_count = 5;
        ltm.pool[2].last_used_at = now + Duration::seconds(1);

        let hits = ltm.query("u", &axis_vector(DIM, 0), 3, 0.3, now).unwrap();
        let tags: Vec<_> = hits.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["b", "c", "a"]);
    }

    #[tokio::test]
    async fn near_identical_chunk_merges_and_keeps_usage() {
        let now = Utc::now();
        let mut ltm = LongTermMemory::new(60, DIM);
        let merged = "Shortness of breath started. Pressure and tightness.";
        let mock = MockEmbedder::new(DIM).with_vector(merged, vector_with_similarity(DIM, 0, 0.96));
        let e = Embedder::new(Arc::new(mock), DIM);
        let policy = EvictionPolicy::default();

        let a = chunk_at("chest pain", "Pressure and tightness.", axis_vector(DIM, 0), now);
        ltm.upsert(a, &e, Thresholds::default(), &policy, now).await;
        ltm.pool[0].usage_count = 4;

        let later = now + Duration::seconds(30);
        let a2 = chunk_at(
            "chest pain",
            "Shortness of breath started.",
            vector_with_similarity(DIM, 0, 0.93),
            later,
        );
        let out = ltm.upsert(a2, &e, Thresholds::default(), &policy, later).await;

        assert_eq!(out.action, UpsertAction::Merged);
        assert!(out.evicted.is_none());
        assert_eq!(ltm.len(), 1);
        let only = &ltm.chunks()[0];
        assert_eq!(only.text, merged);
        assert_eq!(only.usage_count, 4);
        assert_eq!(only.last_used_at, later);
        assert_eq!(only.created_at, now);
    }

    #[tokio::test]
    async fn related_but_distinct_chunk_is_inserted() {
        let now = Utc::now();
        let mut ltm = LongTermMemory::new(60, DIM);
        let e = embedder();
        let policy = EvictionPolicy::default();
        ltm.upsert(chunk_at("a", "A.", axis_vector(DIM, 0), now), &e, Thresholds::default(), &policy, now)
            .await;
        let out = ltm
            .upsert(
                chunk_at("b", "B.", vector_with_similarity(DIM, 0, 0.8), now),
                &e,
                Thresholds::default(),
                &policy,
                now,
            )
            .await;
        assert_eq!(out.action, UpsertAction::Inserted);
        assert_eq!(ltm.len(), 2);
    }

    #[tokio::test]
    async fn sixty_chunk_eviction_spares_queried_chunks() {
        let start = Utc::now();
        let mut ltm = LongTermMemory::new(60, DIM);
        let e = embedder();
        let policy = EvictionPolicy::default();
        for i in 0..60 {
            let c = chunk_at(&format!("t{i}"), &format!("Fact {i}."), axis_vector(DIM, i), start);
            ltm.upsert(c, &e, Thresholds::default(), &policy, start).await;
        }
        assert_eq!(ltm.len(), 60);

        let queried = [7usize, 21, 42];
        let mut now = start;
        for axis in queried {
            for _ in 0..10 {
                now += Duration::seconds(1);
                let hits = ltm.query("u", &axis_vector(DIM, axis), 3, 0.3, now).unwrap();
                assert_eq!(hits.len(), 1);
            }
        }

        let extra = chunk_at("new", "Fact 60.", axis_vector(DIM, 60), now);
        let out = ltm.upsert(extra, &e, Thresholds::default(), &policy, now).await;

        let victim = out.evicted.expect("a chunk must be evicted at capacity");
        let protected: Vec<String> = queried.iter().map(|i| format!("t{i}")).collect();
        assert!(!protected.contains(&victim.tag));
        assert_eq!(victim.usage_count, 0);
        assert_eq!(ltm.len(), 60);
        for tag in &protected {
            assert!(ltm.chunks().iter().any(|c| &c.tag == tag));
        }
    }

    #[tokio::test]
    async fn corrupted_index_is_reported() {
        let now = Utc::now();
        let mut ltm = LongTermMemory::new(60, DIM);
        let e = embedder();
        ltm.upsert(chunk_at("a", "A.", axis_vector(DIM, 0), now), &e, Thresholds::default(), &EvictionPolicy::default(), now)
            .await;
        ltm.corrupt_for_test();

        let err = ltm.query("alice", &axis_vector(DIM, 0), 3, 0.3, now).unwrap_err();
        assert!(matches!(err, HippoError::SessionCorrupted { ref user_id, .. } if user_id == "alice"));
    }

    fn arb_vector() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-1.0f32..1.0, 6)
            .prop_filter("non-zero", |v| v.iter().any(|x| x.abs() > 1e-3))
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn pool_stays_bounded_and_deduplicated(
            vectors in prop::collection::vec(arb_vector(), 1..40),
            capacity in 1usize..8,
        ) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            let dim = 6;
            let thresholds = Thresholds::default();
            let policy = EvictionPolicy::default();
            let e = Embedder::new(Arc::new(MockEmbedder::new(dim)), dim);
            let mut ltm = LongTermMemory::new(capacity, dim);
            let now = Utc::now();

            for (i, v) in vectors.into_iter().enumerate() {
                let c = Chunk::new("t", format!("fact {i} alpha beta."), v, dim, now).unwrap();
                rt.block_on(ltm.upsert(c, &e, thresholds, &policy, now));

                prop_assert!(ltm.len() <= capacity);
                for (a, ca) in ltm.chunks().iter().enumerate() {
                    for cb in &ltm.chunks()[a + 1..] {
                        prop_assert!(cosine_similarity(&ca.vector, &cb.vector) < thresholds.identical);
                    }
                }
            }
            prop_assert!(ltm.ensure_fresh("u").is_ok());
        }
    }
}
