// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Short-term memory: the few most recent summarized turns of a user.
//!
//! Entries are kept most-recent-first. An incoming chunk replaces a
//! near-identical entry, fuses into a related one, or is inserted at the
//! head. After every upsert no two entries are near-identical and the size
//! is within capacity.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use hippo_core::HippoError;
use tracing::{debug, warn};

use crate::embedder::Embedder;
use crate::text::{longer_topic, merge_texts};
use crate::types::{Chunk, StmEntry, Thresholds, UpsertAction, cosine_similarity};

#[derive(Debug, Clone)]
pub struct ShortTermMemory {
    entries: VecDeque<StmEntry>,
    capacity: usize,
}

impl ShortTermMemory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Entries, most recent first.
    pub fn iter(&self) -> impl Iterator<Item = &StmEntry> {
        self.entries.iter()
    }

    /// Up to `n` entries, most recent first.
    pub fn recent(&self, n: usize) -> Vec<StmEntry> {
        self.entries.iter().take(n).cloned().collect()
    }

    /// Insert, replace or merge `chunk` (see module docs).
    ///
    /// Never fails: if re-embedding a merged text fails, the newer chunk
    /// replaces the related entry verbatim.
    pub async fn upsert(
        &mut self,
        question: &str,
        chunk: Chunk,
        embedder: &Embedder,
        thresholds: Thresholds,
        now: DateTime<Utc>,
    ) -> UpsertAction {
        let best = best_match(self.entries.iter().map(|e| &e.chunk), &chunk);

        let (action, touched) = match best {
            Some((idx, sim)) if sim >= thresholds.identical => {
                debug!(similarity = sim, "stm: replacing near-identical entry");
                self.replace(idx, question, chunk, now);
                (UpsertAction::Replaced, 0)
            }
            Some((idx, sim)) if sim >= thresholds.merge => {
                debug!(similarity = sim, "stm: merging into related entry");
                let entry = &mut self.entries[idx];
                match fuse(&mut entry.chunk, &chunk, embedder, now).await {
                    Ok(()) => {
                        entry.question_context = question.to_string();
                        entry.updated_at = now;
                        (UpsertAction::Merged, idx)
                    }
                    Err(e) => {
                        warn!(error = %e, "stm: merge re-embedding failed, keeping newer chunk");
                        self.replace(idx, question, chunk, now);
                        (UpsertAction::Replaced, 0)
                    }
                }
            }
            _ => {
                self.entries
                    .push_front(stamped(StmEntry::new(question, chunk), now));
                (UpsertAction::Inserted, 0)
            }
        };

        self.collapse_around(touched, thresholds.identical);
        self.enforce_capacity();
        action
    }

    fn replace(&mut self, idx: usize, question: &str, chunk: Chunk, now: DateTime<Utc>) {
        self.entries.remove(idx);
        self.entries
            .push_front(stamped(StmEntry::new(question, chunk), now));
    }

    /// Drop other entries that became near-identical to the entry at `idx`.
    fn collapse_around(&mut self, idx: usize, identical: f32) {
        let Some(anchor) = self.entries.get(idx).map(|e| e.chunk.vector.clone()) else {
            return;
        };
        let mut i = 0;
        self.entries.retain(|e| {
            let keep = i == idx || cosine_similarity(&anchor, &e.chunk.vector) < identical;
            i += 1;
            keep
        });
    }

    /// Drop least-recently-updated entries until within capacity.
    fn enforce_capacity(&mut self) {
        while self.entries.len() > self.capacity {
            let oldest = self
                .entries
                .iter()
                .enumerate()
                .min_by(|(ia, a), (ib, b)| a.updated_at.cmp(&b.updated_at).then(ib.cmp(ia)))
                .map(|(i, _)| i);
            match oldest {
                Some(i) => {
                    self.entries.remove(i);
                }
                None => break,
            }
        }
    }
}

fn stamped(mut entry: StmEntry, now: DateTime<Utc>) -> StmEntry {
    entry.updated_at = now;
    entry
}

/// Most similar chunk as `(position, similarity)`; earliest position wins ties.
pub(crate) fn best_match<'a>(
    chunks: impl Iterator<Item = &'a Chunk>,
    incoming: &Chunk,
) -> Option<(usize, f32)> {
    chunks
        .map(|c| cosine_similarity(&c.vector, &incoming.vector))
        .enumerate()
        .fold(None, |best, (i, sim)| match best {
            Some((_, b)) if b >= sim => best,
            _ => Some((i, sim)),
        })
}

/// Fuse `incoming` into `existing`: newer sentences first, text and vector
/// updated together, the more descriptive tag kept.
pub(crate) async fn fuse(
    existing: &mut Chunk,
    incoming: &Chunk,
    embedder: &Embedder,
    now: DateTime<Utc>,
) -> Result<(), HippoError> {
    let merged = merge_texts(&incoming.text, &existing.text);
    let vector = if merged == incoming.text {
        incoming.vector.clone()
    } else if merged == existing.text {
        existing.vector.clone()
    } else {
        embedder.embed_one(&merged).await?
    };
    let tag = longer_topic(&existing.tag, &incoming.tag).to_string();
    existing.set_content(merged, vector);
    existing.tag = tag;
    existing.last_used_at = now;
    Ok(())
}
