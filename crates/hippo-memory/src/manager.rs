// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-user memory sessions and the public memory API.
//!
//! Every user owns one [`Session`] (short-term plus long-term tier) behind its
//! own async mutex, so distinct users never contend. The user map is bounded
//! by `max_users`; the least recently active session is dropped first.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use hippo_config::MemoryConfig;
use hippo_core::types::{AdapterType, HealthStatus};
use hippo_core::{
    ChunkDraft, ChunkerAdapter, EmbeddingAdapter, HippoError, KnowledgeAdapter, PluginAdapter,
    ProviderAdapter,
};
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::embedder::Embedder;
use crate::ltm::LongTermMemory;
use crate::recording as metrics;
use crate::scoring::EvictionPolicy;
use crate::selector::{self, ContextInputs, SummaryOutcome};
use crate::stm::ShortTermMemory;
use crate::text::enrich_topic;
use crate::types::{Chunk, IngestReport, StmEntry, Thresholds, UpsertAction};

/// One user's memory tiers.
#[derive(Debug)]
pub struct Session {
    pub stm: ShortTermMemory,
    pub ltm: LongTermMemory,
}

impl Session {
    fn new(config: &MemoryConfig) -> Self {
        Self {
            stm: ShortTermMemory::new(config.stm_capacity),
            ltm: LongTermMemory::new(config.ltm_capacity, config.embedding_dim),
        }
    }
}

struct SessionSlot {
    session: Mutex<Session>,
    /// Milliseconds since the epoch of the last operation on this session.
    last_active: AtomicI64,
}

impl SessionSlot {
    fn new(config: &MemoryConfig) -> Self {
        Self {
            session: Mutex::new(Session::new(config)),
            last_active: AtomicI64::new(Utc::now().timestamp_millis()),
        }
    }

    fn touch(&self) {
        self.last_active
            .store(Utc::now().timestamp_millis(), Ordering::Relaxed);
    }

    fn last_active(&self) -> i64 {
        self.last_active.load(Ordering::Relaxed)
    }
}

/// Whether an operation still holds `slot` outside the session map.
///
/// Dropping such a slot from the map would detach the writes it is about to
/// make, so eviction passes over it until the next sweep.
fn in_use(slot: &Arc<SessionSlot>) -> bool {
    Arc::strong_count(slot) > 1
}

struct Summarizer {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    max_tokens: u32,
}

/// Bounded FIFO of chunker output keyed by a hash of question and response.
struct ChunkCache {
    capacity: usize,
    order: VecDeque<String>,
    entries: HashMap<String, Vec<ChunkDraft>>,
}

impl ChunkCache {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            order: VecDeque::new(),
            entries: HashMap::new(),
        }
    }

    fn key(question: &str, response: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(question.as_bytes());
        hasher.update([0u8]);
        hasher.update(response.as_bytes());
        hex::encode(hasher.finalize())
    }

    fn get(&self, key: &str) -> Option<Vec<ChunkDraft>> {
        self.entries.get(key).cloned()
    }

    fn insert(&mut self, key: String, drafts: Vec<ChunkDraft>) {
        if self.capacity == 0 || self.entries.contains_key(&key) {
            return;
        }
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(old) => {
                    self.entries.remove(&old);
                }
                None => break,
            }
        }
        self.order.push_back(key.clone());
        self.entries.insert(key, drafts);
    }
}

/// Health of one plugged-in adapter.
#[derive(Debug, Clone, PartialEq)]
pub struct AdapterHealth {
    pub name: String,
    pub adapter_type: AdapterType,
    pub status: HealthStatus,
}

/// Hybrid short-term/long-term conversational memory for many users.
pub struct MemoryManager {
    config: MemoryConfig,
    thresholds: Thresholds,
    policy: EvictionPolicy,
    embedder: Embedder,
    chunker: Arc<dyn ChunkerAdapter>,
    summarizer: Option<Summarizer>,
    knowledge: Option<Arc<dyn KnowledgeAdapter>>,
    sessions: DashMap<String, Arc<SessionSlot>>,
    chunk_cache: StdMutex<ChunkCache>,
}

impl MemoryManager {
    pub fn new(
        config: MemoryConfig,
        embedding: Arc<dyn EmbeddingAdapter>,
        chunker: Arc<dyn ChunkerAdapter>,
    ) -> Self {
        Self {
            thresholds: Thresholds::from_config(&config),
            policy: EvictionPolicy::from_config(&config),
            embedder: Embedder::new(embedding, config.embedding_dim),
            chunker,
            summarizer: None,
            knowledge: None,
            sessions: DashMap::new(),
            chunk_cache: StdMutex::new(ChunkCache::new(config.chunk_cache_capacity)),
            config,
        }
    }

    /// Use `provider` to summarize retrieved context into one paragraph.
    ///
    /// Without a summarizer the fallback chain is served directly.
    pub fn with_summarizer(
        mut self,
        provider: Arc<dyn ProviderAdapter>,
        model: impl Into<String>,
        max_tokens: u32,
    ) -> Self {
        self.summarizer = Some(Summarizer {
            provider,
            model: model.into(),
            max_tokens,
        });
        self
    }

    /// Consult `knowledge` on every [`retrieve_context`](Self::retrieve_context).
    pub fn with_knowledge(mut self, knowledge: Arc<dyn KnowledgeAdapter>) -> Self {
        self.knowledge = Some(knowledge);
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    /// Number of live sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    pub fn has_session(&self, user_id: &str) -> bool {
        self.sessions.contains_key(user_id)
    }

    fn existing_session(&self, user_id: &str) -> Option<Arc<SessionSlot>> {
        let slot = self.sessions.get(user_id).map(|s| Arc::clone(s.value()))?;
        slot.touch();
        Some(slot)
    }

    fn session(&self, user_id: &str) -> Arc<SessionSlot> {
        if let Some(slot) = self.existing_session(user_id) {
            return slot;
        }

        let slot = Arc::clone(
            self.sessions
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(SessionSlot::new(&self.config)))
                .value(),
        );
        slot.touch();
        info!(user_id, "memory session created");
        self.enforce_max_users(user_id);
        metrics::set_active_sessions(self.sessions.len());
        slot
    }

    /// Drop least recently active idle sessions, never `keep`, until within
    /// bound. Sessions in use are skipped, so the map may stay over bound
    /// until a later call.
    fn enforce_max_users(&self, keep: &str) {
        while self.sessions.len() > self.config.max_users {
            let oldest = self
                .sessions
                .iter()
                .filter(|e| e.key() != keep && !in_use(e.value()))
                .min_by_key(|e| e.value().last_active())
                .map(|e| e.key().clone());
            let Some(user_id) = oldest else {
                warn!(
                    sessions = self.sessions.len(),
                    max_users = self.config.max_users,
                    "every session over max_users is in use, deferring eviction"
                );
                break;
            };
            let removed = self
                .sessions
                .remove_if(&user_id, |_, slot| !in_use(slot))
                .is_some();
            if removed {
                info!(user_id = %user_id, "memory session dropped at max_users");
                metrics::record_session_reset("capacity");
            }
        }
    }

    /// Chunk, embed and store an assistant response.
    ///
    /// A chunk whose embedding fails is skipped and counted; every other chunk
    /// lands in both tiers. Only a chunker failure fails the whole call.
    pub async fn ingest(
        &self,
        user_id: &str,
        response: &str,
        question: &str,
    ) -> Result<IngestReport, HippoError> {
        let mut report = IngestReport::default();
        if response.trim().is_empty() {
            return Ok(report);
        }

        let (drafts, cache_hit) = self.chunk_cached(response, question).await?;
        report.cache_hit = cache_hit;

        let drafts: Vec<ChunkDraft> = drafts
            .into_iter()
            .filter(|d| !d.text.trim().is_empty())
            .collect();
        report.chunks = drafts.len();

        let now = Utc::now();
        let mut chunks = Vec::with_capacity(drafts.len());
        for draft in drafts {
            let text = draft.text.trim();
            let tag = enrich_topic(&draft.tag, text);
            let built = match self.embedder.embed_one(text).await {
                Ok(vector) => Chunk::new(tag, text, vector, self.embedder.dim(), now),
                Err(e) => Err(e),
            };
            match built {
                Ok(chunk) => chunks.push(chunk),
                Err(e) => {
                    warn!(user_id, error = %e, "skipping chunk that could not be embedded");
                    report.skipped += 1;
                    metrics::record_ingest_chunk("skipped");
                }
            }
        }

        if chunks.is_empty() {
            return Ok(report);
        }

        let slot = self.session(user_id);
        let mut session = slot.session.lock().await;
        for chunk in chunks {
            match session
                .stm
                .upsert(question, chunk.clone(), &self.embedder, self.thresholds, now)
                .await
            {
                UpsertAction::Inserted => report.stm_inserted += 1,
                UpsertAction::Replaced => report.stm_replaced += 1,
                UpsertAction::Merged => report.stm_merged += 1,
            }

            let outcome = session
                .ltm
                .upsert(chunk, &self.embedder, self.thresholds, &self.policy, now)
                .await;
            match outcome.action {
                UpsertAction::Inserted => report.ltm_inserted += 1,
                UpsertAction::Replaced | UpsertAction::Merged => report.ltm_merged += 1,
            }
            if outcome.evicted.is_some() {
                report.ltm_evicted += 1;
                metrics::record_eviction();
            }
            metrics::record_ingest_chunk("stored");
        }

        debug!(
            user_id,
            chunks = report.chunks,
            skipped = report.skipped,
            stm = session.stm.len(),
            ltm = session.ltm.len(),
            "ingested response"
        );
        Ok(report)
    }

    async fn chunk_cached(
        &self,
        response: &str,
        question: &str,
    ) -> Result<(Vec<ChunkDraft>, bool), HippoError> {
        let key = ChunkCache::key(question, response);
        let cached = self
            .chunk_cache
            .lock()
            .ok()
            .and_then(|cache| cache.get(&key));
        if let Some(drafts) = cached {
            debug!("chunk cache hit");
            return Ok((drafts, true));
        }

        let drafts = self.chunker.chunk(response, question).await?;
        if let Ok(mut cache) = self.chunk_cache.lock() {
            cache.insert(key, drafts.clone());
        }
        Ok((drafts, false))
    }

    /// Up to `num_turns` most recent short-term entries, oldest first.
    pub async fn get_recent_history(&self, user_id: &str, num_turns: usize) -> Vec<StmEntry> {
        let Some(slot) = self.existing_session(user_id) else {
            return Vec::new();
        };
        let session = slot.session.lock().await;
        let mut recent = session.stm.recent(num_turns);
        recent.reverse();
        recent
    }

    /// Long-term chunks relevant to `query`, rendered `### Topic: <tag>\n<text>`.
    ///
    /// A user without memory gets an empty list and no embedding call.
    pub async fn get_relevant_chunks(
        &self,
        user_id: &str,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<String>, HippoError> {
        let Some(slot) = self.existing_session(user_id) else {
            return Ok(Vec::new());
        };
        let mut session = slot.session.lock().await;
        self.query_ltm(user_id, &mut session, query, top_k, min_similarity)
            .await
    }

    async fn query_ltm(
        &self,
        user_id: &str,
        session: &mut Session,
        query: &str,
        top_k: usize,
        min_similarity: f32,
    ) -> Result<Vec<String>, HippoError> {
        if session.ltm.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed_one(query).await?;
        match session
            .ltm
            .query(user_id, &vector, top_k, min_similarity, Utc::now())
        {
            Ok(hits) => Ok(hits.iter().map(Chunk::as_hit).collect()),
            Err(HippoError::SessionCorrupted { detail, .. }) => {
                warn!(user_id, detail = %detail, "discarding corrupted memory session");
                *session = Session::new(&self.config);
                metrics::record_session_reset("corrupted");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }

    /// Context for answering `query`, consulting the knowledge base if one
    /// is configured. Never fails; may be empty.
    pub async fn retrieve_context(&self, user_id: &str, query: &str) -> String {
        let knowledge = match &self.knowledge {
            Some(kb) => match kb.retrieve(query, self.config.knowledge_top_k).await {
                Ok(snippets) => snippets,
                Err(e) => {
                    warn!(user_id, error = %e, "knowledge base unavailable");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };
        self.retrieve_context_with(user_id, query, knowledge).await
    }

    /// Like [`retrieve_context`](Self::retrieve_context) with caller-supplied
    /// knowledge-base snippets.
    pub async fn retrieve_context_with(
        &self,
        user_id: &str,
        query: &str,
        knowledge: Vec<String>,
    ) -> String {
        let mut inputs = ContextInputs {
            knowledge,
            ..Default::default()
        };

        if let Some(slot) = self.existing_session(user_id) {
            let mut session = slot.session.lock().await;
            let mut history = session.stm.recent(self.config.stm_capacity);
            history.reverse();
            inputs.history = history;
            inputs.ltm_hits = match self
                .query_ltm(
                    user_id,
                    &mut session,
                    query,
                    self.config.top_k,
                    self.config.min_similarity,
                )
                .await
            {
                Ok(hits) => hits,
                Err(e) => {
                    warn!(user_id, error = %e, "long-term retrieval failed");
                    Vec::new()
                }
            };
        }

        if inputs.is_empty() {
            debug!(user_id, "no memory or knowledge for query");
            return String::new();
        }

        let outcome = match &self.summarizer {
            Some(s) => {
                let started = Instant::now();
                let outcome = selector::summarize(
                    s.provider.as_ref(),
                    &s.model,
                    s.max_tokens,
                    query,
                    &inputs,
                    Duration::from_secs(self.config.summarize_timeout_secs),
                )
                .await;
                metrics::record_summarize_latency(started.elapsed().as_secs_f64());
                outcome
            }
            None => SummaryOutcome::Failed("no summarizer configured".into()),
        };

        let (context, source) =
            selector::select_context(&outcome, &inputs, self.config.max_context_chars);
        if source.is_fallback() {
            metrics::record_fallback(source.as_str());
        }
        info!(
            user_id,
            source = source.as_str(),
            history = inputs.history.len(),
            ltm_hits = inputs.ltm_hits.len(),
            knowledge = inputs.knowledge.len(),
            chars = context.chars().count(),
            "context served"
        );
        context
    }

    /// Drop a user's memory. Returns whether a session existed.
    pub fn reset(&self, user_id: &str) -> bool {
        let removed = self.sessions.remove(user_id).is_some();
        if removed {
            info!(user_id, "memory session reset");
            metrics::record_session_reset("explicit");
            metrics::set_active_sessions(self.sessions.len());
        }
        removed
    }

    /// Drop sessions idle for longer than `idle_timeout_secs` as of `now`.
    pub fn evict_idle(&self, now: DateTime<Utc>) -> usize {
        let timeout_ms = (self.config.idle_timeout_secs as i64).saturating_mul(1000);
        let cutoff = now.timestamp_millis().saturating_sub(timeout_ms);
        let before = self.sessions.len();
        self.sessions.retain(|user_id, slot| {
            if in_use(slot) {
                return true;
            }
            let keep = slot.last_active() >= cutoff;
            if !keep {
                debug!(user_id = %user_id, "dropping idle memory session");
                metrics::record_session_reset("idle");
            }
            keep
        });
        let dropped = before.saturating_sub(self.sessions.len());
        if dropped > 0 {
            info!(dropped, "idle memory sessions evicted");
            metrics::set_active_sessions(self.sessions.len());
        }
        dropped
    }

    /// Run [`evict_idle`](Self::evict_idle) every `interval` until `cancel`
    /// fires.
    pub fn spawn_idle_sweeper(
        self: &Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await;
            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        manager.evict_idle(Utc::now());
                    }
                    _ = cancel.cancelled() => {
                        debug!("idle sweeper shutting down");
                        break;
                    }
                }
            }
        })
    }

    /// Health of every plugged-in adapter.
    pub async fn health_check(&self) -> Vec<AdapterHealth> {
        let mut report = vec![
            health_of(self.embedder.adapter().as_ref()).await,
            health_of(self.chunker.as_ref()).await,
        ];
        if let Some(s) = &self.summarizer {
            report.push(health_of(s.provider.as_ref()).await);
        }
        if let Some(kb) = &self.knowledge {
            report.push(health_of(kb.as_ref()).await);
        }
        report
    }

    #[cfg(test)]
    async fn corrupt_session(&self, user_id: &str) {
        if let Some(slot) = self.existing_session(user_id) {
            slot.session.lock().await.ltm.corrupt_for_test();
        }
    }

    #[cfg(test)]
    fn backdate(&self, user_id: &str, by: chrono::Duration) {
        if let Some(slot) = self.sessions.get(user_id) {
            slot.last_active
                .fetch_sub(by.num_milliseconds(), Ordering::Relaxed);
        }
    }
}

async fn health_of<A: PluginAdapter + ?Sized>(adapter: &A) -> AdapterHealth {
    let status = adapter
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    AdapterHealth {
        name: adapter.name().to_string(),
        adapter_type: adapter.adapter_type(),
        status,
    }
}

#[cfg(test)]
mod tests {
    use hippo_test_utils::{MockChunker, MockEmbedder};

    use super::*;

    fn manager(config: MemoryConfig) -> MemoryManager {
        let dim = config.embedding_dim;
        MemoryManager::new(
            config,
            Arc::new(MockEmbedder::new(dim)),
            Arc::new(MockChunker::new()),
        )
    }

    fn small_config() -> MemoryConfig {
        MemoryConfig {
            embedding_dim: 64,
            ..Default::default()
        }
    }

    #[test]
    fn chunk_cache_is_fifo_bounded() {
        let mut cache = ChunkCache::new(2);
        cache.insert("a".into(), vec![ChunkDraft::new("a", "a")]);
        cache.insert("b".into(), vec![]);
        cache.insert("c".into(), vec![]);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
        assert!(cache.get("c").is_some());
    }

    #[test]
    fn chunk_cache_key_separates_fields() {
        assert_ne!(ChunkCache::key("ab", "c"), ChunkCache::key("a", "bc"));
        assert_eq!(ChunkCache::key("q", "r").len(), 64);
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn corrupted_session_is_recreated_empty() {
        let m = manager(small_config());
        m.ingest("alice", "Take ibuprofen with food.", "headache?").await.unwrap();
        m.ingest("bob", "Drink more water.", "thirsty?").await.unwrap();
        m.corrupt_session("alice").await;

        let hits = m
            .get_relevant_chunks("alice", "ibuprofen food", 3, 0.3)
            .await
            .unwrap();
        assert!(hits.is_empty());
        assert!(logs_contain("discarding corrupted memory session"));
        assert!(m.get_recent_history("alice", 5).await.is_empty());

        // Other users are untouched.
        assert_eq!(m.get_recent_history("bob", 5).await.len(), 1);
        let bob = m.get_relevant_chunks("bob", "Drink more water.", 3, 0.3).await.unwrap();
        assert_eq!(bob.len(), 1);
    }

    #[tokio::test]
    async fn idle_sessions_are_evicted() {
        let m = manager(MemoryConfig {
            idle_timeout_secs: 60,
            ..small_config()
        });
        m.ingest("idle", "Rest.", "q").await.unwrap();
        m.ingest("busy", "Walk daily.", "q").await.unwrap();
        m.backdate("idle", chrono::Duration::seconds(120));

        assert_eq!(m.evict_idle(Utc::now()), 1);
        assert!(!m.has_session("idle"));
        assert!(m.has_session("busy"));
    }

    #[tokio::test]
    async fn max_users_drops_least_recently_active() {
        let m = manager(MemoryConfig {
            max_users: 2,
            ..small_config()
        });
        m.ingest("a", "Alpha fact.", "q").await.unwrap();
        m.ingest("b", "Beta fact.", "q").await.unwrap();
        m.backdate("a", chrono::Duration::seconds(10));
        m.ingest("c", "Gamma fact.", "q").await.unwrap();

        assert_eq!(m.session_count(), 2);
        assert!(!m.has_session("a"));
        assert!(m.has_session("b"));
        assert!(m.has_session("c"));
    }

    #[tokio::test]
    async fn idle_eviction_skips_session_in_use() {
        let m = manager(MemoryConfig {
            idle_timeout_secs: 60,
            ..small_config()
        });
        m.ingest("writer", "Rest.", "q").await.unwrap();
        m.backdate("writer", chrono::Duration::seconds(120));

        let held = m.sessions.get("writer").map(|s| Arc::clone(s.value())).unwrap();
        let guard = held.session.lock().await;
        assert_eq!(m.evict_idle(Utc::now()), 0);
        assert!(m.has_session("writer"));

        drop(guard);
        drop(held);
        assert_eq!(m.evict_idle(Utc::now()), 1);
        assert!(!m.has_session("writer"));
    }

    #[tokio::test]
    #[tracing_test::traced_test]
    async fn max_users_skips_session_in_use() {
        let m = manager(MemoryConfig {
            max_users: 1,
            ..small_config()
        });
        m.ingest("a", "Alpha fact.", "q").await.unwrap();
        m.backdate("a", chrono::Duration::seconds(10));

        let held = m.sessions.get("a").map(|s| Arc::clone(s.value())).unwrap();
        m.ingest("b", "Beta fact.", "q").await.unwrap();
        assert!(m.has_session("a"));
        assert!(m.has_session("b"));
        assert!(logs_contain("deferring eviction"));

        drop(held);
        m.ingest("c", "Gamma fact.", "q").await.unwrap();
        assert!(!m.has_session("a"));
        assert!(!m.has_session("b"));
        assert!(m.has_session("c"));
        assert_eq!(m.session_count(), 1);
    }

    #[tokio::test]
    async fn write_through_held_slot_stays_attached() {
        let m = manager(MemoryConfig {
            idle_timeout_secs: 60,
            ..small_config()
        });
        m.ingest("u", "Rest.", "q").await.unwrap();
        m.backdate("u", chrono::Duration::seconds(120));

        // An ingest holds the slot across its embedding awaits.
        let slot = m.session("u");
        m.evict_idle(Utc::now() + chrono::Duration::seconds(600));
        slot.session.lock().await.stm = ShortTermMemory::new(1);
        drop(slot);

        assert!(m.has_session("u"));
        assert!(m.get_recent_history("u", 5).await.is_empty());
    }
}
