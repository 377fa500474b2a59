// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Hybrid conversational memory for the Hippo engine.
//!
//! Each user gets a short-term memory of recent summarized turns and a
//! bounded long-term pool of topic chunks searched by embedding similarity.
//! Retrieval blends both (plus optional knowledge-base snippets) into one
//! context paragraph through a summarization delegate, with a deterministic
//! fallback when the delegate fails.
//!
//! ## Architecture
//!
//! - **MemoryManager**: per-user sessions, ingest and retrieval API
//! - **ShortTermMemory** / **LongTermMemory**: the two tiers
//! - **VectorIndex**: lazily rebuilt inner-product index over LTM vectors
//! - **EvictionPolicy**: usage- and recency-weighted eviction score
//! - **LlmChunker** / **SentenceChunker**: response chunking
//! - **Embedder** / **OnnxEmbedder** / **ModelManager**: embeddings
//! - **selector**: summarization outcome and fallback chain

pub mod chunker;
pub mod embedder;
pub mod index;
pub mod ltm;
pub mod manager;
pub mod model_manager;
pub mod recording;
pub mod scoring;
pub mod selector;
pub mod stm;
pub mod text;
pub mod types;

pub use chunker::{LlmChunker, SentenceChunker};
pub use embedder::{Embedder, OnnxEmbedder};
pub use index::VectorIndex;
pub use ltm::LongTermMemory;
pub use manager::{AdapterHealth, MemoryManager};
pub use model_manager::ModelManager;
pub use scoring::EvictionPolicy;
pub use selector::{ContextSource, SummaryOutcome};
pub use stm::ShortTermMemory;
pub use types::*;
