// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Hippo memory engine.
//!
//! This crate provides the foundational trait definitions, error types, and
//! common types used throughout the Hippo workspace. Every external
//! collaborator (embedding model, LLM provider, chunker, knowledge base)
//! is reached through a trait defined here.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::HippoError;
pub use types::{AdapterType, ChunkDraft, HealthStatus};

// Re-export all adapter traits at crate root.
pub use traits::{
    ChunkerAdapter, EmbeddingAdapter, KnowledgeAdapter, PluginAdapter, ProviderAdapter,
};
