// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Adapter trait definitions for the collaborators of the memory engine.
//!
//! All adapters extend the [`PluginAdapter`] base trait and use
//! `#[async_trait]` for dynamic dispatch compatibility.

pub mod adapter;
pub mod chunker;
pub mod embedding;
pub mod knowledge;
pub mod provider;

// Re-export all traits at the traits module level for convenience.
pub use adapter::PluginAdapter;
pub use chunker::ChunkerAdapter;
pub use embedding::EmbeddingAdapter;
pub use knowledge::KnowledgeAdapter;
pub use provider::ProviderAdapter;
