// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Hippo.
//!
//! Provides mock adapters for fast, deterministic, CI-runnable tests without
//! model files or network access.
//!
//! # Components
//!
//! - [`MockEmbedder`] - bag-of-words embedder with exact-vector overrides
//! - [`MockProvider`] - scripted LLM provider with failure and hang modes
//! - [`MockChunker`] - paragraph chunker with scripted drafts
//! - [`StaticKnowledge`] - fixed knowledge-base snippets

pub mod mock_chunker;
pub mod mock_embedder;
pub mod mock_knowledge;
pub mod mock_provider;

pub use mock_chunker::MockChunker;
pub use mock_embedder::MockEmbedder;
pub use mock_knowledge::StaticKnowledge;
pub use mock_provider::MockProvider;

/// Unit vector of `dim` components pointing at `axis` rotated towards
/// `axis + 1` so that its cosine with the pure `axis` vector is `cos`.
///
/// Handy for building vectors with an exact pairwise similarity.
pub fn vector_with_similarity(dim: usize, axis: usize, cos: f32) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[axis % dim] = cos;
    v[(axis + 1) % dim] = (1.0 - cos * cos).max(0.0).sqrt();
    v
}

/// Unit vector along `axis`.
pub fn axis_vector(dim: usize, axis: usize) -> Vec<f32> {
    let mut v = vec![0.0; dim];
    v[axis % dim] = 1.0;
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn similarity_helper_hits_target() {
        let base = axis_vector(8, 2);
        let near = vector_with_similarity(8, 2, 0.8);
        assert!((dot(&base, &near) - 0.8).abs() < 1e-6);
        assert!((dot(&near, &near) - 1.0).abs() < 1e-6);
    }
}
