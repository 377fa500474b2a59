// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Flat inner-product index over a user's long-term chunk vectors.
//!
//! Rows are L2-normalized on build, so a matrix-vector product yields cosine
//! similarities. The index is a derived cache: it is rebuilt from the pool and
//! never mutated in place.

use ndarray::{Array1, Array2};

use crate::embedder::l2_normalize;

#[derive(Debug, Clone)]
pub struct VectorIndex {
    /// One row per indexed vector, in pool order.
    matrix: Array2<f32>,
}

impl VectorIndex {
    /// An index with no rows.
    pub fn empty(dim: usize) -> Self {
        Self {
            matrix: Array2::zeros((0, dim)),
        }
    }

    /// Build from vectors of dimension `dim`. Vectors of any other length are
    /// skipped, which the caller detects as a row-count mismatch.
    pub fn build<'a>(vectors: impl IntoIterator<Item = &'a [f32]>, dim: usize) -> Self {
        let mut data = Vec::new();
        let mut rows = 0;
        for v in vectors.into_iter().filter(|v| v.len() == dim) {
            data.extend(l2_normalize(v));
            rows += 1;
        }
        let matrix = Array2::from_shape_vec((rows, dim), data)
            .unwrap_or_else(|_| Array2::zeros((0, dim)));
        Self { matrix }
    }

    /// Number of indexed rows.
    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn dim(&self) -> usize {
        self.matrix.ncols()
    }

    /// Cosine similarity of `query` against every row, in row order.
    pub fn similarities(&self, query: &[f32]) -> Vec<f32> {
        if query.len() != self.dim() || self.is_empty() {
            return Vec::new();
        }
        let q = Array1::from(l2_normalize(query));
        self.matrix.dot(&q).to_vec()
    }

    /// Top `k` rows by similarity as `(row, similarity)`, highest first.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        let mut scored: Vec<(usize, f32)> =
            self.similarities(query).into_iter().enumerate().collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored
    }
}
