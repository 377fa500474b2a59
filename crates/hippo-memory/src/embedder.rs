// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Embedding front door for the memory engine.
//!
//! [`Embedder`] wraps any [`EmbeddingAdapter`] and turns a bad vector (wrong
//! dimension, non-finite, all zeros) into an explicit error instead of letting
//! it poison similarity math. [`OnnxEmbedder`] is the local all-MiniLM-L6-v2
//! adapter, producing 384-dimensional vectors on CPU.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use ndarray::Array2;
use ort::session::Session;
use ort::session::builder::GraphOptimizationLevel;
use ort::value::TensorRef;

use hippo_core::types::{AdapterType, EmbeddingInput, EmbeddingOutput, HealthStatus};
use hippo_core::{EmbeddingAdapter, HippoError, PluginAdapter};

use crate::types::validate_vector;

/// Embedding dimensions for all-MiniLM-L6-v2.
pub const MINILM_DIM: usize = 384;

/// Validating, normalizing wrapper around an embedding adapter.
#[derive(Clone)]
pub struct Embedder {
    inner: Arc<dyn EmbeddingAdapter>,
    dim: usize,
}

impl Embedder {
    pub fn new(inner: Arc<dyn EmbeddingAdapter>, dim: usize) -> Self {
        Self { inner, dim }
    }

    /// Configured vector dimension.
    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn adapter(&self) -> &Arc<dyn EmbeddingAdapter> {
        &self.inner
    }

    /// Embed one text into a validated, L2-normalized vector.
    pub async fn embed_one(&self, text: &str) -> Result<Vec<f32>, HippoError> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| HippoError::embedding("embedding returned no vectors"))
    }

    /// Embed several texts; any bad vector fails the whole call.
    pub async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HippoError> {
        let output = self
            .inner
            .embed(EmbeddingInput {
                texts: texts.to_vec(),
            })
            .await?;

        if output.embeddings.len() != texts.len() {
            return Err(HippoError::embedding(format!(
                "expected {} vectors, got {}",
                texts.len(),
                output.embeddings.len()
            )));
        }

        output
            .embeddings
            .into_iter()
            .map(|v| {
                validate_vector(&v, self.dim)?;
                Ok(l2_normalize(&v))
            })
            .collect()
    }
}

/// Local all-MiniLM-L6-v2 adapter.
///
/// Every [`embed`](EmbeddingAdapter::embed) call is one forward pass: the texts
/// are tokenized, right-padded into a single batch, and each row is
/// mean-pooled over its real tokens. The model must emit [`MINILM_DIM`]-wide
/// token states; anything else is reported as an embedding error before
/// [`Embedder`] ever sees a vector.
pub struct OnnxEmbedder {
    session: Mutex<Session>,
    tokenizer: tokenizers::Tokenizer,
}

// Safety: the session is only touched with the mutex held, and encoding with
// the tokenizer takes `&self` without interior mutation.
unsafe impl Send for OnnxEmbedder {}
unsafe impl Sync for OnnxEmbedder {}

impl OnnxEmbedder {
    /// Open `model_path` (an ONNX file) and the `tokenizer.json` beside it.
    pub fn new(model_path: &Path) -> Result<Self, HippoError> {
        let tokenizer_path = model_path
            .parent()
            .map(|dir| dir.join("tokenizer.json"))
            .ok_or_else(|| {
                onnx_error(format!("{} has no parent directory", model_path.display()))
            })?;
        let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| onnx_error(format!("tokenizer {}: {e}", tokenizer_path.display())))?;

        let session = Session::builder()
            .map_err(model_error(model_path))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(model_error(model_path))?
            .with_intra_threads(1)
            .map_err(model_error(model_path))?
            .commit_from_file(model_path)
            .map_err(model_error(model_path))?;

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }

    /// Embed `texts` in one forward pass, one unit vector per text.
    pub fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, HippoError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let encodings = texts
            .iter()
            .map(|text| self.tokenizer.encode(text.as_str(), true))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| onnx_error(format!("cannot tokenize input: {e}")))?;
        let rows: Vec<TokenRow<'_>> = encodings
            .iter()
            .map(|e| TokenRow {
                ids: e.get_ids(),
                mask: e.get_attention_mask(),
                type_ids: e.get_type_ids(),
            })
            .collect();
        let batch = TokenBatch::padded(&rows);

        let ids = batch.array(&batch.ids)?;
        let mask = batch.array(&batch.mask)?;
        let type_ids = batch.array(&batch.type_ids)?;
        let (ids, mask, type_ids) = (
            tensor_view(&ids)?,
            tensor_view(&mask)?,
            tensor_view(&type_ids)?,
        );

        let mut session = self
            .session
            .lock()
            .map_err(|_| onnx_error("ONNX session lock poisoned".to_string()))?;
        let outputs = session
            .run(ort::inputs![
                "input_ids" => ids,
                "attention_mask" => mask,
                "token_type_ids" => type_ids
            ])
            .map_err(|e| onnx_error(format!("forward pass failed: {e}")))?;

        // Token states are [rows, width, hidden].
        let (shape, states) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| onnx_error(format!("unreadable model output: {e}")))?;
        let hidden = match shape.len() {
            0 => 0,
            n => shape[n - 1] as usize,
        };
        if hidden != MINILM_DIM {
            return Err(onnx_error(format!(
                "model emits {hidden}-wide token states, expected {MINILM_DIM}"
            )));
        }
        batch.pool(states, hidden)
    }
}

fn model_error<E: std::fmt::Display>(path: &Path) -> impl Fn(E) -> HippoError + '_ {
    move |e| onnx_error(format!("model {}: {e}", path.display()))
}

fn tensor_view(array: &Array2<i64>) -> Result<TensorRef<'_, i64>, HippoError> {
    TensorRef::from_array_view(array)
        .map_err(|e| onnx_error(format!("cannot build input tensor: {e}")))
}

fn onnx_error(message: String) -> HippoError {
    HippoError::Embedding {
        message,
        source: None,
    }
}

/// Tokenizer output for one text.
struct TokenRow<'a> {
    ids: &'a [u32],
    mask: &'a [u32],
    type_ids: &'a [u32],
}

/// Row-major model inputs, right-padded with zeros to the longest row.
#[derive(Debug, PartialEq)]
struct TokenBatch {
    rows: usize,
    width: usize,
    ids: Vec<i64>,
    mask: Vec<i64>,
    type_ids: Vec<i64>,
}

impl TokenBatch {
    fn padded(rows: &[TokenRow<'_>]) -> Self {
        let width = rows.iter().map(|r| r.ids.len()).max().unwrap_or(0);
        let cells = rows.len() * width;
        let mut batch = Self {
            rows: rows.len(),
            width,
            ids: Vec::with_capacity(cells),
            mask: Vec::with_capacity(cells),
            type_ids: Vec::with_capacity(cells),
        };
        for row in rows {
            pad_into(&mut batch.ids, row.ids, width);
            pad_into(&mut batch.mask, row.mask, width);
            pad_into(&mut batch.type_ids, row.type_ids, width);
        }
        batch
    }

    fn array(&self, cells: &[i64]) -> Result<Array2<i64>, HippoError> {
        Array2::from_shape_vec((self.rows, self.width), cells.to_vec())
            .map_err(|e| onnx_error(format!("input batch has the wrong shape: {e}")))
    }

    /// Mean-pool each row of `states` over its unmasked tokens, then normalize.
    fn pool(&self, states: &[f32], hidden: usize) -> Result<Vec<Vec<f32>>, HippoError> {
        let per_row = self.width * hidden;
        if hidden == 0 || states.len() != self.rows * per_row {
            return Err(onnx_error(format!(
                "model returned {} values for a {}x{}x{hidden} batch",
                states.len(),
                self.rows,
                self.width
            )));
        }
        Ok(states
            .chunks_exact(per_row)
            .zip(self.mask.chunks_exact(self.width))
            .map(|(tokens, mask)| l2_normalize(&masked_mean(tokens, mask, hidden)))
            .collect())
    }
}

fn pad_into(out: &mut Vec<i64>, row: &[u32], width: usize) {
    out.extend(row.iter().map(|&x| i64::from(x)));
    out.extend(std::iter::repeat_n(0, width.saturating_sub(row.len())));
}

/// Average of the token vectors whose mask entry is set.
fn masked_mean(tokens: &[f32], mask: &[i64], hidden: usize) -> Vec<f32> {
    let mut sum = vec![0.0f32; hidden];
    let mut kept = 0usize;
    for (token, _) in tokens.chunks_exact(hidden).zip(mask).filter(|(_, m)| **m > 0) {
        for (acc, v) in sum.iter_mut().zip(token) {
            *acc += v;
        }
        kept += 1;
    }
    if kept > 0 {
        let n = kept as f32;
        sum.iter_mut().for_each(|v| *v /= n);
    }
    sum
}

/// L2-normalize a vector; zero vectors come back unchanged.
pub fn l2_normalize(vec: &[f32]) -> Vec<f32> {
    let norm: f32 = vec.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        vec.iter().map(|v| v / norm).collect()
    } else {
        vec.to_vec()
    }
}

#[async_trait]
impl PluginAdapter for OnnxEmbedder {
    fn name(&self) -> &str {
        "onnx-embedder"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Embedding
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        Ok(match self.session.lock() {
            Ok(_) => HealthStatus::Healthy,
            Err(_) => HealthStatus::Unhealthy("ONNX session lock poisoned".into()),
        })
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl EmbeddingAdapter for OnnxEmbedder {
    async fn embed(&self, input: EmbeddingInput) -> Result<EmbeddingOutput, HippoError> {
        let embeddings = self.embed_batch(&input.texts)?;
        Ok(EmbeddingOutput {
            embeddings,
            dimensions: MINILM_DIM,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hippo_test_utils::MockEmbedder;

    #[test]
    fn l2_normalize_general_vector() {
        let n = l2_normalize(&[3.0, 4.0]);
        assert!((n[0] - 0.6).abs() < 0.001);
        assert!((n[1] - 0.8).abs() < 0.001);
    }

    #[test]
    fn l2_normalize_zero_vector() {
        assert_eq!(l2_normalize(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
    }

    fn row<'a>(ids: &'a [u32], mask: &'a [u32]) -> TokenRow<'a> {
        TokenRow {
            ids,
            mask,
            type_ids: mask,
        }
    }

    #[test]
    fn batch_pads_short_rows_with_masked_zeros() {
        let batch = TokenBatch::padded(&[row(&[101, 7, 102], &[1, 1, 1]), row(&[101, 102], &[1, 1])]);
        assert_eq!((batch.rows, batch.width), (2, 3));
        assert_eq!(batch.ids, vec![101, 7, 102, 101, 102, 0]);
        assert_eq!(batch.mask, vec![1, 1, 1, 1, 1, 0]);
        assert_eq!(batch.array(&batch.ids).unwrap().shape(), &[2, 3]);
    }

    #[test]
    fn masked_mean_ignores_padding() {
        let tokens = [1.0, 2.0, 3.0, 5.0, 9.0, 9.0];
        assert_eq!(masked_mean(&tokens, &[1, 1, 0], 2), vec![2.0, 3.5]);
        assert_eq!(masked_mean(&tokens, &[0, 0, 0], 2), vec![0.0, 0.0]);
    }

    #[test]
    fn pool_yields_one_unit_vector_per_row() {
        let batch = TokenBatch::padded(&[row(&[1, 2], &[1, 1]), row(&[3], &[1])]);
        // Row 0 averages to [2, 0]; row 1 keeps its only token, padding ignored.
        let states = [1.0, 0.0, 3.0, 0.0, 0.0, 4.0, 7.0, 7.0];
        let pooled = batch.pool(&states, 2).unwrap();
        assert_eq!(pooled, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn pool_rejects_mismatched_output() {
        let batch = TokenBatch::padded(&[row(&[1, 2], &[1, 1])]);
        let err = batch.pool(&[0.5; 6], 2).unwrap_err();
        assert!(matches!(err, HippoError::Embedding { .. }));
    }

    #[tokio::test]
    async fn embedder_normalizes_output() {
        let mock = Arc::new(MockEmbedder::new(2).with_vector("hello", vec![3.0, 4.0]));
        let embedder = Embedder::new(mock, 2);
        let v = embedder.embed_one("hello").await.unwrap();
        assert!((v[0] - 0.6).abs() < 1e-5);
        assert!((v[1] - 0.8).abs() < 1e-5);
    }

    #[tokio::test]
    async fn embedder_rejects_wrong_dimension() {
        let mock = Arc::new(MockEmbedder::new(3).with_vector("hello", vec![1.0, 0.0, 0.0]));
        let embedder = Embedder::new(mock, 4);
        let err = embedder.embed_one("hello").await.unwrap_err();
        assert!(matches!(err, HippoError::Embedding { .. }));
    }

    #[tokio::test]
    async fn embedder_rejects_zero_vector() {
        let mock = Arc::new(MockEmbedder::new(2).with_vector("silence", vec![0.0, 0.0]));
        let embedder = Embedder::new(mock, 2);
        assert!(embedder.embed_one("silence").await.is_err());
    }

    #[tokio::test]
    async fn embedder_propagates_adapter_failure() {
        let mock = Arc::new(MockEmbedder::new(2).failing_on("boom"));
        let embedder = Embedder::new(mock, 2);
        assert!(embedder.embed_one("boom").await.is_err());
        assert!(embedder.embed_one("fine words").await.is_ok());
    }
}
