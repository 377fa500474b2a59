// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! First-run download of the sentence-embedding model.
//!
//! Fetches the quantized ONNX export and its tokenizer from HuggingFace into
//! `<data_dir>/models/<model_name>/` and reuses them afterwards.

use std::path::{Path, PathBuf};

use hippo_core::HippoError;
use tokio::sync::OnceCell;
use tracing::info;

const HF_BASE: &str = "https://huggingface.co";

/// Resolves and downloads the embedding model files.
pub struct ModelManager {
    data_dir: PathBuf,
    model_name: String,
    ready: OnceCell<PathBuf>,
}

impl ModelManager {
    pub fn new(data_dir: PathBuf, model_name: impl Into<String>) -> Self {
        Self {
            data_dir,
            model_name: model_name.into(),
            ready: OnceCell::new(),
        }
    }

    pub fn model_dir(&self) -> PathBuf {
        self.data_dir.join("models").join(&self.model_name)
    }

    pub fn model_path(&self) -> PathBuf {
        self.model_dir().join("model.onnx")
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.model_dir().join("tokenizer.json")
    }

    pub fn is_model_available(&self) -> bool {
        self.model_path().exists() && self.tokenizer_path().exists()
    }

    fn sources(&self) -> [(&'static str, String); 2] {
        [
            (
                "model.onnx",
                format!(
                    "{HF_BASE}/onnx-community/{}-ONNX/resolve/main/onnx/model_quantized.onnx",
                    self.model_name
                ),
            ),
            (
                "tokenizer.json",
                format!(
                    "{HF_BASE}/sentence-transformers/{}/resolve/main/tokenizer.json",
                    self.model_name
                ),
            ),
        ]
    }

    /// Path of a usable `model.onnx`, downloading it first if missing.
    ///
    /// Concurrent callers share a single download.
    pub async fn ensure_model(&self) -> Result<PathBuf, HippoError> {
        self.ready
            .get_or_try_init(|| async {
                if !self.is_model_available() {
                    self.download().await?;
                }
                Ok(self.model_path())
            })
            .await
            .cloned()
    }

    async fn download(&self) -> Result<(), HippoError> {
        let model_dir = self.model_dir();
        info!(model = %self.model_name, "embedding model not found, downloading");

        tokio::fs::create_dir_all(&model_dir).await.map_err(|e| {
            HippoError::embedding(format!(
                "failed to create model directory {}: {e}",
                model_dir.display()
            ))
        })?;

        for (filename, url) in self.sources() {
            let dest = model_dir.join(filename);
            if dest.exists() {
                continue;
            }
            match download_file(&url, &dest).await {
                Ok(size) => info!(file = filename, bytes = size, "downloaded"),
                Err(e) => {
                    let _ = tokio::fs::remove_file(&dest).await;
                    return Err(e);
                }
            }
        }

        info!(path = %model_dir.display(), "embedding model ready");
        Ok(())
    }
}

async fn download_file(url: &str, dest: &Path) -> Result<usize, HippoError> {
    let response = reqwest::get(url)
        .await
        .map_err(|e| HippoError::embedding(format!("failed to download {url}: {e}")))?;

    if !response.status().is_success() {
        return Err(HippoError::embedding(format!(
            "download of {url} failed with status {}",
            response.status()
        )));
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| HippoError::embedding(format!("failed to read body of {url}: {e}")))?;

    tokio::fs::write(dest, &bytes)
        .await
        .map_err(|e| HippoError::embedding(format!("failed to write {}: {e}", dest.display())))?;

    Ok(bytes.len())
}
