// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Memory manager assembly shared by `shell` and `doctor`.

use std::sync::Arc;

use hippo_config::HippoConfig;
use hippo_core::{EmbeddingAdapter, HippoError, ProviderAdapter};
use hippo_memory::{LlmChunker, MemoryManager, ModelManager, OnnxEmbedder};
use tracing::info;

/// Token budget for one topic-chunking call.
const CHUNK_MAX_TOKENS: u32 = 1024;

/// Download the embedding model if needed, then build the manager.
pub async fn initialize_memory(
    config: &HippoConfig,
    provider: Arc<dyn ProviderAdapter>,
) -> Result<Arc<MemoryManager>, HippoError> {
    let model_manager = ModelManager::new(
        config.memory.resolved_data_dir(),
        &config.memory.model_name,
    );
    info!("ensuring embedding model is available...");
    let model_path = model_manager.ensure_model().await?;
    info!(path = %model_path.display(), "embedding model ready");

    let embedder = Arc::new(OnnxEmbedder::new(&model_path)?);
    Ok(Arc::new(build_manager(config, embedder, provider)))
}

/// Wire a manager whose chunker and summarizer both use `provider`.
pub fn build_manager(
    config: &HippoConfig,
    embedder: Arc<dyn EmbeddingAdapter>,
    provider: Arc<dyn ProviderAdapter>,
) -> MemoryManager {
    let chunker = LlmChunker::new(provider.clone(), &config.provider.model, CHUNK_MAX_TOKENS);
    MemoryManager::new(config.memory.clone(), embedder, Arc::new(chunker)).with_summarizer(
        provider,
        &config.provider.model,
        config.provider.summary_max_tokens,
    )
}
