// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Response chunkers.
//!
//! [`LlmChunker`] asks the provider to split an answer into topic parts
//! separated by `---`, each starting with a `Topic:` line. When the provider
//! fails it falls back to [`SentenceChunker`], which packs whole sentences
//! into windows of at most 300 characters.

use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use hippo_core::types::{AdapterType, HealthStatus, ProviderMessage, ProviderRequest};
use hippo_core::{ChunkDraft, ChunkerAdapter, HippoError, PluginAdapter, ProviderAdapter};
use regex::Regex;
use tracing::{debug, warn};

use crate::text::split_sentences;

/// Maximum characters per sentence-window chunk.
pub const SENTENCE_WINDOW_CHARS: usize = 300;

/// Tag of every sentence-window chunk.
pub const FALLBACK_TAG: &str = "Medical Information";

static TOPIC_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?im)^\s*topic:\s*(.+)$").unwrap());

const CHUNK_PROMPT: &str = r#"You are a medical assistant helping organize and condense a clinical response.
If helpful, use the user's latest question for context to craft specific topics.
User's latest question (context): {question}
------------------------
{response}
------------------------
Please perform the following tasks:
- Break the text into semantically distinct parts, grouped by medical topic, symptom, assessment, plan, or instruction (exclude any disclaimer section).
- For each part, write a clear, concise summary. Keep key clinical instructions and exact medication names and doses.
- At the start of each part, write `Topic: <concise but specific sentence (10-20 words) capturing patient context, condition, and action>`.
- Separate each part using three dashes `---` on a new line.

Output only the structured summaries, separated by dashes."#;

fn build_chunk_prompt(response: &str, question: &str) -> String {
    CHUNK_PROMPT
        .replace("{question}", question.trim())
        .replace("{response}", response.trim())
}

/// Guess a topic for a part: an explicit `Topic:` line, else a short line
/// ending in `:`, else the first three words.
pub fn quick_extract_topic(part: &str) -> String {
    if let Some(caps) = TOPIC_LINE.captures(part) {
        return caps[1].trim().to_string();
    }
    for line in part.lines().map(str::trim) {
        if line.ends_with(':') && line.split_whitespace().count() <= 8 {
            return line.trim_end_matches(':').trim().to_string();
        }
    }
    part.split_whitespace()
        .take(3)
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches([':', '.', ','])
        .to_string()
}

/// Split provider output into drafts. The `Topic:` line becomes the tag and
/// is removed from the text.
pub fn parse_chunk_output(output: &str) -> Vec<ChunkDraft> {
    output
        .split("---")
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .filter_map(|part| {
            let tag = quick_extract_topic(part);
            let body = TOPIC_LINE.replace(part, "");
            let body = body.trim();
            let text = if body.is_empty() { part } else { body };
            (!text.is_empty()).then(|| ChunkDraft::new(tag, text))
        })
        .collect()
}

/// Deterministic chunker packing whole sentences into bounded windows.
#[derive(Debug, Clone, Default)]
pub struct SentenceChunker;

impl SentenceChunker {
    pub fn split(&self, response: &str) -> Vec<ChunkDraft> {
        let mut drafts = Vec::new();
        let mut window = String::new();
        for sentence in split_sentences(response) {
            let needed = if window.is_empty() {
                sentence.chars().count()
            } else {
                window.chars().count() + 1 + sentence.chars().count()
            };
            if needed > SENTENCE_WINDOW_CHARS && !window.is_empty() {
                drafts.push(ChunkDraft::new(FALLBACK_TAG, std::mem::take(&mut window)));
            }
            if !window.is_empty() {
                window.push(' ');
            }
            window.push_str(sentence);
        }
        if !window.is_empty() {
            drafts.push(ChunkDraft::new(FALLBACK_TAG, window));
        }
        drafts
    }
}

#[async_trait]
impl PluginAdapter for SentenceChunker {
    fn name(&self) -> &str {
        "sentence-chunker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Chunker
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl ChunkerAdapter for SentenceChunker {
    async fn chunk(&self, response: &str, _question: &str) -> Result<Vec<ChunkDraft>, HippoError> {
        Ok(self.split(response))
    }
}

/// Provider-backed topic chunker.
pub struct LlmChunker {
    provider: Arc<dyn ProviderAdapter>,
    model: String,
    max_tokens: u32,
    fallback: SentenceChunker,
}

impl LlmChunker {
    pub fn new(provider: Arc<dyn ProviderAdapter>, model: impl Into<String>, max_tokens: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            max_tokens,
            fallback: SentenceChunker,
        }
    }
}

#[async_trait]
impl PluginAdapter for LlmChunker {
    fn name(&self) -> &str {
        "llm-chunker"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Chunker
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        // Degraded rather than down: the sentence fallback still works.
        match self.provider.health_check().await {
            Ok(HealthStatus::Healthy) => Ok(HealthStatus::Healthy),
            Ok(HealthStatus::Degraded(msg)) | Ok(HealthStatus::Unhealthy(msg)) => {
                Ok(HealthStatus::Degraded(format!("provider: {msg}")))
            }
            Err(e) => Ok(HealthStatus::Degraded(format!("provider: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl ChunkerAdapter for LlmChunker {
    async fn chunk(&self, response: &str, question: &str) -> Result<Vec<ChunkDraft>, HippoError> {
        if response.trim().is_empty() {
            return Ok(Vec::new());
        }

        let request = ProviderRequest {
            model: self.model.clone(),
            system_prompt: None,
            messages: vec![ProviderMessage::user(build_chunk_prompt(response, question))],
            max_tokens: self.max_tokens,
            temperature: Some(0.2),
        };

        match self.provider.complete(request).await {
            Ok(reply) => {
                let drafts = parse_chunk_output(&reply.content);
                if drafts.is_empty() {
                    warn!("chunker: provider returned no parts, using sentence windows");
                    return Ok(self.fallback.split(response));
                }
                debug!(parts = drafts.len(), "chunker: provider split response");
                Ok(drafts)
            }
            Err(e) => {
                warn!(error = %e, "chunker: provider failed, using sentence windows");
                Ok(self.fallback.split(response))
            }
        }
    }
}
