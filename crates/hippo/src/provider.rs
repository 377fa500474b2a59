// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! OpenAI-compatible chat completions provider.
//!
//! Talks to any server exposing `/v1/chat/completions` (Ollama, vLLM,
//! OpenAI). Used for answers in the shell, context summaries and topic
//! chunking.

use std::time::Duration;

use async_trait::async_trait;
use hippo_config::ProviderConfig;
use hippo_core::types::{
    AdapterType, HealthStatus, ProviderMessage, ProviderRequest, ProviderResponse, TokenUsage,
};
use hippo_core::{HippoError, PluginAdapter, ProviderAdapter};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ProviderMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ApiErrorResponse {
    error: ApiError,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// Provider for OpenAI-compatible chat completion servers.
#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    base_url: String,
    default_model: String,
    max_retries: u32,
}

impl OpenAiProvider {
    /// Build a provider from the `[provider]` section.
    ///
    /// The API key comes from the config or `OPENAI_API_KEY`. Without either,
    /// no Authorization header is sent, which local servers accept.
    pub fn new(config: &ProviderConfig) -> Result<Self, HippoError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = resolve_api_key(&config.api_key) {
            let value = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|e| HippoError::Config(format!("invalid API key header value: {e}")))?;
            headers.insert(AUTHORIZATION, value);
        }

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| HippoError::Provider {
                message: format!("failed to build HTTP client: {e}"),
                source: Some(Box::new(e)),
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            default_model: config.model.clone(),
            max_retries: 1,
        })
    }

    pub fn default_model(&self) -> &str {
        &self.default_model
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn to_chat_request<'a>(&'a self, request: &'a ProviderRequest) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(request.messages.len() + 1);
        if let Some(system) = &request.system_prompt {
            messages.push(ProviderMessage {
                role: "system".to_string(),
                content: system.clone(),
            });
        }
        messages.extend(request.messages.iter().cloned());

        let model = if request.model.is_empty() {
            self.default_model.as_str()
        } else {
            request.model.as_str()
        };

        ChatRequest {
            model,
            messages,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
        }
    }
}

#[async_trait]
impl PluginAdapter for OpenAiProvider {
    fn name(&self) -> &str {
        "openai-compatible"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        // Lists models instead of completing, so health checks cost no tokens.
        let url = format!("{}/v1/models", self.base_url);
        match self.client.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(resp) if resp.status().is_success() => Ok(HealthStatus::Healthy),
            Ok(resp) => Ok(HealthStatus::Degraded(format!(
                "{url} returned {}",
                resp.status()
            ))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("{url} unreachable: {e}"))),
        }
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for OpenAiProvider {
    /// Retries once after a second on 429, 500, 502 and 503.
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, HippoError> {
        let body = self.to_chat_request(&request);
        let url = self.completions_url();
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                warn!(attempt, "retrying completion request after transient error");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }

            let response = self
                .client
                .post(&url)
                .json(&body)
                .send()
                .await
                .map_err(|e| HippoError::Provider {
                    message: format!("HTTP request failed: {e}"),
                    source: Some(Box::new(e)),
                })?;

            let status = response.status();
            debug!(status = %status, attempt, model = body.model, "completion response received");

            if status.is_success() {
                let parsed: ChatResponse = response.json().await.map_err(|e| HippoError::Provider {
                    message: format!("failed to parse API response: {e}"),
                    source: Some(Box::new(e)),
                })?;
                return into_provider_response(parsed, body.model);
            }

            let text = response.text().await.unwrap_or_default();
            if is_transient_error(status) && attempt < self.max_retries {
                warn!(status = %status, body = %text, "transient error, will retry");
                last_error = Some(HippoError::provider(format!("API returned {status}: {text}")));
                continue;
            }

            let message = match serde_json::from_str::<ApiErrorResponse>(&text) {
                Ok(api_err) => format!("API error ({status}): {}", api_err.error.message),
                Err(_) => format!("API returned {status}: {text}"),
            };
            return Err(HippoError::provider(message));
        }

        Err(last_error
            .unwrap_or_else(|| HippoError::provider("completion request failed after retries")))
    }
}

fn into_provider_response(
    parsed: ChatResponse,
    requested_model: &str,
) -> Result<ProviderResponse, HippoError> {
    let choice = parsed
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| HippoError::provider("no choices in completion response"))?;

    let usage = parsed
        .usage
        .map(|u| TokenUsage {
            input_tokens: u.prompt_tokens,
            output_tokens: u.completion_tokens,
        })
        .unwrap_or_default();

    Ok(ProviderResponse {
        id: parsed.id,
        content: choice.message.content.unwrap_or_default(),
        model: if parsed.model.is_empty() {
            requested_model.to_string()
        } else {
            parsed.model
        },
        stop_reason: choice.finish_reason,
        usage,
    })
}

fn resolve_api_key(config_key: &Option<String>) -> Option<String> {
    if let Some(key) = config_key
        && !key.is_empty()
    {
        return Some(key.clone());
    }
    std::env::var("OPENAI_API_KEY")
        .ok()
        .filter(|k| !k.is_empty())
}

fn is_transient_error(status: reqwest::StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503)
}
