// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock LLM provider adapter for deterministic testing.
//!
//! `MockProvider` implements `ProviderAdapter` with scripted replies, so the
//! summarization and chunking paths can be tested without network calls.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use hippo_core::types::{
    AdapterType, HealthStatus, ProviderRequest, ProviderResponse, TokenUsage,
};
use hippo_core::{HippoError, PluginAdapter, ProviderAdapter};

/// A scripted reply: text or a provider error message.
type Reply = Result<String, String>;

/// A mock LLM provider that returns pre-configured replies.
///
/// Replies are popped from a FIFO queue. When the queue is empty,
/// a default "mock response" text is returned.
pub struct MockProvider {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<ProviderRequest>>>,
    fail_all: AtomicBool,
    hang: AtomicBool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(VecDeque::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
            fail_all: AtomicBool::new(false),
            hang: AtomicBool::new(false),
        }
    }

    /// Create a mock provider pre-loaded with the given replies.
    pub fn with_responses(responses: Vec<String>) -> Self {
        let provider = Self::new();
        if let Ok(mut queue) = provider.replies.try_lock() {
            queue.extend(responses.into_iter().map(Ok));
        }
        provider
    }

    /// A provider whose every call fails.
    pub fn failing() -> Self {
        let provider = Self::new();
        provider.fail_all.store(true, Ordering::SeqCst);
        provider
    }

    /// A provider whose every call never completes.
    pub fn hanging() -> Self {
        let provider = Self::new();
        provider.hang.store(true, Ordering::SeqCst);
        provider
    }

    /// Add a reply to the end of the queue.
    pub async fn add_response(&self, text: impl Into<String>) {
        self.replies.lock().await.push_back(Ok(text.into()));
    }

    /// Queue a single failing reply.
    pub async fn add_error(&self, message: impl Into<String>) {
        self.replies.lock().await.push_back(Err(message.into()));
    }

    /// Every request received so far.
    pub async fn requests(&self) -> Vec<ProviderRequest> {
        self.requests.lock().await.clone()
    }

    async fn next_reply(&self) -> Reply {
        self.replies
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok("mock response".to_string()))
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PluginAdapter for MockProvider {
    fn name(&self) -> &str {
        "mock-provider"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Provider
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        if self.fail_all.load(Ordering::SeqCst) {
            Ok(HealthStatus::Unhealthy("mock provider set to fail".into()))
        } else {
            Ok(HealthStatus::Healthy)
        }
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl ProviderAdapter for MockProvider {
    async fn complete(&self, request: ProviderRequest) -> Result<ProviderResponse, HippoError> {
        let model = request.model.clone();
        self.requests.lock().await.push(request);

        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.fail_all.load(Ordering::SeqCst) {
            return Err(HippoError::provider("mock provider failure"));
        }

        let content = self.next_reply().await.map_err(HippoError::provider)?;
        Ok(ProviderResponse {
            id: format!("mock-resp-{}", uuid::Uuid::new_v4()),
            content,
            model,
            stop_reason: Some("stop".to_string()),
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use hippo_core::types::ProviderMessage;

    fn req() -> ProviderRequest {
        ProviderRequest {
            model: "test-model".to_string(),
            system_prompt: None,
            messages: vec![ProviderMessage::user("hi")],
            max_tokens: 100,
            temperature: None,
        }
    }

    #[tokio::test]
    async fn default_response_when_queue_empty() {
        let provider = MockProvider::new();
        let resp = provider.complete(req()).await.unwrap();
        assert_eq!(resp.content, "mock response");
        assert_eq!(resp.model, "test-model");
    }

    #[tokio::test]
    async fn queued_responses_returned_in_order() {
        let provider = MockProvider::with_responses(vec!["first".into(), "second".into()]);
        assert_eq!(provider.complete(req()).await.unwrap().content, "first");
        assert_eq!(provider.complete(req()).await.unwrap().content, "second");
        assert_eq!(provider.complete(req()).await.unwrap().content, "mock response");
        assert_eq!(provider.requests().await.len(), 3);
    }

    #[tokio::test]
    async fn scripted_error_then_success() {
        let provider = MockProvider::new();
        provider.add_error("rate limited").await;
        provider.add_response("ok").await;
        assert!(provider.complete(req()).await.is_err());
        assert_eq!(provider.complete(req()).await.unwrap().content, "ok");
    }

    #[tokio::test]
    async fn failing_provider_always_errors() {
        let provider = MockProvider::failing();
        assert!(provider.complete(req()).await.is_err());
        assert!(matches!(
            provider.health_check().await.unwrap(),
            HealthStatus::Unhealthy(_)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn hanging_provider_never_returns() {
        let provider = MockProvider::hanging();
        let result = tokio::time::timeout(Duration::from_secs(5), provider.complete(req())).await;
        assert!(result.is_err());
    }
}
