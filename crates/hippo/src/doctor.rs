// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hippo doctor` command implementation.
//!
//! Runs diagnostic checks against the local environment: configuration,
//! embedding model files, the provider endpoint and the metrics recorder.
//! With `--deep` it also embeds a sample sentence and reports adapter health
//! from an assembled memory manager.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

use hippo_config::HippoConfig;
use hippo_core::types::HealthStatus;
use hippo_core::{EmbeddingAdapter, HippoError, PluginAdapter, ProviderAdapter};
use hippo_memory::{AdapterHealth, Embedder, ModelManager, OnnxEmbedder};
use metrics_exporter_prometheus::PrometheusHandle;

use crate::memory::build_manager;
use crate::provider::OpenAiProvider;
use crate::telemetry::hippo_samples;

const SAMPLE_TEXT: &str = "Patient reports mild chest pain after exercise.";

/// Status of a diagnostic check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

/// Result of a single diagnostic check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    pub duration: Duration,
}

impl CheckResult {
    fn new(name: &str, status: CheckStatus, message: impl Into<String>, start: Instant) -> Self {
        Self {
            name: name.to_string(),
            status,
            message: message.into(),
            duration: start.elapsed(),
        }
    }
}

/// Run the `hippo doctor` command.
///
/// With `--deep`, loads the embedding model and checks every adapter.
/// With `--plain`, disables colored output.
pub async fn run_doctor(
    config: &HippoConfig,
    deep: bool,
    plain: bool,
    metrics: Option<&PrometheusHandle>,
) -> Result<(), HippoError> {
    let use_color = !plain && std::io::stdout().is_terminal();
    let model_manager = ModelManager::new(
        config.memory.resolved_data_dir(),
        &config.memory.model_name,
    );
    let provider = Arc::new(OpenAiProvider::new(&config.provider)?);

    let mut results = vec![
        check_config(),
        check_model(&model_manager),
        check_provider(provider.as_ref()).await,
        check_metrics(metrics),
    ];

    if deep {
        match load_embedder(&model_manager).await {
            Ok(embedder) => {
                results.push(check_embedding(embedder.clone(), config.memory.embedding_dim).await);
                let manager = build_manager(config, embedder, provider);
                results.extend(manager.health_check().await.iter().map(adapter_result));
            }
            Err(result) => results.push(result),
        }
        results.push(check_memory_baseline());
    }

    println!();
    println!("  hippo doctor");
    println!("  {}", "-".repeat(50));
    for result in &results {
        println!("{}", format_line(result, use_color));
    }
    println!();

    let issues = results
        .iter()
        .filter(|r| r.status != CheckStatus::Pass)
        .count();
    if issues > 0 {
        let issue_word = if issues == 1 { "issue" } else { "issues" };
        println!("  {issues} {issue_word} found.");
        if !deep {
            println!("  Run with --deep for detailed diagnostics.");
        }
    } else {
        println!("  All checks passed.");
    }
    println!();

    Ok(())
}

fn format_line(result: &CheckResult, use_color: bool) -> String {
    let duration_ms = result.duration.as_millis();
    if use_color {
        use colored::Colorize;
        let (symbol, message) = match result.status {
            CheckStatus::Pass => ("✓".green(), result.message.normal()),
            CheckStatus::Warn => ("!".yellow(), result.message.yellow()),
            CheckStatus::Fail => ("✗".red(), result.message.red()),
        };
        format!("    {symbol} {:<20} {message} ({duration_ms}ms)", result.name)
    } else {
        let tag = match result.status {
            CheckStatus::Pass => "[OK]  ",
            CheckStatus::Warn => "[WARN]",
            CheckStatus::Fail => "[FAIL]",
        };
        format!(
            "    {tag} {:<20} {} ({duration_ms}ms)",
            result.name, result.message
        )
    }
}

fn check_config() -> CheckResult {
    let start = Instant::now();
    match hippo_config::load_and_validate() {
        Ok(_) => CheckResult::new("Configuration", CheckStatus::Pass, "valid", start),
        Err(errors) => CheckResult::new(
            "Configuration",
            CheckStatus::Fail,
            format!("{} error(s)", errors.len()),
            start,
        ),
    }
}

fn check_model(model_manager: &ModelManager) -> CheckResult {
    let start = Instant::now();
    if model_manager.is_model_available() {
        CheckResult::new(
            "Embedding model",
            CheckStatus::Pass,
            format!("present in {}", model_manager.model_dir().display()),
            start,
        )
    } else {
        CheckResult::new(
            "Embedding model",
            CheckStatus::Warn,
            format!(
                "not found in {} (downloaded on first run)",
                model_manager.model_dir().display()
            ),
            start,
        )
    }
}

async fn check_provider(provider: &dyn ProviderAdapter) -> CheckResult {
    let start = Instant::now();
    let status = provider
        .health_check()
        .await
        .unwrap_or_else(|e| HealthStatus::Unhealthy(e.to_string()));
    let (status, message) = health_to_check(status);
    CheckResult::new("Provider", status, message, start)
}

async fn load_embedder(
    model_manager: &ModelManager,
) -> Result<Arc<dyn EmbeddingAdapter>, CheckResult> {
    let start = Instant::now();
    if !model_manager.is_model_available() {
        return Err(CheckResult::new(
            "Embedder",
            CheckStatus::Warn,
            "skipped: model not downloaded",
            start,
        ));
    }
    match OnnxEmbedder::new(&model_manager.model_path()) {
        Ok(embedder) => Ok(Arc::new(embedder)),
        Err(e) => Err(CheckResult::new(
            "Embedder",
            CheckStatus::Fail,
            format!("load failed: {e}"),
            start,
        )),
    }
}

/// Embed a fixed sentence and validate the vector shape.
async fn check_embedding(embedder: Arc<dyn EmbeddingAdapter>, dim: usize) -> CheckResult {
    let start = Instant::now();
    match Embedder::new(embedder, dim).embed_one(SAMPLE_TEXT).await {
        Ok(vector) => CheckResult::new(
            "Embedder",
            CheckStatus::Pass,
            format!("{}-dim vector", vector.len()),
            start,
        ),
        Err(e) => CheckResult::new("Embedder", CheckStatus::Fail, e.to_string(), start),
    }
}

fn check_metrics(metrics: Option<&PrometheusHandle>) -> CheckResult {
    let start = Instant::now();
    match metrics {
        Some(handle) => {
            let rendered = handle.render();
            let series = hippo_samples(&rendered).len();
            CheckResult::new(
                "Metrics",
                CheckStatus::Pass,
                format!("prometheus recorder installed, {series} hippo series"),
                start,
            )
        }
        None => CheckResult::new("Metrics", CheckStatus::Warn, "no recorder installed", start),
    }
}

fn adapter_result(health: &AdapterHealth) -> CheckResult {
    let start = Instant::now();
    let (status, message) = health_to_check(health.status.clone());
    CheckResult::new(
        &format!("{} ({})", health.name, health.adapter_type),
        status,
        message,
        start,
    )
}

fn health_to_check(status: HealthStatus) -> (CheckStatus, String) {
    match status {
        HealthStatus::Healthy => (CheckStatus::Pass, "healthy".to_string()),
        HealthStatus::Degraded(msg) => (CheckStatus::Warn, format!("degraded: {msg}")),
        HealthStatus::Unhealthy(msg) => (CheckStatus::Fail, format!("unhealthy: {msg}")),
    }
}

fn check_memory_baseline() -> CheckResult {
    let start = Instant::now();

    #[cfg(not(target_env = "msvc"))]
    {
        let _ = tikv_jemalloc_ctl::epoch::advance();
        let allocated = tikv_jemalloc_ctl::stats::allocated::read().unwrap_or(0);
        let resident = tikv_jemalloc_ctl::stats::resident::read().unwrap_or(0);
        let allocated_mb = allocated as f64 / (1024.0 * 1024.0);
        let resident_mb = resident as f64 / (1024.0 * 1024.0);
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Pass,
            format!("heap: {allocated_mb:.1} MB, resident: {resident_mb:.1} MB"),
            start,
        )
    }

    #[cfg(target_env = "msvc")]
    {
        CheckResult::new(
            "Memory baseline",
            CheckStatus::Warn,
            "jemalloc not available on MSVC",
            start,
        )
    }
}

#[cfg(test)]
mod tests {
    use hippo_core::types::AdapterType;
    use hippo_test_utils::{MockEmbedder, MockProvider};

    use super::*;

    #[test]
    #[serial_test::serial]
    fn check_config_passes_with_defaults() {
        let result = check_config();
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.name, "Configuration");
    }

    #[test]
    fn missing_model_warns() {
        let manager = ModelManager::new(
            std::env::temp_dir().join("hippo-doctor-missing-model"),
            "no-such-model",
        );
        let result = check_model(&manager);
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.contains("downloaded on first run"));
    }

    #[tokio::test]
    async fn missing_model_skips_embedder() {
        let manager = ModelManager::new(
            std::env::temp_dir().join("hippo-doctor-missing-model"),
            "no-such-model",
        );
        let result = load_embedder(&manager).await.err().unwrap();
        assert_eq!(result.status, CheckStatus::Warn);
        assert!(result.message.starts_with("skipped"));
    }

    #[tokio::test]
    async fn provider_health_maps_to_status() {
        assert_eq!(
            check_provider(&MockProvider::new()).await.status,
            CheckStatus::Pass
        );
        let failing = check_provider(&MockProvider::failing()).await;
        assert_eq!(failing.status, CheckStatus::Fail);
        assert!(failing.message.starts_with("unhealthy"));
    }

    #[tokio::test]
    async fn embedding_check_validates_dimension() {
        let ok = check_embedding(Arc::new(MockEmbedder::new(384)), 384).await;
        assert_eq!(ok.status, CheckStatus::Pass);
        assert_eq!(ok.message, "384-dim vector");

        let wrong = check_embedding(Arc::new(MockEmbedder::new(16)), 384).await;
        assert_eq!(wrong.status, CheckStatus::Fail);
    }

    #[test]
    fn adapter_health_becomes_named_check() {
        let result = adapter_result(&AdapterHealth {
            name: "llm-chunker".into(),
            adapter_type: AdapterType::Chunker,
            status: HealthStatus::Degraded("provider: down".into()),
        });
        assert_eq!(result.status, CheckStatus::Warn);
        assert_eq!(result.name, format!("llm-chunker ({})", AdapterType::Chunker));
        assert_eq!(result.message, "degraded: provider: down");
    }

    #[test]
    fn metrics_check_counts_hippo_series() {
        use metrics_exporter_prometheus::PrometheusBuilder;

        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        metrics::with_local_recorder(&recorder, || {
            hippo_memory::recording::set_active_sessions(2);
            hippo_memory::recording::record_eviction();
        });

        let result = check_metrics(Some(&handle));
        assert_eq!(result.status, CheckStatus::Pass);
        assert_eq!(result.message, "prometheus recorder installed, 2 hippo series");

        assert_eq!(check_metrics(None).status, CheckStatus::Warn);
    }

    #[test]
    fn plain_lines_are_tagged() {
        let result = CheckResult {
            name: "Provider".into(),
            status: CheckStatus::Fail,
            message: "unhealthy: refused".into(),
            duration: Duration::from_millis(7),
        };
        let line = format_line(&result, false);
        assert!(line.starts_with("    [FAIL] Provider"));
        assert!(line.ends_with("unhealthy: refused (7ms)"));
    }

    #[test]
    fn memory_baseline_reports() {
        let result = check_memory_baseline();
        assert!(result.status == CheckStatus::Pass || result.status == CheckStatus::Warn);
    }
}
