// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all memory metric descriptions.
pub fn register_metrics() {
    describe_counter!("hippo_ingest_chunks_total", "Chunks ingested, by outcome");
    describe_counter!("hippo_ltm_evictions_total", "Long-term chunks evicted at capacity");
    describe_counter!(
        "hippo_context_fallback_total",
        "Context requests served without a summary, by tier"
    );
    describe_gauge!("hippo_active_sessions", "Live user sessions");
    describe_counter!("hippo_session_resets_total", "Sessions dropped, by reason");
    describe_histogram!(
        "hippo_summarize_latency_seconds",
        "Summarization delegate latency in seconds"
    );
}

/// Record one chunk passing through ingestion (`stored` or `skipped`).
pub fn record_ingest_chunk(outcome: &'static str) {
    metrics::counter!("hippo_ingest_chunks_total", "outcome" => outcome).increment(1);
}

pub fn record_eviction() {
    metrics::counter!("hippo_ltm_evictions_total").increment(1);
}

/// Record a context served from a fallback tier.
pub fn record_fallback(tier: &'static str) {
    metrics::counter!("hippo_context_fallback_total", "tier" => tier).increment(1);
}

pub fn set_active_sessions(count: usize) {
    metrics::gauge!("hippo_active_sessions").set(count as f64);
}

/// Record a dropped session (`explicit`, `idle`, `capacity`, `corrupted`).
pub fn record_session_reset(reason: &'static str) {
    metrics::counter!("hippo_session_resets_total", "reason" => reason).increment(1);
}

pub fn record_summarize_latency(seconds: f64) {
    metrics::histogram!("hippo_summarize_latency_seconds").record(seconds);
}
