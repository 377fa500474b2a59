// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus recorder for the memory metrics.
//!
//! The recorder is process-global and installed once at startup. Its handle
//! renders the Prometheus text format for `/metrics` in the shell and for the
//! doctor's metrics check.

use hippo_core::HippoError;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{info, warn};

/// Install the Prometheus recorder and register metric descriptions.
///
/// Failure leaves the `metrics` facade a no-op; the caller keeps running.
pub fn install_metrics() -> Option<PrometheusHandle> {
    match install_recorder() {
        Ok(handle) => {
            hippo_memory::recording::register_metrics();
            info!("prometheus metrics recorder installed");
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "metrics disabled");
            None
        }
    }
}

fn install_recorder() -> Result<PrometheusHandle, HippoError> {
    PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| HippoError::Internal(format!("failed to install Prometheus recorder: {e}")))
}

/// Sample lines of hippo's own series, without `# HELP` / `# TYPE` comments.
pub fn hippo_samples(rendered: &str) -> Vec<&str> {
    rendered
        .lines()
        .filter(|line| line.starts_with("hippo_"))
        .collect()
}
