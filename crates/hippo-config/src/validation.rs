// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde attributes,
//! such as threshold ordering, non-zero capacities, and known log levels.

use crate::diagnostic::ConfigError;
use crate::model::HippoConfig;

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &HippoConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();
    let mut fail = |message: String| errors.push(ConfigError::Validation { message });

    let memory = &config.memory;

    for (name, value) in [
        ("memory.max_users", memory.max_users),
        ("memory.stm_capacity", memory.stm_capacity),
        ("memory.ltm_capacity", memory.ltm_capacity),
        ("memory.top_k", memory.top_k),
        ("memory.embedding_dim", memory.embedding_dim),
        ("memory.max_context_chars", memory.max_context_chars),
    ] {
        if value == 0 {
            fail(format!("{name} must be at least 1"));
        }
    }

    for (name, value) in [
        ("memory.merge_threshold", memory.merge_threshold),
        ("memory.identical_threshold", memory.identical_threshold),
        ("memory.min_similarity", memory.min_similarity),
    ] {
        if !(0.0..=1.0).contains(&value) {
            fail(format!("{name} must be within [0, 1], got {value}"));
        }
    }

    if memory.merge_threshold >= memory.identical_threshold {
        fail(format!(
            "memory.merge_threshold ({}) must be below memory.identical_threshold ({})",
            memory.merge_threshold, memory.identical_threshold
        ));
    }

    if memory.min_similarity > memory.merge_threshold {
        fail(format!(
            "memory.min_similarity ({}) must not exceed memory.merge_threshold ({})",
            memory.min_similarity, memory.merge_threshold
        ));
    }

    if memory.decay_half_life_secs == 0 {
        fail("memory.decay_half_life_secs must be at least 1".to_string());
    }

    if memory.summarize_timeout_secs == 0 {
        fail("memory.summarize_timeout_secs must be at least 1".to_string());
    }

    for (name, value) in [
        ("memory.usage_weight", memory.usage_weight),
        ("memory.recency_weight", memory.recency_weight),
    ] {
        if !value.is_finite() || value < 0.0 {
            fail(format!("{name} must be a non-negative number, got {value}"));
        }
    }

    if memory.model_name.trim().is_empty() {
        fail("memory.model_name must not be empty".to_string());
    }

    if !LOG_LEVELS.contains(&config.agent.log_level.as_str()) {
        fail(format!(
            "agent.log_level `{}` is not one of {}",
            config.agent.log_level,
            LOG_LEVELS.join(", ")
        ));
    }

    let base_url = config.provider.base_url.trim();
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        fail(format!(
            "provider.base_url `{base_url}` must start with http:// or https://"
        ));
    }

    if config.provider.model.trim().is_empty() {
        fail("provider.model must not be empty".to_string());
    }

    if config.provider.summary_max_tokens == 0 {
        fail("provider.summary_max_tokens must be at least 1".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn has_error(errors: &[ConfigError], needle: &str) -> bool {
        errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains(needle)))
    }

    #[test]
    fn default_config_validates() {
        let config = HippoConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn zero_stm_capacity_fails_validation() {
        let mut config = HippoConfig::default();
        config.memory.stm_capacity = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "memory.stm_capacity"));
    }

    #[test]
    fn inverted_thresholds_fail_validation() {
        let mut config = HippoConfig::default();
        config.memory.merge_threshold = 0.95;
        config.memory.identical_threshold = 0.9;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "must be below memory.identical_threshold"));
    }

    #[test]
    fn out_of_range_similarity_fails_validation() {
        let mut config = HippoConfig::default();
        config.memory.min_similarity = -0.1;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "memory.min_similarity must be within"));
    }

    #[test]
    fn collects_all_errors_without_failing_fast() {
        let mut config = HippoConfig::default();
        config.memory.ltm_capacity = 0;
        config.memory.top_k = 0;
        config.agent.log_level = "loud".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 3);
    }

    #[test]
    fn non_http_base_url_fails_validation() {
        let mut config = HippoConfig::default();
        config.provider.base_url = "localhost:11434".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "provider.base_url"));
    }

    #[test]
    fn negative_weight_fails_validation() {
        let mut config = HippoConfig::default();
        config.memory.usage_weight = -1.0;
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "memory.usage_weight"));
    }

    #[test]
    fn equal_merge_and_identical_thresholds_are_rejected() {
        let mut config = HippoConfig::default();
        config.memory.merge_threshold = 0.9;
        config.memory.identical_threshold = 0.9;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn min_similarity_may_equal_merge_threshold() {
        let mut config = HippoConfig::default();
        config.memory.min_similarity = 0.75;
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn blank_provider_model_fails_validation() {
        let mut config = HippoConfig::default();
        config.provider.model = "  ".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(has_error(&errors, "provider.model"));
    }
}
