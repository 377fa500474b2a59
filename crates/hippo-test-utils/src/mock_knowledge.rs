// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Fixed knowledge base returning the same snippets for every query.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use hippo_core::types::{AdapterType, HealthStatus};
use hippo_core::{HippoError, KnowledgeAdapter, PluginAdapter};

pub struct StaticKnowledge {
    snippets: Vec<String>,
    fail: AtomicBool,
}

impl StaticKnowledge {
    pub fn new(snippets: Vec<String>) -> Self {
        Self {
            snippets,
            fail: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl PluginAdapter for StaticKnowledge {
    fn name(&self) -> &str {
        "static-knowledge"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Knowledge
    }

    async fn health_check(&self) -> Result<HealthStatus, HippoError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), HippoError> {
        Ok(())
    }
}

#[async_trait]
impl KnowledgeAdapter for StaticKnowledge {
    async fn retrieve(&self, _query: &str, limit: usize) -> Result<Vec<String>, HippoError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(HippoError::Knowledge("static knowledge failure".into()));
        }
        Ok(self.snippets.iter().take(limit).cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn respects_limit() {
        let kb = StaticKnowledge::new(vec!["a".into(), "b".into(), "c".into()]);
        assert_eq!(kb.retrieve("q", 2).await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn failure_mode() {
        let kb = StaticKnowledge::new(vec!["a".into()]);
        kb.set_failing(true);
        assert!(kb.retrieve("q", 1).await.is_err());
    }
}
