// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Context selection.
//!
//! The summarization call is reduced to a [`SummaryOutcome`]; the pure
//! [`select_context`] then walks the fallback chain: summary, long-term hits,
//! short-term entries, empty.

use std::time::Duration;

use hippo_core::ProviderAdapter;
use hippo_core::types::{ProviderMessage, ProviderRequest};
use tracing::{debug, warn};

use crate::text::truncate_chars;
use crate::types::StmEntry;

/// Reply the summarizer gives when nothing in the context is relevant.
pub const NO_CONTEXT_SENTINEL: &str = "No relevant context found";

const SUMMARY_PROMPT: &str = r#"You are a medical assistant creating a concise summary of conversation context for continuity.

Current user query: "{query}"

Available context information:
{context}

Task: Create a brief, coherent summary that captures the key points from the conversation history and relevant medical information that are important for understanding the current query.

Guidelines:
1. Focus on ongoing symptoms, diagnoses, treatments, or recommendations mentioned
2. Include any patient concerns or questions that are still relevant
3. Highlight any follow-up needs or pending clarifications
4. Keep the summary concise; do not add disclaimers

Output: Provide a single, well-structured summary paragraph that can be used as context for answering the current query.
If no relevant context exists, return "No relevant context found.""#;

/// How the summarization delegate ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SummaryOutcome {
    /// A usable summary paragraph.
    Summary(String),
    /// The delegate answered that nothing is relevant.
    NoContext,
    /// The delegate did not answer in time.
    Timeout,
    /// The delegate failed or answered with nothing.
    Failed(String),
}

/// Where the served context came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextSource {
    Summary,
    NoContext,
    LongTerm,
    ShortTerm,
    Empty,
}

impl ContextSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContextSource::Summary => "summary",
            ContextSource::NoContext => "no_context",
            ContextSource::LongTerm => "ltm",
            ContextSource::ShortTerm => "stm",
            ContextSource::Empty => "empty",
        }
    }

    /// Whether the summary was not used.
    pub fn is_fallback(&self) -> bool {
        matches!(
            self,
            ContextSource::LongTerm | ContextSource::ShortTerm | ContextSource::Empty
        )
    }
}

/// Everything gathered for one query before summarization.
#[derive(Debug, Clone, Default)]
pub struct ContextInputs {
    /// Short-term entries, oldest first.
    pub history: Vec<StmEntry>,
    /// Rendered long-term hits, best first.
    pub ltm_hits: Vec<String>,
    /// External knowledge-base snippets.
    pub knowledge: Vec<String>,
}

impl ContextInputs {
    pub fn is_empty(&self) -> bool {
        self.history.is_empty() && self.ltm_hits.is_empty() && self.knowledge.is_empty()
    }

    pub fn ltm_concat(&self) -> String {
        self.ltm_hits.join("\n\n")
    }

    pub fn stm_concat(&self) -> String {
        self.history
            .iter()
            .map(StmEntry::render)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

pub fn build_summary_prompt(query: &str, inputs: &ContextInputs) -> String {
    let mut parts = Vec::new();
    if !inputs.history.is_empty() {
        let history = inputs
            .history
            .iter()
            .map(|e| format!("User: {}\nBot: {}", e.question_context, e.render()))
            .collect::<Vec<_>>()
            .join("\n");
        parts.push(format!("Recent conversation history:\n{history}"));
    }
    if !inputs.ltm_hits.is_empty() {
        parts.push(format!(
            "Semantically relevant historical medical information:\n{}",
            inputs.ltm_hits.join("\n")
        ));
    }
    if !inputs.knowledge.is_empty() {
        parts.push(format!(
            "Reference medical knowledge:\n{}",
            inputs.knowledge.join("\n")
        ));
    }
    SUMMARY_PROMPT
        .replace("{query}", query.trim())
        .replace("{context}", &parts.join("\n\n"))
}

/// Ask `provider` for a summary, bounded by `timeout`. Never errors.
pub async fn summarize(
    provider: &dyn ProviderAdapter,
    model: &str,
    max_tokens: u32,
    query: &str,
    inputs: &ContextInputs,
    timeout: Duration,
) -> SummaryOutcome {
    let request = ProviderRequest {
        model: model.to_string(),
        system_prompt: None,
        messages: vec![ProviderMessage::user(build_summary_prompt(query, inputs))],
        max_tokens,
        temperature: Some(0.2),
    };

    match tokio::time::timeout(timeout, provider.complete(request)).await {
        Ok(Ok(reply)) => classify_reply(&reply.content),
        Ok(Err(e)) => {
            warn!(error = %e, "summarizer failed");
            SummaryOutcome::Failed(e.to_string())
        }
        Err(_) => {
            warn!(timeout_secs = timeout.as_secs_f64(), "summarizer timed out");
            SummaryOutcome::Timeout
        }
    }
}

fn classify_reply(content: &str) -> SummaryOutcome {
    let summary = content.trim();
    if summary.is_empty() {
        SummaryOutcome::Failed("empty summary".into())
    } else if summary.contains(NO_CONTEXT_SENTINEL) {
        debug!("summarizer reported no relevant context");
        SummaryOutcome::NoContext
    } else {
        SummaryOutcome::Summary(summary.to_string())
    }
}

/// Pick the served context for a summarization outcome.
///
/// Deterministic in its inputs. The result is capped at `max_chars`
/// characters.
pub fn select_context(
    outcome: &SummaryOutcome,
    inputs: &ContextInputs,
    max_chars: usize,
) -> (String, ContextSource) {
    let (text, source) = match outcome {
        SummaryOutcome::Summary(s) => (s.clone(), ContextSource::Summary),
        SummaryOutcome::NoContext => (String::new(), ContextSource::NoContext),
        SummaryOutcome::Timeout | SummaryOutcome::Failed(_) => {
            if !inputs.ltm_hits.is_empty() {
                (inputs.ltm_concat(), ContextSource::LongTerm)
            } else if !inputs.history.is_empty() {
                (inputs.stm_concat(), ContextSource::ShortTerm)
            } else {
                (String::new(), ContextSource::Empty)
            }
        }
    };
    (truncate_chars(&text, max_chars), source)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use hippo_test_utils::MockProvider;

    use super::*;
    use crate::types::Chunk;

    fn entry(q: &str, tag: &str, text: &str) -> StmEntry {
        StmEntry::new(q, Chunk::new(tag, text, vec![1.0, 0.0], 2, Utc::now()).unwrap())
    }

    fn inputs() -> ContextInputs {
        ContextInputs {
            history: vec![entry("My chest hurts", "chest pain", "Pressure, tightness")],
            ltm_hits: vec![
                "### Topic: asthma\nUse inhaler.".into(),
                "### Topic: sleep\nSleep 8h.".into(),
            ],
            knowledge: vec!["Angina presents as chest pressure.".into()],
        }
    }

    #[test]
    fn prompt_has_every_section() {
        let p = build_summary_prompt("Is it serious?", &inputs());
        assert!(p.contains("Current user query: \"Is it serious?\""));
        assert!(p.contains("Recent conversation history:\nUser: My chest hurts\nBot: Topic: chest pain\nPressure, tightness"));
        assert!(p.contains("Semantically relevant historical medical information:\n### Topic: asthma"));
        assert!(p.contains("Reference medical knowledge:\nAngina presents"));
    }

    #[test]
    fn prompt_omits_empty_sections() {
        let only_ltm = ContextInputs {
            ltm_hits: vec!["### Topic: a\nb".into()],
            ..Default::default()
        };
        let p = build_summary_prompt("q", &only_ltm);
        assert!(!p.contains("Recent conversation history"));
        assert!(!p.contains("Reference medical knowledge"));
    }

    #[test]
    fn summary_wins() {
        let (ctx, src) = select_context(&SummaryOutcome::Summary("Patient has angina.".into()), &inputs(), 2000);
        assert_eq!(ctx, "Patient has angina.");
        assert_eq!(src, ContextSource::Summary);
        assert!(!src.is_fallback());
    }

    #[test]
    fn failure_falls_back_to_ltm_exactly() {
        let i = inputs();
        let (ctx, src) = select_context(&SummaryOutcome::Failed("boom".into()), &i, 2000);
        assert_eq!(ctx, "### Topic: asthma\nUse inhaler.\n\n### Topic: sleep\nSleep 8h.");
        assert_eq!(src, ContextSource::LongTerm);
        // Same inputs, same answer.
        assert_eq!(select_context(&SummaryOutcome::Timeout, &i, 2000).0, ctx);
    }

    #[test]
    fn no_ltm_falls_back_to_stm() {
        let i = ContextInputs {
            ltm_hits: vec![],
            ..inputs()
        };
        let (ctx, src) = select_context(&SummaryOutcome::Timeout, &i, 2000);
        assert_eq!(ctx, "Topic: chest pain\nPressure, tightness");
        assert_eq!(src, ContextSource::ShortTerm);
    }

    #[test]
    fn knowledge_alone_is_not_a_fallback_tier() {
        let i = ContextInputs {
            knowledge: vec!["kb".into()],
            ..Default::default()
        };
        let (ctx, src) = select_context(&SummaryOutcome::Failed("x".into()), &i, 2000);
        assert!(ctx.is_empty());
        assert_eq!(src, ContextSource::Empty);
    }

    #[test]
    fn sentinel_means_empty() {
        let (ctx, src) = select_context(&SummaryOutcome::NoContext, &inputs(), 2000);
        assert!(ctx.is_empty());
        assert_eq!(src, ContextSource::NoContext);
    }

    #[test]
    fn result_is_capped() {
        let (ctx, _) = select_context(&SummaryOutcome::Summary("é".repeat(50)), &inputs(), 10);
        assert_eq!(ctx.chars().count(), 10);
    }

    #[test]
    fn classify_replies() {
        assert_eq!(classify_reply("  "), SummaryOutcome::Failed("empty summary".into()));
        assert_eq!(classify_reply("No relevant context found."), SummaryOutcome::NoContext);
        assert_eq!(classify_reply(" ok "), SummaryOutcome::Summary("ok".into()));
    }

    #[tokio::test]
    async fn summarize_reports_provider_outcomes() {
        let ok = MockProvider::with_responses(vec!["Summary paragraph.".into()]);
        let out = summarize(&ok, "m", 128, "q", &inputs(), Duration::from_secs(5)).await;
        assert_eq!(out, SummaryOutcome::Summary("Summary paragraph.".into()));

        let failing = MockProvider::failing();
        let out = summarize(&failing, "m", 128, "q", &inputs(), Duration::from_secs(5)).await;
        assert!(matches!(out, SummaryOutcome::Failed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn summarize_times_out() {
        let hanging = MockProvider::hanging();
        let out = summarize(&hanging, "m", 128, "q", &inputs(), Duration::from_secs(20)).await;
        assert_eq!(out, SummaryOutcome::Timeout);
    }
}
