// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `hippo shell` command implementation.
//!
//! Interactive REPL backed by the memory manager. Every question is answered
//! with the retrieved context in the prompt, and every answer is ingested
//! back into the user's memory.

use std::sync::Arc;
use std::time::Duration;

use colored::Colorize;
use hippo_config::HippoConfig;
use hippo_core::types::{ProviderMessage, ProviderRequest};
use hippo_core::{HippoError, ProviderAdapter};
use hippo_memory::{IngestReport, MemoryManager};
use metrics_exporter_prometheus::PrometheusHandle;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::memory::initialize_memory;
use crate::provider::OpenAiProvider;
use crate::telemetry::hippo_samples;

const ANSWER_MAX_TOKENS: u32 = 1024;

const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

const SYSTEM_PROMPT: &str = "You are a careful medical assistant. Answer the patient's question \
clearly and concisely. Use the conversation context when it is relevant.";

/// A REPL line, parsed.
#[derive(Debug, PartialEq, Eq)]
enum ShellInput<'a> {
    Quit,
    History,
    Reset,
    Metrics,
    Empty,
    Question(&'a str),
}

fn parse_input(line: &str) -> ShellInput<'_> {
    match line.trim() {
        "" => ShellInput::Empty,
        "/quit" | "/exit" => ShellInput::Quit,
        "/history" => ShellInput::History,
        "/reset" => ShellInput::Reset,
        "/metrics" => ShellInput::Metrics,
        question => ShellInput::Question(question),
    }
}

/// Outcome of one answered question.
#[derive(Debug)]
struct Turn {
    context: String,
    answer: String,
    report: IngestReport,
}

/// Runs the `hippo shell` interactive REPL.
pub async fn run_shell(
    config: HippoConfig,
    user: Option<String>,
    metrics: Option<PrometheusHandle>,
) -> Result<(), HippoError> {
    let provider = Arc::new(OpenAiProvider::new(&config.provider)?);
    let manager = initialize_memory(&config, provider.clone()).await?;

    let user_id = user.unwrap_or_else(|| format!("cli-{}", uuid::Uuid::new_v4()));
    info!(user_id = %user_id, model = provider.default_model(), "shell session started");

    let cancel = CancellationToken::new();
    let sweeper = manager.spawn_idle_sweeper(SWEEP_INTERVAL, cancel.clone());

    let mut rl = DefaultEditor::new()
        .map_err(|e| HippoError::Internal(format!("failed to initialize readline: {e}")))?;

    println!("{}", "hippo shell".bold().green());
    println!(
        "Memory for {}. Type {} to see remembered topics, {} to forget, {} for counters, {} to exit.\n",
        user_id.cyan(),
        "/history".yellow(),
        "/reset".yellow(),
        "/metrics".yellow(),
        "/quit".yellow()
    );

    let prompt = format!("{}> ", "hippo".green());
    loop {
        let line = match rl.readline(&prompt) {
            Ok(line) => line,
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {e}", "error".red());
                break;
            }
        };

        match parse_input(&line) {
            ShellInput::Empty => continue,
            ShellInput::Quit => break,
            ShellInput::History => {
                print_history(&manager, &user_id).await;
            }
            ShellInput::Reset => {
                if manager.reset(&user_id) {
                    println!("{}", "memory cleared".dimmed());
                } else {
                    println!("{}", "nothing to clear".dimmed());
                }
            }
            ShellInput::Metrics => print_metrics(metrics.as_ref()),
            ShellInput::Question(question) => {
                let _ = rl.add_history_entry(question);
                match answer_turn(&manager, provider.as_ref(), &user_id, question).await {
                    Ok(turn) => print_turn(&turn),
                    Err(e) => eprintln!("{}: {e}", "error".red()),
                }
            }
        }
    }

    cancel.cancel();
    let _ = sweeper.await;
    println!("{}", "goodbye".dimmed());
    Ok(())
}

/// Retrieve context, answer with it, then ingest the answer.
async fn answer_turn(
    manager: &MemoryManager,
    provider: &dyn ProviderAdapter,
    user_id: &str,
    question: &str,
) -> Result<Turn, HippoError> {
    let context = manager.retrieve_context(user_id, question).await;

    let request = ProviderRequest {
        model: String::new(),
        system_prompt: Some(SYSTEM_PROMPT.to_string()),
        messages: vec![ProviderMessage::user(build_question(&context, question))],
        max_tokens: ANSWER_MAX_TOKENS,
        temperature: Some(0.3),
    };
    let answer = provider.complete(request).await?.content;

    let report = manager.ingest(user_id, &answer, question).await?;
    debug!(
        user_id = %user_id,
        chunks = report.chunks,
        skipped = report.skipped,
        ltm_inserted = report.ltm_inserted,
        ltm_merged = report.ltm_merged,
        "answer ingested"
    );

    Ok(Turn {
        context,
        answer,
        report,
    })
}

fn build_question(context: &str, question: &str) -> String {
    if context.is_empty() {
        question.to_string()
    } else {
        format!("Context from earlier in this conversation:\n{context}\n\nQuestion: {question}")
    }
}

fn print_turn(turn: &Turn) {
    if !turn.context.is_empty() {
        println!("{}", format!("[context] {}", turn.context).dimmed());
    }
    println!("{}\n", turn.answer);
    if turn.report.skipped > 0 {
        eprintln!(
            "{}",
            format!("({} chunk(s) could not be remembered)", turn.report.skipped).yellow()
        );
    }
}

fn print_metrics(metrics: Option<&PrometheusHandle>) {
    let Some(handle) = metrics else {
        println!("{}", "metrics are disabled".dimmed());
        return;
    };
    let rendered = handle.render();
    let samples = hippo_samples(&rendered);
    if samples.is_empty() {
        println!("{}", "no metrics recorded yet".dimmed());
    }
    for line in samples {
        println!("{line}");
    }
}

async fn print_history(manager: &MemoryManager, user_id: &str) {
    let history = manager
        .get_recent_history(user_id, manager.config().stm_capacity)
        .await;
    if history.is_empty() {
        println!("{}", "no recent topics".dimmed());
        return;
    }
    for entry in &history {
        println!("{} {}", "Q:".bold(), entry.question_context.dimmed());
        println!("{}\n", entry.render());
    }
}

#[cfg(test)]
mod tests {
    use hippo_test_utils::{MockEmbedder, MockProvider};

    use super::*;
    use crate::memory::build_manager;

    fn manager_with(provider: Arc<MockProvider>) -> MemoryManager {
        let config = HippoConfig::default();
        let embedder = Arc::new(MockEmbedder::new(config.memory.embedding_dim));
        build_manager(&config, embedder, provider)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(parse_input("  /quit "), ShellInput::Quit);
        assert_eq!(parse_input("/exit"), ShellInput::Quit);
        assert_eq!(parse_input("/history"), ShellInput::History);
        assert_eq!(parse_input("/reset"), ShellInput::Reset);
        assert_eq!(parse_input("/metrics "), ShellInput::Metrics);
        assert_eq!(parse_input("   "), ShellInput::Empty);
        assert_eq!(
            parse_input(" I have a headache "),
            ShellInput::Question("I have a headache")
        );
    }

    #[test]
    fn question_carries_context_only_when_present() {
        assert_eq!(build_question("", "Why?"), "Why?");
        let q = build_question("Patient has migraines.", "Why?");
        assert!(q.starts_with("Context from earlier in this conversation:\nPatient has migraines."));
        assert!(q.ends_with("Question: Why?"));
    }

    #[tokio::test]
    async fn second_turn_is_answered_with_summary() {
        let provider = Arc::new(MockProvider::with_responses(vec![
            // turn 1: answer, then chunking
            "Rest in a dark, quiet room.".into(),
            "Topic: Migraine relief\nRest in a dark, quiet room.".into(),
            // turn 2: summary, answer, chunking
            "Patient gets migraines and was told to rest in the dark.".into(),
            "Try a cold compress as well.".into(),
            "Topic: Migraine relief\nTry a cold compress.".into(),
        ]));
        let manager = manager_with(provider.clone());

        let first = answer_turn(&manager, provider.as_ref(), "u1", "What helps a migraine?")
            .await
            .unwrap();
        assert!(first.context.is_empty());
        assert_eq!(first.answer, "Rest in a dark, quiet room.");
        assert_eq!(first.report.chunks, 1);

        let second = answer_turn(&manager, provider.as_ref(), "u1", "Anything else for a migraine?")
            .await
            .unwrap();
        assert_eq!(
            second.context,
            "Patient gets migraines and was told to rest in the dark."
        );
        assert_eq!(second.answer, "Try a cold compress as well.");

        let requests = provider.requests().await;
        assert_eq!(requests.len(), 5);
        let answer_prompt = &requests[3].messages[0].content;
        assert!(answer_prompt.contains("Patient gets migraines"));
        assert!(answer_prompt.ends_with("Question: Anything else for a migraine?"));
        assert_eq!(requests[3].system_prompt.as_deref(), Some(SYSTEM_PROMPT));
    }

    #[tokio::test]
    async fn failed_answer_ingests_nothing() {
        let provider = Arc::new(MockProvider::failing());
        let manager = manager_with(provider.clone());

        let result = answer_turn(&manager, provider.as_ref(), "u1", "Is this serious?").await;
        assert!(matches!(result, Err(HippoError::Provider { .. })));
        assert!(manager.get_recent_history("u1", 5).await.is_empty());
    }
}
