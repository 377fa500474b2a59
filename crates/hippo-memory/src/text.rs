// SPDX-FileCopyrightText: 2026 Hippo Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Sentence-level text helpers: merging related chunks, topic enrichment,
//! and character-safe truncation.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

static SENTENCE_BREAK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[.!?]\s+").unwrap());
static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").unwrap());

/// Token Jaccard above which two sentences count as the same statement.
const SENTENCE_OVERLAP: f32 = 0.8;

/// Topics shorter than this (in words or chars) get enriched from the text.
const MIN_TOPIC_WORDS: usize = 5;
const MIN_TOPIC_CHARS: usize = 20;
const MAX_TOPIC_WORDS: usize = 16;

/// Split on whitespace following `.`, `!` or `?`, keeping the punctuation.
pub fn split_sentences(text: &str) -> Vec<&str> {
    let text = text.trim();
    let mut out = Vec::new();
    let mut start = 0;
    for m in SENTENCE_BREAK.find_iter(text) {
        let end = m.start() + 1;
        push_trimmed(&mut out, &text[start..end]);
        start = m.end();
    }
    push_trimmed(&mut out, &text[start..]);
    out
}

fn push_trimmed<'a>(out: &mut Vec<&'a str>, s: &'a str) {
    let s = s.trim();
    if !s.is_empty() {
        out.push(s);
    }
}

fn tokens(s: &str) -> HashSet<String> {
    WORD.find_iter(s).map(|m| m.as_str().to_lowercase()).collect()
}

/// Jaccard overlap of the word sets of two sentences.
pub fn overlap_ratio(a: &str, b: &str) -> f32 {
    jaccard(&tokens(a), &tokens(b))
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count();
    let union = a.union(b).count();
    inter as f32 / union as f32
}

/// Newer sentences first, then older sentences not already stated.
///
/// An older sentence is dropped when it matches a kept sentence
/// case-insensitively, overlaps one by more than 0.8 Jaccard, or uses only
/// words a kept sentence already has. When nothing older survives, the newer
/// text is returned as-is. Otherwise every sentence ends in terminal
/// punctuation so the result splits back into the same sentences, which
/// makes `merge_texts(new, &merge_texts(new, old))` a fixed point.
pub fn merge_texts(new_text: &str, old_text: &str) -> String {
    let mut merged: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for sentence in split_sentences(new_text) {
        let sentence = terminated(sentence);
        if seen.insert(sentence.to_lowercase()) {
            merged.push(sentence);
        }
    }
    let fresh = merged.len();

    for sentence in split_sentences(old_text) {
        let sentence = terminated(sentence);
        let lower = sentence.to_lowercase();
        if seen.contains(&lower) || is_covered(&lower, &merged) {
            continue;
        }
        seen.insert(lower);
        merged.push(sentence);
    }

    if merged.len() == fresh {
        return new_text.trim().to_string();
    }
    merged.join(" ")
}

/// Whether `sentence` says nothing the kept sentences do not.
fn is_covered(sentence: &str, kept: &[String]) -> bool {
    let words = tokens(sentence);
    if words.is_empty() {
        return true;
    }
    kept.iter().any(|k| {
        let kept_words = tokens(k);
        words.is_subset(&kept_words) || jaccard(&words, &kept_words) > SENTENCE_OVERLAP
    })
}

/// End a sentence in `.`, `!` or `?` so joining never glues two together.
fn terminated(sentence: &str) -> String {
    if sentence.ends_with(['.', '!', '?']) {
        return sentence.to_string();
    }
    let body = sentence.trim_end_matches([',', ';', ':']).trim_end();
    if body.is_empty() {
        sentence.to_string()
    } else {
        format!("{body}.")
    }
}

/// Replace a terse topic with the (capped) first sentence of the text.
pub fn enrich_topic(topic: &str, text: &str) -> String {
    let topic = topic.trim();
    if topic.split_whitespace().count() >= MIN_TOPIC_WORDS
        && topic.chars().count() >= MIN_TOPIC_CHARS
    {
        return topic.to_string();
    }

    let Some(first) = split_sentences(text).into_iter().next() else {
        return topic.to_string();
    };
    let words: Vec<&str> = first.split_whitespace().collect();
    let enriched = if words.len() > MAX_TOPIC_WORDS {
        words[..MAX_TOPIC_WORDS].join(" ")
    } else {
        words.join(" ")
    };
    let enriched = enriched.trim_end_matches(':').trim();
    if enriched.is_empty() {
        topic.to_string()
    } else {
        enriched.to_string()
    }
}

/// The more descriptive of two topic labels.
pub fn longer_topic<'a>(existing: &'a str, incoming: &'a str) -> &'a str {
    if existing.chars().count() > incoming.chars().count() {
        existing
    } else {
        incoming
    }
}

/// Cut to at most `max_chars` characters, never splitting a code point.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
