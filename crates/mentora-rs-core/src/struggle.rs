//! Heuristic struggle detection over recent conversation turns.
//!
//! A message counts as a failed attempt when it carries any one of three
//! signals: a known confusion phrase, a short question/objection, or a
//! near-repeat of the previous user message. The repeat check is a word
//! overlap proxy for "asking the same thing again".

use crate::types::{ChatMessage, Role};
use mentora_rs_config::StruggleConfig;
use std::collections::HashSet;

/// Phrases that signal the student did not follow the last explanation.
const CONFUSION_PHRASES: [&str; 12] = [
    "i don't understand",
    "i dont understand",
    "don't get it",
    "dont get it",
    "confused",
    "what do you mean",
    "i'm lost",
    "im lost",
    "makes no sense",
    "doesn't make sense",
    "still don't",
    "no idea",
];

/// Markers that turn a short message into an objection.
const NEGATION_MARKERS: [&str; 4] = ["no", "not", "but", "why"];

/// Derived struggle state for one session window.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StruggleSignal {
    /// True when failed attempts reached the configured threshold.
    pub is_struggling: bool,
    /// Number of user messages flagged as failed attempts.
    pub failed_attempts: usize,
    /// Content words drawn from the flagged messages.
    pub concepts: Vec<String>,
}

/// Analyze the trailing user messages of a session. Pure function; fewer
/// than the configured minimum of prior user messages yields no signal.
pub fn analyze_struggle(messages: &[ChatMessage], config: &StruggleConfig) -> StruggleSignal {
    let user_messages: Vec<&ChatMessage> = messages
        .iter()
        .filter(|message| message.role == Role::User)
        .collect();
    if user_messages.len() < config.min_user_messages {
        return StruggleSignal::default();
    }

    let start = user_messages.len().saturating_sub(config.window);
    let window = &user_messages[start..];

    let mut failed_attempts = 0;
    let mut concepts: Vec<String> = Vec::new();
    let mut previous_words: Option<HashSet<String>> = None;

    for message in window {
        let normalized = message.content.to_lowercase();
        let words = content_words(&normalized);

        let has_confusion_phrase = CONFUSION_PHRASES
            .iter()
            .any(|phrase| normalized.contains(phrase));
        let is_short_objection = normalized.chars().count() < config.short_message_chars
            && (normalized.contains('?')
                || normalized
                    .split_whitespace()
                    .any(|word| NEGATION_MARKERS.contains(&word)));
        let is_repeat = previous_words
            .as_ref()
            .map(|previous| jaccard(previous, &words) > config.overlap_threshold)
            .unwrap_or(false);

        if has_confusion_phrase || is_short_objection || is_repeat {
            failed_attempts += 1;
            for word in &words {
                if !concepts.contains(word) {
                    concepts.push(word.clone());
                }
            }
        }
        previous_words = Some(words);
    }

    StruggleSignal {
        is_struggling: failed_attempts >= config.failed_attempts_threshold,
        failed_attempts,
        concepts,
    }
}

/// Words longer than three characters, a cheap stopword proxy.
fn content_words(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|word| word.chars().count() > 3)
        .map(str::to_string)
        .collect()
}

/// Jaccard overlap of two word sets.
fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count() as f32;
    let union = a.union(b).count() as f32;
    intersection / union
}
