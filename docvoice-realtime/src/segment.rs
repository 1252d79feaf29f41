//! Sentence segmentation for incremental speech synthesis.

use docvoice_core::clean_text_for_speech;
use regex::Regex;
use std::sync::LazyLock;

static SENTENCE_END: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.!?\n]+\s").expect("valid regex"));

/// Titles and short forms whose trailing period does not end a sentence.
const ABBREVIATIONS: &[&str] =
    &["dr", "mr", "mrs", "ms", "prof", "st", "sr", "jr", "vs", "etc", "approx"];

enum Boundary {
    Split,
    Skip,
    /// Undecided until more text arrives.
    Wait,
}

fn is_initial(word: &str) -> bool {
    let mut chars = word.chars();
    chars.next().is_some_and(char::is_uppercase) && chars.next().is_none()
}

fn is_capitalized(word: &str) -> bool {
    word.chars().next().is_some_and(char::is_uppercase)
}

/// Decide whether the terminator between `before` and `after` ends a sentence.
///
/// A lone capital letter before a period reads as an initial only inside a
/// name: next to another initial, or followed by two capitalized words.
fn classify(before: &str, punctuation: &str, after: &str) -> Boundary {
    if punctuation.trim_end() != "." {
        return Boundary::Split;
    }
    let word = before.rsplit(|c: char| !c.is_alphabetic()).next().unwrap_or_default();
    if word.is_empty() {
        return Boundary::Split;
    }
    if ABBREVIATIONS.contains(&word.to_lowercase().as_str()) {
        return Boundary::Skip;
    }
    if !is_initial(word) {
        return Boundary::Split;
    }
    let previous = before.split_whitespace().rev().nth(1);
    if previous.and_then(|w| w.strip_suffix('.')).is_some_and(is_initial) {
        return Boundary::Skip;
    }

    let words: Vec<&str> = after.split_whitespace().collect();
    let complete = if after.ends_with(char::is_whitespace) {
        words.len()
    } else {
        words.len().saturating_sub(1)
    };
    if complete == 0 {
        return Boundary::Wait;
    }
    let next = words[0];
    if next.strip_suffix('.').is_some_and(is_initial) {
        return Boundary::Skip;
    }
    if !is_capitalized(next) {
        return Boundary::Split;
    }
    match words.get(1) {
        None => Boundary::Wait,
        Some(following) if is_capitalized(following) => Boundary::Skip,
        Some(_) => Boundary::Split,
    }
}

/// Splits a token stream into sentences as soon as each one is complete.
///
/// A sentence ends at a run of `.`, `!`, `?` or newlines followed by
/// whitespace. Periods after titles such as "Dr." and after the initials of
/// a name do not end a sentence.
#[derive(Debug, Default, Clone)]
pub struct SentenceSegmenter {
    buffer: String,
}

impl SentenceSegmenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a token; returns the sentences it completed, trimmed, in order.
    pub fn push(&mut self, token: &str) -> Vec<String> {
        self.buffer.push_str(token);
        let mut sentences = Vec::new();
        let mut consumed = 0;
        for found in SENTENCE_END.find_iter(&self.buffer) {
            let before = &self.buffer[consumed..found.start()];
            match classify(before, found.as_str(), &self.buffer[found.end()..]) {
                Boundary::Split => {}
                Boundary::Skip => continue,
                Boundary::Wait => break,
            }
            let sentence = self.buffer[consumed..found.end()].trim();
            if !sentence.is_empty() {
                sentences.push(sentence.to_string());
            }
            consumed = found.end();
        }
        self.buffer.drain(..consumed);
        sentences
    }

    /// Whatever is left once the stream has ended.
    pub fn finish(&mut self) -> Option<String> {
        let rest = std::mem::take(&mut self.buffer);
        let rest = rest.trim();
        (!rest.is_empty()).then(|| rest.to_string())
    }

    pub fn pending(&self) -> &str {
        &self.buffer
    }
}

/// Text worth a synthesis call: the cleaned sentence if it is strictly
/// longer than `min_chars` characters.
pub fn speakable(sentence: &str, min_chars: usize) -> Option<String> {
    let cleaned = clean_text_for_speech(sentence);
    (cleaned.chars().count() > min_chars).then_some(cleaned)
}
