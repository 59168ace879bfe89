//! Deterministic text correction applied to every finalized utterance.
//!
//! Dictionary substitutions run longest-original-first so a short entry can
//! never partially shadow a longer entry that shares a prefix, then an
//! optional profanity pass masks a fixed vocabulary. Pure: no side effects,
//! the input dictionary is never mutated.

use crate::caption::DictionaryEntry;
use regex::{NoExpand, Regex};

/// Words replaced by the profanity pass when masking is enabled.
const FLAGGED_WORDS: &[&str] = &["damn", "hell", "crap", "shit", "fuck"];

/// Token substituted for every flagged word.
const MASK: &str = "***";

/// Result of one correction pass.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrectionOutcome {
    /// The corrected text.
    pub text: String,

    /// Human-readable "original → replacement" note for the last dictionary
    /// entry that matched. At most one note is produced per call; the
    /// profanity pass never produces one.
    pub change: Option<String>,
}

impl CorrectionOutcome {
    /// Whether any dictionary entry altered the text.
    pub fn corrected(&self) -> bool {
        self.change.is_some()
    }
}

/// Apply dictionary substitutions and (optionally) profanity masking.
///
/// Entries are processed by descending length of the original phrase; each is
/// a case-insensitive whole-word substitution. Ties keep the caller's order.
pub fn apply(
    text: &str,
    dictionary: &[DictionaryEntry],
    profanity_filter: bool,
) -> CorrectionOutcome {
    let mut processed = text.to_string();
    let mut change = None;

    let mut ordered: Vec<&DictionaryEntry> = dictionary.iter().collect();
    ordered.sort_by(|a, b| b.original.len().cmp(&a.original.len()));

    for entry in ordered {
        if entry.original.is_empty() {
            continue;
        }
        let Some(pattern) = whole_word_pattern(&entry.original) else {
            continue;
        };
        if pattern.is_match(&processed) {
            processed = pattern
                .replace_all(&processed, NoExpand(&entry.replacement))
                .into_owned();
            change = Some(format!("{} → {}", entry.original, entry.replacement));
        }
    }

    if profanity_filter {
        processed = mask_profanity(&processed);
    }

    CorrectionOutcome {
        text: processed,
        change,
    }
}

/// Mask the fixed flagged vocabulary, whole-word and case-insensitive.
/// Idempotent: the mask token contains no word characters, so masking
/// already-masked text changes nothing.
pub fn mask_profanity(text: &str) -> String {
    let alternation = FLAGGED_WORDS.join("|");
    match Regex::new(&format!(r"(?i)\b({})\b", alternation)) {
        Ok(pattern) => pattern.replace_all(text, MASK).into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Case-insensitive whole-word matcher for a literal phrase.
fn whole_word_pattern(phrase: &str) -> Option<Regex> {
    Regex::new(&format!(r"(?i)\b{}\b", regex::escape(phrase))).ok()
}
