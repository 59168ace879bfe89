use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A finalized transcript unit.
///
/// Immutable once created, with two sanctioned exceptions: a manual user edit
/// may replace `text` and set `corrected`, and `translated_text` may be
/// attached asynchronously after creation. `is_final`, once true, never
/// reverts. Interim (non-final) text is never stored as a `Caption`; it lives
/// only as transient state on the session controller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Caption {
    /// Unique identifier; generation order is meaningful (session-scoped
    /// monotonic sequence).
    pub id: String,

    /// Corrected caption text.
    pub text: String,

    /// Translation attached after creation, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translated_text: Option<String>,

    /// When the caption was finalized.
    pub timestamp: DateTime<Utc>,

    /// Recognition confidence in [0, 1].
    pub confidence: f32,

    /// Always true for stored captions.
    pub is_final: bool,

    /// Speaker label, when the backend provides one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,

    /// True if the correction engine (or a manual edit) altered the text.
    pub corrected: bool,
}

impl Caption {
    pub fn new(sequence: u64, text: String, confidence: f32, corrected: bool) -> Self {
        Self {
            id: format!("cap-{:06}", sequence),
            text,
            translated_text: None,
            timestamp: Utc::now(),
            confidence,
            is_final: true,
            speaker: None,
            corrected,
        }
    }
}

/// Classification of a dictionary entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    ProperNoun,
    Place,
    Acronym,
    Correction,
}

/// One phrase substitution owned by the surrounding application.
///
/// The set is unordered; the correction engine derives its own processing
/// order (longest original phrase first) and never mutates the entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DictionaryEntry {
    pub original: String,
    pub replacement: String,
    pub kind: EntryKind,

    /// Optional sensitivity weight in [0, 1].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitivity: Option<f32>,
}

impl DictionaryEntry {
    pub fn new(original: impl Into<String>, replacement: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            original: original.into(),
            replacement: replacement.into(),
            kind,
            sensitivity: None,
        }
    }
}
