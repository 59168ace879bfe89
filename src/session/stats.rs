use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// How many recent correction descriptions are retained.
pub const RECENT_CORRECTIONS_CAPACITY: usize = 10;

/// Running average threshold below which the session is classified degraded.
const DEGRADED_CONFIDENCE_THRESHOLD: f64 = 0.7;

/// Words-per-minute multiplier modeling a nominal 5-second utterance window.
const WPM_WINDOW_MULTIPLIER: usize = 12;

/// Coarse session health classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SystemHealth {
    Healthy,
    Degraded,
    Offline,
}

/// One confidence measurement, tagged with elapsed session time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfidenceSample {
    pub time_secs: f64,
    pub score: f64,
}

/// One words-per-minute measurement, tagged with elapsed session time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WpmSample {
    pub time_secs: f64,
    pub wpm: u32,
}

/// Cumulative statistics for one captioning session.
///
/// Mutated only through `record_caption` and the health/latency setters; one
/// instance per active session, replaced (never merged) when a session ends.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// When the session started.
    pub started_at: DateTime<Utc>,

    /// Total session duration in seconds.
    pub duration_secs: f64,

    /// Total words across all finalized captions.
    pub total_words: usize,

    /// Number of finalized captions recorded.
    pub captions_recorded: usize,

    /// Running average confidence across finalized captions.
    pub average_confidence: f64,

    /// Time series of running-average samples.
    pub confidence_history: Vec<ConfidenceSample>,

    /// Number of captions the correction engine altered.
    pub corrections_made: usize,

    /// Time series of per-caption words-per-minute samples.
    pub wpm_history: Vec<WpmSample>,

    /// Most recent correction descriptions, newest first, capacity 10.
    pub recent_corrections: VecDeque<String>,

    pub system_health: SystemHealth,

    /// Current end-to-end latency estimate in milliseconds.
    pub latency_ms: u32,
}

impl SessionStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            duration_secs: 0.0,
            total_words: 0,
            captions_recorded: 0,
            average_confidence: 0.0,
            confidence_history: Vec::new(),
            corrections_made: 0,
            wpm_history: Vec::new(),
            recent_corrections: VecDeque::with_capacity(RECENT_CORRECTIONS_CAPACITY),
            system_health: SystemHealth::Healthy,
            latency_ms: 0,
        }
    }

    /// Fold one finalized caption into the running metrics.
    ///
    /// The running average stays the exact arithmetic mean of all confidences
    /// seen so far; health flips to degraded when it drops below 0.7.
    pub fn record_caption(
        &mut self,
        word_count: usize,
        confidence: f64,
        correction: Option<&str>,
        elapsed_secs: f64,
    ) {
        let prior = self.captions_recorded as f64;
        self.average_confidence = (self.average_confidence * prior + confidence) / (prior + 1.0);
        self.captions_recorded += 1;
        self.total_words += word_count;
        self.duration_secs = elapsed_secs;

        self.confidence_history.push(ConfidenceSample {
            time_secs: elapsed_secs,
            score: self.average_confidence,
        });
        self.wpm_history.push(WpmSample {
            time_secs: elapsed_secs,
            wpm: (word_count * WPM_WINDOW_MULTIPLIER) as u32,
        });

        if let Some(description) = correction {
            self.corrections_made += 1;
            self.recent_corrections.push_front(description.to_string());
            self.recent_corrections.truncate(RECENT_CORRECTIONS_CAPACITY);
        }

        // Offline is set by the controller on fatal loss and is not
        // reclassified by confidence.
        if self.system_health != SystemHealth::Offline {
            self.system_health = if self.average_confidence < DEGRADED_CONFIDENCE_THRESHOLD {
                SystemHealth::Degraded
            } else {
                SystemHealth::Healthy
            };
        }
    }

    pub fn mark_offline(&mut self) {
        self.system_health = SystemHealth::Offline;
    }

    pub fn set_latency(&mut self, latency_ms: u32) {
        self.latency_ms = latency_ms;
    }

    pub fn set_duration(&mut self, elapsed_secs: f64) {
        self.duration_secs = elapsed_secs;
    }
}
