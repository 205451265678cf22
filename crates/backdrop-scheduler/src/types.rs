use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The one persisted fact: when the last successful generation happened.
///
/// `Default` is the "never generated" state, used when the record is absent
/// or unreadable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationState {
    pub last_generation: Option<DateTime<Utc>>,
}

impl GenerationState {
    pub fn generated_at(at: DateTime<Utc>) -> Self {
        Self {
            last_generation: Some(at),
        }
    }

    /// State after a successful generation at `now`. Never moves backwards,
    /// even if the stored instant is ahead of the local clock.
    pub fn advanced_to(self, now: DateTime<Utc>) -> Self {
        let next = match self.last_generation {
            Some(prev) if prev > now => prev,
            _ => now,
        };
        Self::generated_at(next)
    }
}

/// Why the scheduler decided the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No image in the slot.
    NoArtifact,
    /// An image exists but there is no record of generating it.
    NoState,
    /// At least `interval_hours` have passed.
    IntervalElapsed,
    /// Still inside the interval (or the record is ahead of the clock).
    IntervalNotElapsed,
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DecisionReason::NoArtifact => "no background image found",
            DecisionReason::NoState => "no generation timestamp found",
            DecisionReason::IntervalElapsed => "generation interval elapsed",
            DecisionReason::IntervalNotElapsed => "generation interval not yet elapsed",
        };
        write!(f, "{s}")
    }
}

/// Output of [`crate::schedule::decide`]. Derived, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GenerationDecision {
    pub due: bool,
    pub reason: DecisionReason,
    /// Set only when not due; clamped to be non-negative.
    pub hours_remaining: Option<f64>,
    /// Raw elapsed time since the last generation, when known. May be
    /// negative if the record is ahead of the clock.
    pub hours_since_last: Option<f64>,
}
