use std::fmt::Write as _;
use std::sync::Arc;

use backdrop_core::config::GeneratorConfig;
use backdrop_core::{ArtifactInfo, ArtifactSlot};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::schedule::{decide, next_due_at};
use crate::state::StateStore;
use crate::types::{GenerationDecision, GenerationState};

/// Read-only snapshot for `backdrop status` and the front end.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub artifact: Option<ArtifactInfo>,
    pub last_generation: Option<DateTime<Utc>>,
    pub hours_since_last: Option<f64>,
    /// Set when the state record exists but could not be read.
    pub state_error: Option<String>,
    pub decision: GenerationDecision,
    pub next_due_at: Option<DateTime<Utc>>,
    pub interval_hours: u32,
}

impl StatusReport {
    pub fn artifact_exists(&self) -> bool {
        self.artifact.is_some()
    }

    /// Multi-line human-readable rendering.
    pub fn render(&self, generator: &GeneratorConfig) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Prompt:        {}", generator.prompt);
        let _ = writeln!(out, "Model:         {}", generator.model);
        let _ = writeln!(out, "Aspect ratio:  {}", generator.aspect_ratio);
        let _ = writeln!(out, "Interval:      {} hours", self.interval_hours);

        match &self.artifact {
            Some(a) => {
                let _ = writeln!(out, "Image:         {}", a.path.display());
                let _ = writeln!(out, "Size:          {:.1} KB", a.size_bytes as f64 / 1024.0);
                let _ = writeln!(out, "Modified:      {}", a.modified.to_rfc3339());
            }
            None => {
                let _ = writeln!(out, "Image:         none");
            }
        }

        if let Some(err) = &self.state_error {
            let _ = writeln!(out, "State:         unreadable ({err})");
        }
        match (self.last_generation, self.hours_since_last) {
            (Some(last), Some(since)) => {
                let _ = writeln!(out, "Last run:      {}", last.to_rfc3339());
                let _ = writeln!(out, "Since last:    {since:.1} hours");
            }
            _ => {
                let _ = writeln!(out, "Last run:      no generation timestamp found");
            }
        }

        if self.decision.due {
            let _ = writeln!(out, "Next:          ready now ({})", self.decision.reason);
        } else {
            let remaining = self.decision.hours_remaining.unwrap_or_default();
            let _ = write!(out, "Next:          in {remaining:.1} hours");
            if let Some(at) = self.next_due_at {
                let _ = write!(out, " (at {})", at.to_rfc3339());
            }
            out.push('\n');
        }
        out
    }
}

/// Composes StateStore + ArtifactProbe + Scheduler. Never writes anything.
pub struct StatusReporter {
    store: Arc<dyn StateStore>,
    slot: ArtifactSlot,
    interval_hours: u32,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn StateStore>, slot: ArtifactSlot, interval_hours: u32) -> Self {
        Self {
            store,
            slot,
            interval_hours,
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> StatusReport {
        let (state, state_error) = match self.store.load() {
            Ok(s) => (s, None),
            Err(e) => (GenerationState::default(), Some(e.to_string())),
        };
        let artifact = self.slot.info();
        let decision = decide(&state, artifact.is_some(), now, self.interval_hours);

        StatusReport {
            artifact,
            last_generation: state.last_generation,
            hours_since_last: decision.hours_since_last,
            state_error,
            decision,
            next_due_at: next_due_at(&state, self.interval_hours),
            interval_hours: self.interval_hours,
        }
    }
}
