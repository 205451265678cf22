use std::sync::Arc;

use backdrop_core::config::BackdropConfig;
use backdrop_core::{ArtifactSlot, BackdropError};
use backdrop_imagegen::{GeneratedArtifact, Generator, ImageRequest};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

use crate::schedule::decide;
use crate::state::StateStore;
use crate::types::{GenerationDecision, GenerationState};

/// How one cycle ended.
#[derive(Debug)]
pub enum CycleOutcome {
    /// Not due; nothing was touched.
    Skipped { decision: GenerationDecision },
    /// New image installed and the state record advanced.
    Generated {
        decision: GenerationDecision,
        artifact: GeneratedArtifact,
        recorded_at: DateTime<Utc>,
    },
    /// The state record could not be read, or generation (or recording
    /// it) failed. `decision` is `None` when the cycle aborted before
    /// deciding.
    Failed {
        decision: Option<GenerationDecision>,
        error: BackdropError,
    },
}

impl CycleOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, CycleOutcome::Failed { .. })
    }

    pub fn decision(&self) -> Option<&GenerationDecision> {
        match self {
            CycleOutcome::Skipped { decision } | CycleOutcome::Generated { decision, .. } => {
                Some(decision)
            }
            CycleOutcome::Failed { decision, .. } => decision.as_ref(),
        }
    }
}

/// Drives one generation cycle: decide → generate → record.
///
/// Holds no clock of its own; every call gets `now` from the caller. The
/// state record is saved if and only if generation succeeded, so a failed
/// cycle leaves everything as it found it and the next one is due again.
pub struct RunController {
    store: Arc<dyn StateStore>,
    generator: Generator,
    request: ImageRequest,
    api_key: Option<String>,
    interval_hours: u32,
}

impl RunController {
    pub fn new(
        store: Arc<dyn StateStore>,
        generator: Generator,
        request: ImageRequest,
        api_key: Option<String>,
        interval_hours: u32,
    ) -> Self {
        Self {
            store,
            generator,
            request,
            api_key,
            interval_hours,
        }
    }

    pub fn from_config(
        config: &BackdropConfig,
        store: Arc<dyn StateStore>,
        generator: Generator,
    ) -> Self {
        Self::new(
            store,
            generator,
            ImageRequest::from_config(&config.generator),
            config.generator.api_key().map(str::to_string),
            config.schedule.interval_hours,
        )
    }

    fn slot(&self) -> &ArtifactSlot {
        self.generator.slot()
    }

    /// Load state. A corrupt record counts as "never generated" and is
    /// logged; any other failure to read it aborts the cycle.
    fn load_state(&self) -> Result<GenerationState, BackdropError> {
        match self.store.load() {
            Ok(state) => Ok(state),
            Err(e @ BackdropError::Parse { .. }) => {
                warn!(error = %e, code = e.code(), "state record corrupt, treating as never generated");
                Ok(GenerationState::default())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn run_cycle(&self, now: DateTime<Utc>) -> CycleOutcome {
        let state = match self.load_state() {
            Ok(state) => state,
            Err(error) => {
                error!(error = %error, code = error.code(), "state record unreadable, cycle aborted");
                return CycleOutcome::Failed {
                    decision: None,
                    error,
                };
            }
        };
        let decision = decide(&state, self.slot().exists(), now, self.interval_hours);

        if !decision.due {
            info!(
                hours_remaining = decision.hours_remaining.unwrap_or_default(),
                "image generation not needed yet"
            );
            return CycleOutcome::Skipped { decision };
        }

        info!(reason = %decision.reason, "time to generate a new image");

        let artifact = match self
            .generator
            .generate(&self.request, self.api_key.as_deref())
            .await
        {
            Ok(a) => a,
            Err(error) => {
                error!(error = %error, code = error.code(), "image generation failed");
                return CycleOutcome::Failed {
                    decision: Some(decision),
                    error,
                };
            }
        };

        let next = state.advanced_to(now);
        if let Err(error) = self.store.save(&next) {
            // The image is already in place; surface the lost timestamp.
            error!(error = %error, "image saved but generation time could not be recorded");
            return CycleOutcome::Failed {
                decision: Some(decision),
                error,
            };
        }

        let recorded_at = next.last_generation.unwrap_or(now);
        info!(%recorded_at, path = %artifact.path.display(), "generation recorded");
        CycleOutcome::Generated {
            decision,
            artifact,
            recorded_at,
        }
    }
}
