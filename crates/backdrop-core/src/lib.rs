//! `backdrop-core`: configuration, error taxonomy and the artifact slot
//! shared by the scheduler, the generator and the gateway binary.

pub mod artifact;
pub mod config;
pub mod error;
pub mod fsutil;

pub use artifact::{ArtifactInfo, ArtifactSlot};
pub use config::BackdropConfig;
pub use error::{BackdropError, Result};
