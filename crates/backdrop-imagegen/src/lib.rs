//! `backdrop-imagegen`: text-to-image providers and the [`Generator`] that
//! turns one provider response into the current background image.

pub mod generator;
pub mod openai;
pub mod provider;

pub use generator::{decode_image, GeneratedArtifact, Generator};
pub use openai::OpenAiImagesProvider;
pub use provider::{EncodedImage, ImageProvider, ImageRequest, ProviderError};
