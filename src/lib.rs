// Library exports for the binary and integration tests.

/// Crate version, reported by the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[macro_use]
pub mod debug;

pub mod cli;
pub mod document;
pub mod hasher;
pub mod http;
pub mod pipeline;
pub mod placeholder;
pub mod remote;
pub mod store;
pub mod strategy;
pub mod subset;
pub mod toolchain;

pub use hasher::CacheKey;
pub use pipeline::{PipelineError, RenderingPipeline};
pub use store::{ArtifactStore, ArtifactVariant, RenderedArtifact};
pub use strategy::{RenderError, RenderStrategy};
