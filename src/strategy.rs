//! The rendering strategy seam.
//!
//! Every tier of the fallback chain implements [`RenderStrategy`]: it either
//! returns SVG bytes or a [`RenderError`] describing why it could not. The
//! pipeline folds over an ordered list of strategies and stops at the first
//! success.

use std::future::Future;
use std::pin::Pin;

use thiserror::Error;

use crate::hasher::CacheKey;
use crate::store::ArtifactVariant;
use crate::subset;

/// Why a single strategy did not produce an image.
///
/// None of these reach the pipeline's caller; they are logged and the next
/// strategy is tried.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RenderError {
    /// Network, protocol, or payload failure talking to the compile service.
    #[error("remote render failed: {0}")]
    RemoteRenderFailed(String),

    /// A required executable could not be found.
    #[error("toolchain unavailable: missing {}", .missing.join(", "))]
    ToolchainUnavailable {
        /// Names of the executables that were not found.
        missing: Vec<String>,
    },

    /// A toolchain subprocess exited unsuccessfully.
    #[error("{tool} failed with {status}: {stderr}")]
    ToolchainExecutionFailed {
        tool: String,
        status: String,
        /// Captured standard error (or the tail of the log when stderr is empty).
        stderr: String,
    },

    /// A toolchain subprocess exceeded its time budget and was killed.
    #[error("{tool} timed out")]
    ToolchainTimedOut { tool: String },

    /// Temp-file I/O failed around a toolchain run.
    #[error("toolchain I/O error: {0}")]
    ToolchainIo(String),

    /// The subset parser found nothing it could draw.
    #[error("snippet contains no drawable geometry in the supported subset")]
    SubsetEmpty,
}

pub type RenderFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<u8>, RenderError>> + Send + 'a>>;

/// One tier of the fallback chain.
pub trait RenderStrategy: Send + Sync {
    /// Variant under which this strategy's output is stored.
    fn variant(&self) -> ArtifactVariant;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Render normalized `source`. `key` is its cache key, available for
    /// naming scratch files.
    fn render<'a>(&'a self, source: &'a str, key: &'a CacheKey) -> RenderFuture<'a>;
}

/// The built-in subset renderer as a strategy.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubsetStrategy;

impl RenderStrategy for SubsetStrategy {
    fn variant(&self) -> ArtifactVariant {
        ArtifactVariant::ParsedSubset
    }

    fn name(&self) -> &'static str {
        "subset"
    }

    fn render<'a>(&'a self, source: &'a str, _key: &'a CacheKey) -> RenderFuture<'a> {
        Box::pin(async move {
            let commands = subset::parse(source);
            if commands.is_empty() {
                return Err(RenderError::SubsetEmpty);
            }
            Ok(subset::emit(&commands))
        })
    }
}
