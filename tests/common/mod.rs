//! Shared integration test helpers for tikz-render.
//!
//! Include with `mod common;` at the top of a test file. The
//! `#[allow(dead_code)]` attribute suppresses warnings when a file uses only
//! some of the helpers.

#![allow(dead_code)]

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tempfile::TempDir;
use tikz_render::hasher::CacheKey;
use tikz_render::store::{ArtifactStore, ArtifactVariant};
use tikz_render::strategy::{RenderError, RenderFuture, RenderStrategy};

pub const TRIANGLE: &str = "draw (0,0) -- (2,0) -- (1,1.7) -- cycle; node[below] at (0,0) {A};";

/// Snippet the subset parser cannot draw anything from.
pub const UNDRAWABLE: &str = "\\begin{axis}\\addplot{x^2};\\end{axis}";

pub const FAKE_SVG: &[u8] = b"<svg xmlns=\"http://www.w3.org/2000/svg\"/>";

/// Opens a store in a fresh temp directory. Keep the `TempDir` alive for the
/// duration of the test.
pub async fn temp_store() -> (ArtifactStore, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let store = ArtifactStore::open(temp_dir.path().join("tikz-cache"), "/tikz-cache")
        .await
        .expect("Failed to open store");
    (store, temp_dir)
}

/// Observes and steers a [`FakeStrategy`] after it has been boxed into a
/// pipeline.
#[derive(Clone, Default)]
pub struct FakeHandle {
    calls: Arc<AtomicUsize>,
    failing: Arc<AtomicBool>,
}

impl FakeHandle {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

/// Strategy that counts invocations and succeeds or fails on demand.
pub struct FakeStrategy {
    variant: ArtifactVariant,
    name: &'static str,
    delay: Duration,
    handle: FakeHandle,
}

impl FakeStrategy {
    pub fn new(variant: ArtifactVariant, failing: bool) -> (Self, FakeHandle) {
        let handle = FakeHandle::default();
        handle.set_failing(failing);
        let name = match variant {
            ArtifactVariant::Remote => "fake-remote",
            ArtifactVariant::Local => "fake-local",
            _ => "fake",
        };
        (
            Self {
                variant,
                name,
                delay: Duration::ZERO,
                handle: handle.clone(),
            },
            handle,
        )
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn boxed(self) -> Box<dyn RenderStrategy> {
        Box::new(self)
    }
}

impl RenderStrategy for FakeStrategy {
    fn variant(&self) -> ArtifactVariant {
        self.variant
    }

    fn name(&self) -> &'static str {
        self.name
    }

    fn render<'a>(&'a self, _source: &'a str, _key: &'a CacheKey) -> RenderFuture<'a> {
        Box::pin(async move {
            self.handle.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.handle.failing.load(Ordering::SeqCst) {
                Err(RenderError::RemoteRenderFailed(format!("{} forced failure", self.name)))
            } else {
                Ok(FAKE_SVG.to_vec())
            }
        })
    }
}

/// Names of files in `dir` that mention `key`. Empty when `dir` is missing.
pub fn files_for_key(dir: &Path, key: &CacheKey) -> Vec<String> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    entries
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .filter(|name| name.contains(key.as_str()))
        .collect()
}

/// Write an executable shell script.
#[cfg(unix)]
pub fn write_script(dir: &Path, name: &str, body: &str) {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).expect("Failed to write script");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("Failed to chmod script");
}
