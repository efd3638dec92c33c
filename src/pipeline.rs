//! The rendering pipeline: cache lookup, ordered fallback, and the
//! guaranteed error placeholder.
//!
//! A request runs through three stages:
//! 1. if any rendered variant already exists for the key, return it;
//! 2. otherwise try each strategy in order and persist the first success;
//! 3. if all of them fail, persist and return the diagnostic placeholder.
//!
//! Error placeholders are never treated as cache hits, so a later success
//! supersedes them, and once a rendered variant exists it is always returned
//! ahead of any placeholder.
//!
//! Concurrent requests for the same key share one render through the
//! in-flight registry.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use thiserror::Error;
use tikz_render_config::Config;
use tokio::sync::OnceCell;

use crate::hasher::{CacheKey, normalize};
use crate::placeholder;
use crate::remote::RemoteRenderer;
use crate::store::{ArtifactStore, ArtifactVariant, RenderedArtifact, StoreError, WriteDurability};
use crate::strategy::{RenderStrategy, SubsetStrategy};
use crate::toolchain::ToolchainRenderer;

/// Attempts per store operation before the store is declared unusable.
const STORE_ATTEMPTS: usize = 2;

/// The only failure the pipeline reports to callers: the cache directory
/// cannot be read or written even after a retry.
#[derive(Debug, Clone, Error)]
pub enum PipelineError {
    #[error("artifact store unavailable: {0}")]
    StoreUnavailable(Arc<StoreError>),
}

type Outcome = Result<RenderedArtifact, PipelineError>;

pub struct RenderingPipeline {
    store: ArtifactStore,
    strategies: Vec<Box<dyn RenderStrategy>>,
    in_flight: Mutex<HashMap<CacheKey, Arc<OnceCell<Outcome>>>>,
}

impl RenderingPipeline {
    /// Build a pipeline over `strategies`, tried in the given order.
    pub fn new(store: ArtifactStore, strategies: Vec<Box<dyn RenderStrategy>>) -> Self {
        Self {
            store,
            strategies,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Open the configured store and assemble remote, toolchain and subset
    /// tiers, skipping those disabled in `config`.
    pub async fn from_config(config: &Config) -> Result<Self, StoreError> {
        let durability = if config.durable_writes {
            WriteDurability::Durable
        } else {
            WriteDurability::Fast
        };
        let store = ArtifactStore::open(config.cache_dir.clone(), config.url_prefix.clone())
            .await?
            .with_durability(durability);

        let mut strategies: Vec<Box<dyn RenderStrategy>> = Vec::new();
        if config.remote.enabled {
            let remote = RemoteRenderer::from_config(&config.remote);
            log::debug!("Remote rendering via {}", remote.endpoint());
            strategies.push(Box::new(remote));
        } else {
            log::debug!("Remote rendering disabled by configuration");
        }
        if config.toolchain.enabled {
            let toolchain = ToolchainRenderer::from_config(&config.toolchain);
            log::debug!("Local toolchain scratch directory {:?}", toolchain.work_dir());
            strategies.push(Box::new(toolchain));
        } else {
            log::debug!("Local toolchain rendering disabled by configuration");
        }
        strategies.push(Box::new(SubsetStrategy));

        Ok(Self::new(store, strategies))
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Number of renders currently in progress.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().len()
    }

    /// Resolve `source` to a stored artifact.
    ///
    /// Always yields an artifact unless the store itself is unusable.
    pub async fn render(&self, source: &str) -> Result<RenderedArtifact, PipelineError> {
        let source = normalize(source);
        let key = CacheKey::from_source(source);

        let cell = self
            .in_flight
            .lock()
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();
        let _entry = InFlightEntry {
            registry: &self.in_flight,
            key: &key,
            cell: &cell,
        };

        cell.get_or_init(|| self.resolve(source, &key))
            .await
            .clone()
    }

    async fn resolve(&self, source: &str, key: &CacheKey) -> Outcome {
        if let Some(hit) = self.cached(key).await? {
            log::debug!("Cache hit for {} ({})", key.short(), hit.variant);
            return Ok(hit);
        }

        for strategy in &self.strategies {
            match strategy.render(source, key).await {
                Ok(bytes) => {
                    let artifact = self.write(key, strategy.variant(), &bytes).await?;
                    log::info!(
                        "Rendered {} via {} -> {}",
                        key.short(),
                        strategy.name(),
                        artifact.locator
                    );
                    return Ok(artifact);
                }
                Err(reason) => {
                    log::warn!(
                        "Render strategy failed: key={} strategy={} reason={}",
                        key.short(),
                        strategy.name(),
                        reason
                    );
                }
            }
        }

        let svg = placeholder::error_svg(key, source);
        let artifact = self.write(key, ArtifactVariant::Error, &svg).await?;
        log::error!(
            "All render strategies failed: key={} placeholder={}",
            key.short(),
            artifact.locator
        );
        Ok(artifact)
    }

    /// Best existing rendered variant for `key`, highest fidelity first.
    async fn cached(&self, key: &CacheKey) -> Result<Option<RenderedArtifact>, PipelineError> {
        for variant in ArtifactVariant::RENDERED {
            if self.exists(key, variant).await? {
                return Ok(Some(self.store.reference(key, variant)));
            }
        }
        Ok(None)
    }

    async fn exists(&self, key: &CacheKey, variant: ArtifactVariant) -> Result<bool, PipelineError> {
        let store = &self.store;
        retry_store(key, "lookup", move || store.exists(key, variant)).await
    }

    async fn write(
        &self,
        key: &CacheKey,
        variant: ArtifactVariant,
        bytes: &[u8],
    ) -> Result<RenderedArtifact, PipelineError> {
        let store = &self.store;
        retry_store(key, "write", move || store.write(key, variant, bytes)).await
    }
}

/// Registry slot held for the duration of one `render` call.
///
/// Dropping it (on completion or cancellation) removes the entry once the
/// cell is settled or no other request is waiting on it.
struct InFlightEntry<'a> {
    registry: &'a Mutex<HashMap<CacheKey, Arc<OnceCell<Outcome>>>>,
    key: &'a CacheKey,
    cell: &'a Arc<OnceCell<Outcome>>,
}

impl Drop for InFlightEntry<'_> {
    fn drop(&mut self) {
        let mut in_flight = self.registry.lock();
        let registered = in_flight
            .get(self.key)
            .is_some_and(|c| Arc::ptr_eq(c, self.cell));
        // One reference is the map's, one is ours.
        let unshared = Arc::strong_count(self.cell) <= 2;
        if registered && (self.cell.initialized() || unshared) {
            in_flight.remove(self.key);
        }
    }
}

/// Run a store operation, retrying once before the store is declared unusable.
async fn retry_store<T, F, Fut>(key: &CacheKey, action: &str, mut op: F) -> Result<T, PipelineError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StoreError>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < STORE_ATTEMPTS => {
                log::warn!("Store {} failed for {} (retrying): {}", action, key.short(), err);
                attempt += 1;
            }
            Err(err) => return Err(store_unavailable(err)),
        }
    }
}

fn store_unavailable(err: StoreError) -> PipelineError {
    log::error!("Artifact store unusable: {}", err);
    PipelineError::StoreUnavailable(Arc::new(err))
}
