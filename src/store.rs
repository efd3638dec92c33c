//! Durable, content-addressed artifact storage.
//!
//! One SVG file per (key, variant) pair, named `<variant>-<key>.svg`, so a
//! remote rendering, a local rendering, a subset rendering and an error
//! placeholder for the same snippet coexist without overwriting one another.
//!
//! Writes go to a hidden temp file in the cache directory and are renamed
//! into place, so [`ArtifactStore::exists`] never observes a partial file.

use std::fmt;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::hasher::CacheKey;

/// How an artifact was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactVariant {
    /// Rendered by the remote compile service.
    Remote,
    /// Rendered by the local typesetting toolchain.
    Local,
    /// Rendered by the built-in subset parser.
    ParsedSubset,
    /// Diagnostic placeholder written when every strategy failed.
    Error,
}

impl ArtifactVariant {
    /// Variants that count as a real rendering, highest fidelity first.
    pub const RENDERED: [ArtifactVariant; 3] = [
        ArtifactVariant::Remote,
        ArtifactVariant::Local,
        ArtifactVariant::ParsedSubset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactVariant::Remote => "remote",
            ArtifactVariant::Local => "local",
            ArtifactVariant::ParsedSubset => "parsed-subset",
            ArtifactVariant::Error => "error",
        }
    }
}

impl fmt::Display for ArtifactVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored (or storable) image file and the locator the presentation layer
/// resolves it by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifact {
    pub key: CacheKey,
    pub variant: ArtifactVariant,
    /// Location of the file on disk.
    pub path: PathBuf,
    /// Externally resolvable reference, e.g. `/tikz-cache/remote-<key>.svg`.
    pub locator: String,
}

/// Whether writes are fsynced before being reported as complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WriteDurability {
    #[default]
    Fast,
    Durable,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("artifact store I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Keyed on-disk storage for rendered artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
    url_prefix: String,
    durability: WriteDurability,
}

impl ArtifactStore {
    /// Open the store, creating its directory and proving it is writable.
    ///
    /// A failure here means the cache cannot work at all and should abort
    /// startup.
    pub async fn open(
        dir: impl Into<PathBuf>,
        url_prefix: impl Into<String>,
    ) -> Result<Self, StoreError> {
        let dir = dir.into();
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        let probe = dir.join(format!(".tikz-render.probe.{}", std::process::id()));
        tokio::fs::write(&probe, b"probe")
            .await
            .map_err(|e| StoreError::io(&probe, e))?;
        let _ = tokio::fs::remove_file(&probe).await;

        log::info!("Artifact store ready at {:?}", dir);
        Ok(Self {
            dir,
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            durability: WriteDurability::Fast,
        })
    }

    pub fn with_durability(mut self, durability: WriteDurability) -> Self {
        self.durability = durability;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn file_name(key: &CacheKey, variant: ArtifactVariant) -> String {
        format!("{}-{}.svg", variant.as_str(), key)
    }

    /// Derive the artifact identity for (key, variant) without touching disk.
    pub fn reference(&self, key: &CacheKey, variant: ArtifactVariant) -> RenderedArtifact {
        let file_name = Self::file_name(key, variant);
        RenderedArtifact {
            key: key.clone(),
            variant,
            path: self.dir.join(&file_name),
            locator: format!("{}/{}", self.url_prefix, file_name),
        }
    }

    /// `Ok(false)` when the artifact is absent; `Err` only on real I/O failure.
    pub async fn exists(&self, key: &CacheKey, variant: ArtifactVariant) -> Result<bool, StoreError> {
        let path = self.dir.join(Self::file_name(key, variant));
        match tokio::fs::metadata(&path).await {
            Ok(md) => Ok(md.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(source) => Err(StoreError::io(&path, source)),
        }
    }

    /// Atomically persist `contents` as the artifact for (key, variant).
    pub async fn write(
        &self,
        key: &CacheKey,
        variant: ArtifactVariant,
        contents: &[u8],
    ) -> Result<RenderedArtifact, StoreError> {
        let artifact = self.reference(key, variant);
        let file_name = Self::file_name(key, variant);

        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos();
        let tmp_path = self
            .dir
            .join(format!(".tikz-render.tmp.{file_name}.{nanos}"));

        if let Err(err) = self.write_tmp(&tmp_path, contents).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(err);
        }

        if let Err(source) = rename_overwrite(&tmp_path, &artifact.path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(StoreError::io(&artifact.path, source));
        }

        if self.durability == WriteDurability::Durable {
            #[cfg(unix)]
            {
                let dir = tokio::fs::File::open(&self.dir)
                    .await
                    .map_err(|e| StoreError::io(&self.dir, e))?;
                dir.sync_all()
                    .await
                    .map_err(|e| StoreError::io(&self.dir, e))?;
            }
        }

        log::debug!(
            "Stored {} artifact {} ({} bytes)",
            variant,
            artifact.path.display(),
            contents.len()
        );
        Ok(artifact)
    }

    async fn write_tmp(&self, tmp_path: &Path, contents: &[u8]) -> Result<(), StoreError> {
        let mut file = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(tmp_path)
            .await
            .map_err(|e| StoreError::io(tmp_path, e))?;

        file.write_all(contents)
            .await
            .map_err(|e| StoreError::io(tmp_path, e))?;
        file.flush().await.map_err(|e| StoreError::io(tmp_path, e))?;

        if self.durability == WriteDurability::Durable {
            file.sync_all()
                .await
                .map_err(|e| StoreError::io(tmp_path, e))?;
        }
        Ok(())
    }
}

async fn rename_overwrite(from: &Path, to: &Path) -> io::Result<()> {
    #[cfg(windows)]
    {
        match tokio::fs::rename(from, to).await {
            Ok(()) => Ok(()),
            Err(err)
                if matches!(
                    err.kind(),
                    io::ErrorKind::AlreadyExists | io::ErrorKind::PermissionDenied
                ) =>
            {
                let _ = tokio::fs::remove_file(to).await;
                tokio::fs::rename(from, to).await
            }
            Err(err) => Err(err),
        }
    }

    #[cfg(not(windows))]
    {
        tokio::fs::rename(from, to).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store(dir: &TempDir) -> ArtifactStore {
        ArtifactStore::open(dir.path().join("cache"), "/tikz-cache/")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_reference_is_deterministic_and_variant_specific() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;
        let key = CacheKey::from_source("\\draw (0,0) -- (1,0);");

        let remote = store.reference(&key, ArtifactVariant::Remote);
        let error = store.reference(&key, ArtifactVariant::Error);
        assert_eq!(remote, store.reference(&key, ArtifactVariant::Remote));
        assert_ne!(remote.path, error.path);
        assert_eq!(remote.locator, format!("/tikz-cache/remote-{key}.svg"));
        assert_eq!(
            store.reference(&key, ArtifactVariant::ParsedSubset).locator,
            format!("/tikz-cache/parsed-subset-{key}.svg")
        );
    }

    #[tokio::test]
    async fn test_exists_false_until_written() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;
        let key = CacheKey::from_source("x");

        assert!(!store.exists(&key, ArtifactVariant::Local).await.unwrap());
        let artifact = store
            .write(&key, ArtifactVariant::Local, b"<svg/>")
            .await
            .unwrap();
        assert!(store.exists(&key, ArtifactVariant::Local).await.unwrap());
        assert!(!store.exists(&key, ArtifactVariant::Remote).await.unwrap());
        assert_eq!(std::fs::read(&artifact.path).unwrap(), b"<svg/>");
    }

    #[tokio::test]
    async fn test_variants_do_not_overwrite_each_other() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;
        let key = CacheKey::from_source("y");

        let error = store
            .write(&key, ArtifactVariant::Error, b"error")
            .await
            .unwrap();
        let subset = store
            .write(&key, ArtifactVariant::ParsedSubset, b"subset")
            .await
            .unwrap();
        assert_eq!(std::fs::read(&error.path).unwrap(), b"error");
        assert_eq!(std::fs::read(&subset.path).unwrap(), b"subset");
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp)
            .await
            .with_durability(WriteDurability::Durable);
        let key = CacheKey::from_source("z");
        store
            .write(&key, ArtifactVariant::Remote, b"<svg/>")
            .await
            .unwrap();
        store
            .write(&key, ArtifactVariant::Remote, b"<svg/>")
            .await
            .unwrap();

        let names: Vec<String> = std::fs::read_dir(store.dir())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec![format!("remote-{key}.svg")]);
    }

    #[tokio::test]
    async fn test_write_into_missing_directory_fails() {
        let temp = TempDir::new().unwrap();
        let store = open_store(&temp).await;
        std::fs::remove_dir_all(store.dir()).unwrap();

        let key = CacheKey::from_source("gone");
        let result = store.write(&key, ArtifactVariant::Remote, b"<svg/>").await;
        assert!(matches!(result, Err(StoreError::Io { .. })));
        assert!(!store.exists(&key, ArtifactVariant::Remote).await.unwrap());
    }
}
