//! Local rendering through a TeX compiler and a PDF-to-SVG converter.
//!
//! Every scratch file is named after the snippet's cache key, so concurrent
//! renders of different snippets never collide, and all of them are removed
//! by [`TempFiles`] when the render finishes, fails or is cancelled.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tikz_render_config::ToolchainConfig;
use tokio::process::Command;

use crate::document::{self, DocumentTarget};
use crate::hasher::CacheKey;
use crate::store::ArtifactVariant;
use crate::strategy::{RenderError, RenderFuture, RenderStrategy};

/// Extensions the compiler and converter may leave behind.
pub const SCRATCH_EXTENSIONS: &[&str] = &["tex", "pdf", "aux", "log", "fls", "fdb_latexmk", "svg"];

/// Upper bound on diagnostic text carried in errors.
const MAX_DIAGNOSTIC_CHARS: usize = 2000;
const LOG_TAIL_LINES: usize = 20;

/// Resolve `binary` to a file, either directly (absolute or relative path)
/// or by searching `path_var`.
pub fn resolve_executable(binary: &str, path_var: Option<&OsStr>) -> Option<PathBuf> {
    if binary.is_empty() {
        return None;
    }
    let path = Path::new(binary);
    if path.is_absolute() || path.components().count() > 1 {
        return path.is_file().then(|| path.to_path_buf());
    }

    let executable = if cfg!(windows) && path.extension().is_none() {
        format!("{binary}.exe")
    } else {
        binary.to_string()
    };
    std::env::split_paths(path_var?)
        .map(|dir| dir.join(&executable))
        .find(|candidate| candidate.is_file())
}

/// Scratch files for one render, removed on drop.
pub struct TempFiles {
    dir: PathBuf,
    stem: String,
}

impl TempFiles {
    pub fn new(dir: &Path, key: &CacheKey) -> Self {
        Self {
            dir: dir.to_path_buf(),
            stem: key.as_str().to_string(),
        }
    }

    pub fn path(&self, extension: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.stem, extension))
    }
}

impl Drop for TempFiles {
    fn drop(&mut self) {
        for ext in SCRATCH_EXTENSIONS {
            let path = self.path(ext);
            match std::fs::remove_file(&path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("Failed to remove scratch file {:?}: {}", path, e),
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolchainRenderer {
    compiler: String,
    converter: String,
    work_dir: PathBuf,
    timeout: Duration,
    /// Overrides `PATH` for executable lookup.
    search_path: Option<OsString>,
}

impl ToolchainRenderer {
    pub fn new(
        compiler: impl Into<String>,
        converter: impl Into<String>,
        work_dir: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Self {
        Self {
            compiler: compiler.into(),
            converter: converter.into(),
            work_dir: work_dir.into(),
            timeout,
            search_path: None,
        }
    }

    pub fn from_config(config: &ToolchainConfig) -> Self {
        Self::new(
            config.compiler.clone(),
            config.converter.clone(),
            config.work_dir.clone(),
            config.timeout(),
        )
    }

    /// Look executables up in `path` instead of the process `PATH`.
    pub fn with_search_path(mut self, path: impl Into<OsString>) -> Self {
        self.search_path = Some(path.into());
        self
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Resolve both executables, reporting every one that is missing.
    pub fn resolve(&self) -> Result<(PathBuf, PathBuf), RenderError> {
        let path_var = self.search_path.clone().or_else(|| std::env::var_os("PATH"));
        let compiler = resolve_executable(&self.compiler, path_var.as_deref());
        let converter = resolve_executable(&self.converter, path_var.as_deref());
        match (compiler, converter) {
            (Some(compiler), Some(converter)) => Ok((compiler, converter)),
            (compiler, converter) => {
                let mut missing = Vec::new();
                if compiler.is_none() {
                    missing.push(self.compiler.clone());
                }
                if converter.is_none() {
                    missing.push(self.converter.clone());
                }
                Err(RenderError::ToolchainUnavailable { missing })
            }
        }
    }

    pub async fn render(&self, source: &str, key: &CacheKey) -> Result<Vec<u8>, RenderError> {
        let (compiler, converter) = self.resolve()?;

        tokio::fs::create_dir_all(&self.work_dir)
            .await
            .map_err(|e| io_error("creating work directory", &self.work_dir, e))?;
        let work_dir = std::path::absolute(&self.work_dir)
            .map_err(|e| io_error("resolving work directory", &self.work_dir, e))?;

        let files = TempFiles::new(&work_dir, key);
        let tex = files.path("tex");
        let pdf = files.path("pdf");
        let svg = files.path("svg");

        tokio::fs::write(&tex, document::wrap(source, DocumentTarget::Local))
            .await
            .map_err(|e| io_error("writing document", &tex, e))?;

        let mut compile = Command::new(&compiler);
        compile
            .arg("-interaction=nonstopmode")
            .arg("-halt-on-error")
            .arg("-output-directory")
            .arg(&work_dir)
            .arg(&tex);
        self.run(&self.compiler, compile, &work_dir).await?;

        let mut convert = Command::new(&converter);
        convert.arg(&pdf).arg(&svg);
        self.run(&self.converter, convert, &work_dir).await?;

        let bytes = tokio::fs::read(&svg)
            .await
            .map_err(|e| io_error("reading converter output", &svg, e))?;
        if bytes.is_empty() {
            return Err(RenderError::ToolchainIo(format!(
                "{} produced an empty file",
                self.converter
            )));
        }

        crate::debug_info!(
            "TOOLCHAIN",
            "rendered {} locally ({} bytes)",
            key.short(),
            bytes.len()
        );
        Ok(bytes)
    }

    /// Run one subprocess with captured output, killing it on timeout.
    async fn run(&self, tool: &str, mut command: Command, cwd: &Path) -> Result<(), RenderError> {
        command
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        log::debug!("Running {} in {:?}", tool, cwd);
        crate::debug_log!("TOOLCHAIN", "spawning {:?}", command);
        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(RenderError::ToolchainIo(format!("failed to start {tool}: {e}")));
            }
            Err(_) => {
                crate::debug_error!("TOOLCHAIN", "{} killed after {:?}", tool, self.timeout);
                return Err(RenderError::ToolchainTimedOut {
                    tool: tool.to_string(),
                });
            }
        };

        if output.status.success() {
            return Ok(());
        }

        crate::debug_error!("TOOLCHAIN", "{} exited with {}", tool, output.status);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let diagnostic = if stderr.trim().is_empty() {
            tail(&String::from_utf8_lossy(&output.stdout), LOG_TAIL_LINES)
        } else {
            stderr.trim().to_string()
        };
        Err(RenderError::ToolchainExecutionFailed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            stderr: truncate(diagnostic),
        })
    }
}

impl RenderStrategy for ToolchainRenderer {
    fn variant(&self) -> ArtifactVariant {
        ArtifactVariant::Local
    }

    fn name(&self) -> &'static str {
        "toolchain"
    }

    fn render<'a>(&'a self, source: &'a str, key: &'a CacheKey) -> RenderFuture<'a> {
        Box::pin(ToolchainRenderer::render(self, source, key))
    }
}

fn io_error(action: &str, path: &Path, e: std::io::Error) -> RenderError {
    RenderError::ToolchainIo(format!("{action} {path:?}: {e}"))
}

fn tail(text: &str, lines: usize) -> String {
    let all: Vec<&str> = text.lines().collect();
    all[all.len().saturating_sub(lines)..].join("\n")
}

fn truncate(text: String) -> String {
    if text.chars().count() <= MAX_DIAGNOSTIC_CHARS {
        return text;
    }
    text.chars().take(MAX_DIAGNOSTIC_CHARS).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_resolve_executable_in_search_path() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("fake-tool");
        std::fs::write(&bin, "").unwrap();

        let found = resolve_executable("fake-tool", Some(temp.path().as_os_str()));
        assert_eq!(found, Some(bin.clone()));
        assert_eq!(
            resolve_executable(bin.to_str().unwrap(), None),
            Some(bin.clone())
        );
        assert!(resolve_executable("fake-tool", None).is_none());
        assert!(resolve_executable("", Some(temp.path().as_os_str())).is_none());
        assert!(resolve_executable("other-tool", Some(temp.path().as_os_str())).is_none());
    }

    #[test]
    fn test_resolve_reports_every_missing_tool() {
        let temp = TempDir::new().unwrap();
        let renderer = ToolchainRenderer::new(
            "no-such-compiler",
            "no-such-converter",
            temp.path().join("work"),
            Duration::from_secs(1),
        )
        .with_search_path(temp.path().as_os_str());
        assert_eq!(
            renderer.resolve(),
            Err(RenderError::ToolchainUnavailable {
                missing: vec!["no-such-compiler".into(), "no-such-converter".into()],
            })
        );
    }

    #[test]
    fn test_temp_files_removed_on_drop() {
        let temp = TempDir::new().unwrap();
        let key = CacheKey::from_source("scratch");
        {
            let files = TempFiles::new(temp.path(), &key);
            std::fs::write(files.path("tex"), "x").unwrap();
            std::fs::write(files.path("log"), "x").unwrap();
        }
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_tail_keeps_last_lines() {
        assert_eq!(tail("a\nb\nc\nd", 2), "c\nd");
        assert_eq!(tail("a", 5), "a");
    }
}
