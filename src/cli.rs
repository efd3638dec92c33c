//! Command-line interface for tikz-render.
//!
//! Parses arguments, loads configuration and dispatches subcommands.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tikz_render_config::Config;

use crate::debug::DebugLevel;
use crate::hasher::CacheKey;
use crate::pipeline::RenderingPipeline;

/// tikz-render - Render TikZ snippets to cached SVG artifacts
#[derive(Parser, Debug)]
#[command(name = "tikz-render")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file (default: ~/.config/tikz-render/config.yaml)
    #[arg(long, value_name = "PATH", global = true)]
    pub config: Option<PathBuf>,

    /// Override the artifact cache directory
    #[arg(long, value_name = "DIR", global = true)]
    pub cache_dir: Option<PathBuf>,

    /// Log level: off, error, info, debug, trace (or 0-4)
    #[arg(long, value_name = "LEVEL", global = true, value_parser = parse_level)]
    pub log_level: Option<DebugLevel>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Render a snippet and print its artifact locator and variant
    Render {
        /// Snippet file (stdin when omitted or "-")
        file: Option<PathBuf>,
    },
    /// Print the cache key of a snippet
    Key {
        /// Snippet file (stdin when omitted or "-")
        file: Option<PathBuf>,
    },
    /// Write the built-in subset rendering of a snippet to stdout
    Subset {
        /// Snippet file (stdin when omitted or "-")
        file: Option<PathBuf>,
    },
    /// Print the effective configuration as YAML
    Config,
}

fn parse_level(raw: &str) -> Result<DebugLevel, String> {
    DebugLevel::parse(raw).ok_or_else(|| format!("unknown log level '{raw}'"))
}

/// Read snippet source from `file`, or stdin for `None` / `-`.
pub fn read_source(file: Option<&Path>) -> Result<String> {
    match file {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read snippet from {:?}", path)),
        _ => {
            let mut source = String::new();
            io::stdin()
                .read_to_string(&mut source)
                .context("Failed to read snippet from stdin")?;
            Ok(source)
        }
    }
}

/// Resolve configuration from `--config` (or the default path) and apply
/// command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(dir) = &cli.cache_dir {
        config = config.with_cache_dir(dir.clone());
    }
    Ok(config)
}

/// Run the parsed command. Returns the process exit code.
pub async fn run(cli: Cli) -> Result<i32> {
    let mut stdout = io::stdout().lock();

    match &cli.command {
        Commands::Key { file } => {
            let source = read_source(file.as_deref())?;
            writeln!(stdout, "{}", CacheKey::from_source(&source))?;
        }
        Commands::Subset { file } => {
            let source = read_source(file.as_deref())?;
            stdout.write_all(&crate::subset::render_subset(source.trim()))?;
        }
        Commands::Config => {
            let config = load_config(&cli)?;
            let yaml = serde_yaml_ng::to_string(&config).context("Failed to serialize config")?;
            stdout.write_all(yaml.as_bytes())?;
        }
        Commands::Render { file } => {
            let source = read_source(file.as_deref())?;
            let config = load_config(&cli)?;
            let pipeline = RenderingPipeline::from_config(&config)
                .await
                .with_context(|| format!("Cannot use cache directory {:?}", config.cache_dir))?;
            log::info!("Render chain: {}", pipeline.strategy_names().join(" -> "));

            let artifact = pipeline.render(&source).await?;
            writeln!(stdout, "{}\t{}", artifact.locator, artifact.variant)?;
        }
    }

    stdout.flush()?;
    Ok(0)
}
