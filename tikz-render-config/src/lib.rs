//! Configuration system for the tikz-render snippet pipeline.
//!
//! This crate provides configuration loading, saving, validation and default
//! values for:
//!
//! - the artifact cache directory and its public URL prefix
//! - the remote compile service tier
//! - the local typesetting toolchain tier

pub mod config;
pub mod defaults;
mod error;

pub use config::{Config, RemoteConfig, ToolchainConfig};
pub use error::ConfigError;
