//! Default value functions for configuration.
//!
//! Used as `#[serde(default = "crate::defaults::...")]` attributes on the
//! config structs so that a partial YAML file keeps sensible values.

use std::path::PathBuf;

// ── Primitive helpers ──────────────────────────────────────────────────────

pub fn bool_true() -> bool {
    true
}

pub fn bool_false() -> bool {
    false
}

// ── Artifact cache ─────────────────────────────────────────────────────────

pub fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tikz-render")
        .join("tikz-cache")
}

pub fn url_prefix() -> String {
    "/tikz-cache".to_string()
}

// ── Remote compile service ─────────────────────────────────────────────────

pub fn remote_endpoint() -> String {
    "https://quicklatex.com/latex3.f".to_string()
}

pub fn remote_timeout_secs() -> u64 {
    20
}

pub fn remote_font_size() -> String {
    "17px".to_string()
}

pub fn remote_color() -> String {
    "000000".to_string()
}

// ── Local toolchain ────────────────────────────────────────────────────────

pub fn compiler() -> String {
    "pdflatex".to_string()
}

pub fn converter() -> String {
    "pdf2svg".to_string()
}

pub fn work_dir() -> PathBuf {
    std::env::temp_dir().join("tikz-render")
}

pub fn toolchain_timeout_secs() -> u64 {
    30
}
