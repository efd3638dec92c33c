//! Diagnostic image written when no strategy could render a snippet.

use crate::hasher::CacheKey;
use crate::subset::emit::escape_xml;

const EXCERPT_CHARS: usize = 48;

/// First non-empty line of the source, shortened for display.
pub fn excerpt(source: &str) -> String {
    let line = source
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("");
    if line.chars().count() > EXCERPT_CHARS {
        let cut: String = line.chars().take(EXCERPT_CHARS - 3).collect();
        format!("{cut}...")
    } else {
        line.to_string()
    }
}

/// Build the fixed-structure error SVG for `key`.
///
/// Pure and infallible so the pipeline can always produce it.
pub fn error_svg(key: &CacheKey, source: &str) -> Vec<u8> {
    format!(
        r##"<svg width="400" height="200" viewBox="0 0 400 200" xmlns="http://www.w3.org/2000/svg">
  <rect x="1" y="1" width="398" height="198" fill="#ffebee" stroke="#f44336" stroke-width="2" rx="4"/>
  <text x="200" y="70" text-anchor="middle" font-family="serif" font-size="16" fill="#d32f2f">TikZ Rendering Failed</text>
  <text x="200" y="105" text-anchor="middle" font-family="monospace" font-size="12" fill="#757575">Hash: {short}</text>
  <text x="200" y="130" text-anchor="middle" font-family="monospace" font-size="11" fill="#9e9e9e">{excerpt}</text>
  <text x="200" y="160" text-anchor="middle" font-family="serif" font-size="11" fill="#999999" font-style="italic">Check TikZ syntax or server logs</text>
</svg>
"##,
        short = key.short(),
        excerpt = escape_xml(&excerpt(source)),
    )
    .into_bytes()
}
