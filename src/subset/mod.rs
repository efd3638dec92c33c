//! Built-in renderer for a line/circle/node subset of TikZ.
//!
//! This tier never fails: malformed input degrades to sparse or empty
//! geometry, and [`emit`] always produces a valid canvas.

pub mod command;
pub mod emit;
pub mod lexer;
pub mod parser;

pub use command::{AnchorPolicy, GeometricCommand, Point, StrokeStyle, TextAnchor};
pub use emit::{BoundingBox, bounding_box, emit};
pub use parser::parse;

/// Parse and emit in one step.
pub fn render_subset(source: &str) -> Vec<u8> {
    emit(&parse(source))
}
