//! SVG emission for parsed geometry.
//!
//! Diagram units are mapped to pixels with [`transform`]; the canvas is sized
//! to the accumulated [`BoundingBox`] so nothing is clipped.

use std::fmt::Write as _;

use super::command::{FONT_SIZE, GeometricCommand, Point, TextAnchor};

/// Pixels per diagram unit.
pub const SCALE: f64 = 50.0;
pub const ORIGIN_X: f64 = 200.0;
pub const ORIGIN_Y: f64 = 200.0;
/// Padding kept around every primitive.
pub const MARGIN: f64 = 20.0;

/// Canvas used when a snippet produced no geometry.
pub const EMPTY_WIDTH: f64 = 400.0;
pub const EMPTY_HEIGHT: f64 = 300.0;

const LABEL_COLOR: &str = "#2d2d2d";
/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH: f64 = 0.6;
const DESCENT: f64 = 0.3;

/// Map a point in diagram units to canvas pixels (y axis flipped).
pub fn transform(point: Point) -> (f64, f64) {
    (point.x * SCALE + ORIGIN_X, ORIGIN_Y - point.y * SCALE)
}

/// Pixel-space extent of everything drawn so far.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn around(x: f64, y: f64, pad: f64) -> Self {
        Self {
            min_x: x - pad,
            min_y: y - pad,
            max_x: x + pad,
            max_y: y + pad,
        }
    }

    fn union(self, other: BoundingBox) -> Self {
        Self {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

fn grow(bbox: &mut Option<BoundingBox>, extent: BoundingBox) {
    *bbox = Some(match bbox.take() {
        Some(current) => current.union(extent),
        None => extent,
    });
}

fn label_extent(x: f64, baseline: f64, text: &str, anchor: TextAnchor) -> BoundingBox {
    let width = text.chars().count() as f64 * FONT_SIZE * GLYPH_WIDTH;
    let (left, right) = match anchor {
        TextAnchor::Start => (x, x + width),
        TextAnchor::Middle => (x - width / 2.0, x + width / 2.0),
        TextAnchor::End => (x - width, x),
    };
    BoundingBox {
        min_x: left - MARGIN,
        min_y: baseline - FONT_SIZE - MARGIN,
        max_x: right + MARGIN,
        max_y: baseline + DESCENT * FONT_SIZE + MARGIN,
    }
}

/// Bounding box of `commands` in canvas pixels, or `None` if nothing is drawn.
pub fn bounding_box(commands: &[GeometricCommand]) -> Option<BoundingBox> {
    let mut bbox = None;
    for command in commands {
        match command {
            GeometricCommand::Path { points, .. } => {
                for point in points {
                    let (x, y) = transform(*point);
                    grow(&mut bbox, BoundingBox::around(x, y, MARGIN));
                }
            }
            GeometricCommand::Circle { center, radius, .. } => {
                let (x, y) = transform(*center);
                grow(&mut bbox, BoundingBox::around(x, y, radius * SCALE + MARGIN));
            }
            GeometricCommand::Label {
                position,
                text,
                anchor,
            } => {
                let (x, y) = transform(*position);
                grow(
                    &mut bbox,
                    label_extent(x, y + anchor.vertical_offset, text, anchor.anchor),
                );
            }
        }
    }
    bbox
}

/// Render commands as a standalone SVG document.
pub fn emit(commands: &[GeometricCommand]) -> Vec<u8> {
    let bbox = bounding_box(commands).unwrap_or(BoundingBox {
        min_x: 0.0,
        min_y: 0.0,
        max_x: EMPTY_WIDTH,
        max_y: EMPTY_HEIGHT,
    });

    let mut svg = String::new();
    let _ = writeln!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="{x} {y} {w} {h}">"#,
        w = num(bbox.width()),
        h = num(bbox.height()),
        x = num(bbox.min_x),
        y = num(bbox.min_y),
    );
    svg.push_str(
        "<style>text { font-family: 'EB Garamond', Georgia, 'Times New Roman', serif; }</style>\n",
    );

    for command in commands {
        match command {
            GeometricCommand::Path {
                points,
                closed,
                stroke,
            } => {
                let mut d = String::new();
                for (i, point) in points.iter().enumerate() {
                    let (x, y) = transform(*point);
                    let op = if i == 0 { 'M' } else { 'L' };
                    let _ = write!(d, "{}{} {} ", op, num(x), num(y));
                }
                if *closed {
                    d.push('Z');
                }
                let _ = writeln!(
                    svg,
                    r#"<path d="{}" fill="none" stroke="{}" stroke-width="{}" stroke-linejoin="round"/>"#,
                    d.trim_end(),
                    stroke.color,
                    num(stroke.width)
                );
            }
            GeometricCommand::Circle {
                center,
                radius,
                stroke,
            } => {
                let (x, y) = transform(*center);
                let _ = writeln!(
                    svg,
                    r#"<circle cx="{}" cy="{}" r="{}" fill="none" stroke="{}" stroke-width="{}"/>"#,
                    num(x),
                    num(y),
                    num(radius * SCALE),
                    stroke.color,
                    num(stroke.width)
                );
            }
            GeometricCommand::Label {
                position,
                text,
                anchor,
            } => {
                let (x, y) = transform(*position);
                let _ = writeln!(
                    svg,
                    r#"<text x="{}" y="{}" dy="{}" text-anchor="{}" font-size="{}" fill="{}">{}</text>"#,
                    num(x),
                    num(y),
                    num(anchor.vertical_offset),
                    anchor.anchor.as_svg(),
                    num(FONT_SIZE),
                    LABEL_COLOR,
                    escape_xml(text)
                );
            }
        }
    }

    svg.push_str("</svg>\n");
    svg.into_bytes()
}

/// Format a coordinate with at most two decimals and no trailing zeros.
fn num(value: f64) -> String {
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    match trimmed {
        "-0" | "" => "0".to_string(),
        other => other.to_string(),
    }
}

pub(crate) fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::super::command::{AnchorPolicy, StrokeStyle};
    use super::*;

    #[test]
    fn test_transform_flips_y() {
        assert_eq!(transform(Point::new(0.0, 0.0)), (200.0, 200.0));
        assert_eq!(transform(Point::new(2.0, 1.0)), (300.0, 150.0));
        assert_eq!(transform(Point::new(-1.0, -1.0)), (150.0, 250.0));
    }

    #[test]
    fn test_empty_canvas_floor() {
        assert!(bounding_box(&[]).is_none());
        let svg = String::from_utf8(emit(&[])).unwrap();
        assert!(svg.contains(r#"width="400" height="300" viewBox="0 0 400 300""#));
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn test_path_and_circle_markup() {
        let commands = vec![
            GeometricCommand::Path {
                points: vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)],
                closed: true,
                stroke: StrokeStyle::default(),
            },
            GeometricCommand::Circle {
                center: Point::new(1.0, 1.0),
                radius: 0.5,
                stroke: StrokeStyle::default(),
            },
        ];
        let svg = String::from_utf8(emit(&commands)).unwrap();
        assert!(svg.contains(r#"d="M200 200 L250 200 Z""#));
        assert!(svg.contains(r##"stroke="#2d2d2d" stroke-width="2""##));
        assert!(svg.contains(r#"<circle cx="250" cy="150" r="25""#));

        let bbox = bounding_box(&commands).unwrap();
        assert_eq!(bbox.min_x, 180.0);
        assert_eq!(bbox.max_x, 295.0);
        assert_eq!(bbox.min_y, 105.0);
        assert_eq!(bbox.max_y, 220.0);
    }

    #[test]
    fn test_label_text_is_escaped() {
        let commands = vec![GeometricCommand::Label {
            position: Point::new(0.0, 0.0),
            text: "a<b & c".to_string(),
            anchor: AnchorPolicy::default(),
        }];
        let svg = String::from_utf8(emit(&commands)).unwrap();
        assert!(svg.contains(">a&lt;b &amp; c</text>"));
        assert!(svg.contains(r#"text-anchor="middle""#));
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(num(200.0), "200");
        assert_eq!(num(115.0000001), "115");
        assert_eq!(num(16.8), "16.8");
        assert_eq!(num(-0.001), "0");
        assert_eq!(num(-7.25), "-7.25");
    }
}
