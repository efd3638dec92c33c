//! Geometric commands produced by the subset parser.

/// A point in diagram units (TikZ centimetres, y pointing up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

pub const DEFAULT_STROKE_COLOR: &str = "#2d2d2d";
pub const DEFAULT_STROKE_WIDTH: f64 = 2.0;

/// Stroke color and width, in SVG terms.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub color: &'static str,
    pub width: f64,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_STROKE_COLOR,
            width: DEFAULT_STROKE_WIDTH,
        }
    }
}

impl StrokeStyle {
    /// Apply one option word (`thick`, `red`, ...). Returns `false` when the
    /// word is not a stroke qualifier.
    pub fn apply(&mut self, word: &str) -> bool {
        if let Some(color) = named_color(word) {
            self.color = color;
            return true;
        }
        match word {
            "thin" => self.width = 1.0,
            "thick" => self.width = 3.0,
            "verythick" => self.width = 4.0,
            _ => return false,
        }
        true
    }
}

fn named_color(word: &str) -> Option<&'static str> {
    match word {
        "black" => Some("#000000"),
        "red" => Some("#c62828"),
        "blue" => Some("#1565c0"),
        "green" => Some("#2e7d32"),
        "orange" => Some("#ef6c00"),
        "gray" | "grey" => Some("#757575"),
        _ => None,
    }
}

/// Horizontal text anchor of a label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_svg(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

pub const FONT_SIZE: f64 = 14.0;

/// Anchor and vertical offset (pixels, positive is downward) for a label.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnchorPolicy {
    pub anchor: TextAnchor,
    pub vertical_offset: f64,
}

impl Default for AnchorPolicy {
    fn default() -> Self {
        Self {
            anchor: TextAnchor::Middle,
            vertical_offset: 0.0,
        }
    }
}

/// Placement qualifiers collected from a node's `[...]` options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Placement {
    pub above: bool,
    pub below: bool,
    pub left: bool,
    pub right: bool,
}

impl Placement {
    /// Record a qualifier word. Returns `false` for non-placement words.
    pub fn apply(&mut self, word: &str) -> bool {
        match word {
            "above" => self.above = true,
            "below" => self.below = true,
            "left" => self.left = true,
            "right" => self.right = true,
            _ => return false,
        }
        true
    }

    pub fn policy(self) -> AnchorPolicy {
        let anchor = match (self.left, self.right) {
            (true, false) => TextAnchor::End,
            (false, true) => TextAnchor::Start,
            _ => TextAnchor::Middle,
        };
        let vertical_offset = match (self.above, self.below) {
            (false, true) => 1.2 * FONT_SIZE,
            (true, false) => -0.5 * FONT_SIZE,
            _ => 0.0,
        };
        AnchorPolicy {
            anchor,
            vertical_offset,
        }
    }
}

/// One drawable primitive.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometricCommand {
    Path {
        points: Vec<Point>,
        closed: bool,
        stroke: StrokeStyle,
    },
    Circle {
        center: Point,
        /// Radius in diagram units.
        radius: f64,
        stroke: StrokeStyle,
    },
    Label {
        position: Point,
        text: String,
        anchor: AnchorPolicy,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anchor_policy_table() {
        let policy = |words: &[&str]| {
            let mut placement = Placement::default();
            for w in words {
                placement.apply(w);
            }
            placement.policy()
        };

        let below = policy(&["below"]);
        assert_eq!(below.anchor, TextAnchor::Middle);
        assert!(below.vertical_offset > 0.0);

        let above = policy(&["above"]);
        assert_eq!(above.anchor, TextAnchor::Middle);
        assert!(above.vertical_offset < 0.0);

        assert_eq!(policy(&["left"]).anchor, TextAnchor::End);
        assert_eq!(policy(&["right"]).anchor, TextAnchor::Start);
        assert_eq!(policy(&[]), AnchorPolicy::default());

        let combined = policy(&["below", "right"]);
        assert_eq!(combined.anchor, TextAnchor::Start);
        assert!(combined.vertical_offset > 0.0);
    }

    #[test]
    fn test_stroke_qualifiers() {
        let mut stroke = StrokeStyle::default();
        assert!(stroke.apply("thick"));
        assert!(stroke.apply("blue"));
        assert!(!stroke.apply("dashed"));
        assert_eq!(stroke.width, 3.0);
        assert_eq!(stroke.color, "#1565c0");
    }
}
