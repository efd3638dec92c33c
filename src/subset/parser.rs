//! Recursive-descent parser from tokens to [`GeometricCommand`]s.
//!
//! Statement recognition (which keyword starts it) is separate from geometry
//! interpretation (what the statement draws). Anything unrecognized is
//! skipped; parsing never fails.

use super::command::{GeometricCommand, Placement, Point, StrokeStyle};
use super::lexer::{Token, tokenize};

/// Radius used by `circle` without an explicit radius, in diagram units
/// (3px at the default scale).
pub const DEFAULT_CIRCLE_RADIUS: f64 = 0.06;

const DRAW_KEYWORDS: &[&str] = &["draw", "path", "fill", "filldraw"];
const NODE_KEYWORD: &str = "node";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StatementKind {
    Draw,
    Node,
}

/// Parse a snippet into drawable commands.
pub fn parse(source: &str) -> Vec<GeometricCommand> {
    let tokens = tokenize(source);
    let mut commands = Vec::new();

    for statement in tokens.split(|t| *t == Token::Semicolon) {
        let Some((kind, start)) = recognize(statement) else {
            continue;
        };
        let mut cursor = Cursor::new(&statement[start + 1..]);
        match kind {
            StatementKind::Draw => parse_draw(&mut cursor, &mut commands),
            StatementKind::Node => parse_node(&mut cursor, &mut commands),
        }
    }

    commands
}

/// Find the first keyword that makes a statement drawable. Tokens before it
/// (e.g. `\begin{tikzpicture}`) are ignored.
fn recognize(statement: &[Token]) -> Option<(StatementKind, usize)> {
    statement.iter().enumerate().find_map(|(i, token)| match token {
        Token::Word(w) if DRAW_KEYWORDS.contains(&w.as_str()) => Some((StatementKind::Draw, i)),
        Token::Word(w) if w == NODE_KEYWORD => Some((StatementKind::Node, i)),
        _ => None,
    })
}

struct Cursor<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    /// `( number , number )`
    fn coordinate(&mut self) -> Option<Point> {
        match (self.peek(), self.peek_at(1), self.peek_at(2), self.peek_at(3), self.peek_at(4)) {
            (
                Some(Token::LParen),
                Some(Token::Number(x)),
                Some(Token::Comma),
                Some(Token::Number(y)),
                Some(Token::RParen),
            ) => {
                self.pos += 5;
                Some(Point::new(*x, *y))
            }
            _ => None,
        }
    }

    /// `( number )`, the short radius form after `circle`.
    fn scalar_group(&mut self) -> Option<f64> {
        match (self.peek(), self.peek_at(1), self.peek_at(2)) {
            (Some(Token::LParen), Some(Token::Number(v)), Some(Token::RParen)) => {
                self.pos += 3;
                Some(*v)
            }
            _ => None,
        }
    }

    /// Skip a parenthesized group (node names, polar coordinates, ...).
    fn skip_group(&mut self) {
        let mut depth = 0usize;
        while let Some(token) = self.bump() {
            match token {
                Token::LParen => depth += 1,
                Token::RParen => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        return;
                    }
                }
                _ => {}
            }
        }
    }

    /// Consume a `[...]` option list, returning its entries as `(key, value)`.
    /// Words of a multi-word key are joined by single spaces.
    fn options(&mut self) -> Vec<(String, Option<f64>)> {
        let mut entries = Vec::new();
        if self.peek() != Some(&Token::LBracket) {
            return entries;
        }
        self.pos += 1;

        let mut key = String::new();
        let mut value = None;
        while let Some(token) = self.bump() {
            match token {
                Token::RBracket => break,
                Token::Comma => {
                    if !key.is_empty() {
                        entries.push((std::mem::take(&mut key), value.take()));
                    }
                    value = None;
                }
                Token::Word(w) if value.is_none() => {
                    if !key.is_empty() {
                        key.push(' ');
                    }
                    key.push_str(w);
                }
                Token::Equals => {
                    if let Some(Token::Number(v)) = self.peek() {
                        value = Some(*v);
                        self.pos += 1;
                    }
                }
                _ => {}
            }
        }
        if !key.is_empty() {
            entries.push((key, value));
        }
        entries
    }
}

/// Accumulates one polyline while walking a draw statement.
struct Polyline {
    points: Vec<Point>,
    closed: bool,
}

fn flush(polyline: &mut Option<Polyline>, stroke: &StrokeStyle, out: &mut Vec<GeometricCommand>) {
    if let Some(line) = polyline.take()
        && line.points.len() >= 2
    {
        out.push(GeometricCommand::Path {
            points: line.points,
            closed: line.closed,
            stroke: stroke.clone(),
        });
    }
}

fn parse_draw(cursor: &mut Cursor<'_>, out: &mut Vec<GeometricCommand>) {
    let mut stroke = StrokeStyle::default();
    for (key, _) in cursor.options() {
        apply_stroke_words(&mut stroke, key.split_whitespace());
    }

    // Shapes are collected first so the stroke applies even when qualifier
    // words appear after coordinates.
    let mut shapes = Vec::new();
    let mut labels = Vec::new();
    let mut current: Option<Polyline> = None;
    let mut last: Option<Point> = None;
    let mut connect = false;
    let mut pending_words = Vec::new();

    while let Some(token) = cursor.peek() {
        match token {
            Token::LParen => {
                if let Some(point) = cursor.coordinate() {
                    match current.as_mut() {
                        Some(line) if connect => line.points.push(point),
                        _ => {
                            flush(&mut current, &stroke, &mut shapes);
                            current = Some(Polyline {
                                points: vec![point],
                                closed: false,
                            });
                        }
                    }
                    last = Some(point);
                    connect = false;
                } else {
                    cursor.skip_group();
                }
            }
            Token::Connector => {
                connect = true;
                cursor.bump();
            }
            Token::Word(w) if w == "cycle" => {
                cursor.bump();
                if connect && let Some(line) = current.as_mut() {
                    line.closed = true;
                }
                flush(&mut current, &stroke, &mut shapes);
                connect = false;
            }
            Token::Word(w) if w == "circle" => {
                cursor.bump();
                let radius = cursor
                    .scalar_group()
                    .or_else(|| {
                        cursor
                            .options()
                            .into_iter()
                            .find(|(k, _)| k == "radius")
                            .and_then(|(_, v)| v)
                    })
                    .filter(|r| *r > 0.0)
                    .unwrap_or(DEFAULT_CIRCLE_RADIUS);
                if let Some(center) = last {
                    shapes.push(GeometricCommand::Circle {
                        center,
                        radius,
                        stroke: stroke.clone(),
                    });
                }
            }
            Token::Word(w) if w == "rectangle" => {
                cursor.bump();
                if let (Some(a), Some(b)) = (last, cursor.coordinate()) {
                    flush(&mut current, &stroke, &mut shapes);
                    shapes.push(GeometricCommand::Path {
                        points: vec![a, Point::new(b.x, a.y), b, Point::new(a.x, b.y)],
                        closed: true,
                        stroke: stroke.clone(),
                    });
                    last = Some(b);
                }
            }
            Token::Word(w) if w == NODE_KEYWORD => {
                cursor.bump();
                if let Some(label) = node_body(cursor, last) {
                    labels.push(label);
                }
            }
            Token::Word(w) => {
                pending_words.push(w.as_str());
                cursor.bump();
            }
            Token::LBracket => {
                for (key, _) in cursor.options() {
                    apply_stroke_words(&mut stroke, key.split_whitespace());
                }
            }
            _ => {
                cursor.bump();
            }
        }
    }
    flush(&mut current, &stroke, &mut shapes);

    apply_stroke_words(&mut stroke, pending_words.into_iter());
    for shape in &mut shapes {
        match shape {
            GeometricCommand::Path { stroke: s, .. } | GeometricCommand::Circle { stroke: s, .. } => {
                *s = stroke.clone();
            }
            GeometricCommand::Label { .. } => {}
        }
    }

    out.extend(shapes);
    out.extend(labels);
}

/// `very thick` is the one two-word stroke qualifier.
fn apply_stroke_words<'w>(stroke: &mut StrokeStyle, words: impl Iterator<Item = &'w str>) {
    let mut words = words.peekable();
    while let Some(word) = words.next() {
        if word == "very" && words.peek() == Some(&"thick") {
            words.next();
            stroke.apply("verythick");
        } else {
            stroke.apply(word);
        }
    }
}

fn parse_node(cursor: &mut Cursor<'_>, out: &mut Vec<GeometricCommand>) {
    if let Some(label) = node_body(cursor, None) {
        out.push(label);
    }
}

/// Parse `[placement] (name) at (x,y) {text}` in any order. Falls back to
/// `default_position` (the current point of an enclosing draw) when no `at`
/// is given.
fn node_body(cursor: &mut Cursor<'_>, default_position: Option<Point>) -> Option<GeometricCommand> {
    let mut placement = Placement::default();
    let mut position = None;

    while let Some(token) = cursor.peek() {
        match token {
            Token::LBracket => {
                for (key, _) in cursor.options() {
                    for word in key.split_whitespace() {
                        placement.apply(word);
                    }
                }
            }
            Token::Word(w) if w == "at" => {
                cursor.bump();
                position = cursor.coordinate();
            }
            Token::Word(w) => {
                // Bare placement words outside brackets.
                placement.apply(w);
                cursor.bump();
            }
            Token::LParen => cursor.skip_group(),
            Token::Text(text) => {
                cursor.bump();
                let position = position.or(default_position)?;
                return Some(GeometricCommand::Label {
                    position,
                    text: clean_label(text),
                    anchor: placement.policy(),
                });
            }
            _ => {
                cursor.bump();
            }
        }
    }
    None
}

/// Drop math-mode delimiters and collapse whitespace.
fn clean_label(raw: &str) -> String {
    raw.replace('$', "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
