//! Tokenizer for the supported TikZ subset.
//!
//! Brace groups are captured whole as [`Token::Text`], so a `;` inside a node
//! label never splits a statement. `%` starts a comment running to the end of
//! the line. Lengths are normalized to centimetres at lex time.

/// One lexical unit of a snippet.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    /// Identifier or control word, with any leading backslash removed.
    Word(String),
    /// Length or plain number, in centimetres when a unit was given.
    Number(f64),
    /// `--`
    Connector,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Equals,
    Semicolon,
    /// Contents of a `{...}` group without the outer braces.
    Text(String),
    /// Anything else, kept so the parser can skip it positionally.
    Other(char),
}

/// Largest length magnitude, in centimetres, that reaches the parser.
/// Anything beyond it, including literals that overflow to infinity, is
/// clamped so canvas arithmetic stays finite.
const MAX_LENGTH: f64 = 1.0e6;

/// Centimetres per unit for the length suffixes TikZ accepts.
fn unit_scale(unit: &str) -> Option<f64> {
    match unit {
        "cm" => Some(1.0),
        "mm" => Some(0.1),
        "pt" => Some(1.0 / 28.45),
        "in" => Some(2.54),
        _ => None,
    }
}

pub fn tokenize(source: &str) -> Vec<Token> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => i += 1,
            '%' => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
            }
            ';' => {
                tokens.push(Token::Semicolon);
                i += 1;
            }
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '[' => {
                tokens.push(Token::LBracket);
                i += 1;
            }
            ']' => {
                tokens.push(Token::RBracket);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '=' => {
                tokens.push(Token::Equals);
                i += 1;
            }
            '{' => {
                let (text, next) = read_group(&chars, i);
                tokens.push(Token::Text(text));
                i = next;
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                tokens.push(Token::Connector);
                i += 2;
            }
            '-' | '+' | '.' if starts_number(&chars, i) => {
                let (value, next) = read_number(&chars, i);
                tokens.push(Token::Number(value));
                i = next;
            }
            c if c.is_ascii_digit() => {
                let (value, next) = read_number(&chars, i);
                tokens.push(Token::Number(value));
                i = next;
            }
            '\\' if chars.get(i + 1).is_some_and(|n| n.is_ascii_alphabetic()) => {
                let (word, next) = read_word(&chars, i + 1);
                tokens.push(Token::Word(word));
                i = next;
            }
            c if c.is_ascii_alphabetic() => {
                let (word, next) = read_word(&chars, i);
                tokens.push(Token::Word(word));
                i = next;
            }
            other => {
                tokens.push(Token::Other(other));
                i += 1;
            }
        }
    }

    tokens
}

fn starts_number(chars: &[char], i: usize) -> bool {
    let mut j = i;
    if matches!(chars[j], '-' | '+') {
        j += 1;
    }
    match chars.get(j) {
        Some(c) if c.is_ascii_digit() => true,
        Some('.') => chars.get(j + 1).is_some_and(|c| c.is_ascii_digit()),
        _ => false,
    }
}

fn read_number(chars: &[char], start: usize) -> (f64, usize) {
    let mut i = start;
    let mut literal = String::new();
    if matches!(chars[i], '-' | '+') {
        literal.push(chars[i]);
        i += 1;
    }
    let mut seen_dot = false;
    while i < chars.len() {
        let c = chars[i];
        if c.is_ascii_digit() {
            literal.push(c);
        } else if c == '.' && !seen_dot {
            seen_dot = true;
            literal.push(c);
        } else {
            break;
        }
        i += 1;
    }
    let mut value = literal.parse::<f64>().unwrap_or(0.0);

    // Optional unit suffix glued to the number ("2cm", "4pt").
    let unit_start = i;
    while i < chars.len() && chars[i].is_ascii_alphabetic() {
        i += 1;
    }
    if i > unit_start {
        let unit: String = chars[unit_start..i].iter().collect();
        match unit_scale(&unit) {
            Some(scale) => value *= scale,
            // Not a unit: leave the letters for the next token.
            None => i = unit_start,
        }
    }

    if value.is_nan() {
        value = 0.0;
    }
    (value.clamp(-MAX_LENGTH, MAX_LENGTH), i)
}

fn read_word(chars: &[char], start: usize) -> (String, usize) {
    let mut i = start;
    while i < chars.len() && chars[i].is_ascii_alphabetic() {
        i += 1;
    }
    (chars[start..i].iter().collect(), i)
}

/// Read a balanced `{...}` group starting at `start` (which holds `{`).
/// An unterminated group runs to the end of input.
fn read_group(chars: &[char], start: usize) -> (String, usize) {
    let mut depth = 0usize;
    let mut i = start;
    let mut text = String::new();
    while i < chars.len() {
        let c = chars[i];
        match c {
            '{' => {
                if depth > 0 {
                    text.push(c);
                }
                depth += 1;
            }
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return (text, i + 1);
                }
                text.push(c);
            }
            _ => text.push(c),
        }
        i += 1;
    }
    (text, i)
}
