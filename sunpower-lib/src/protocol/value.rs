use std::fmt::Display;

use super::Reply;

/// Placeholder returned when a reply carries no value token.
pub const NO_REPLY: &str = "No reply";

const TRUE_WORDS: &[&str] = &["true", "yes", "on", "1"];
const FALSE_WORDS: &[&str] = &["false", "no", "off", "0"];

/// A typed reply value.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
}

impl ParsedValue {
    pub fn no_reply() -> Self {
        ParsedValue::Str(NO_REPLY.to_string())
    }

    pub fn is_no_reply(&self) -> bool {
        matches!(self, ParsedValue::Str(s) if s == NO_REPLY)
    }

    /// Numeric view of the value. Booleans are not numbers here.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            ParsedValue::Int(i) => Some(i as f64),
            ParsedValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            ParsedValue::Bool(b) => Some(b),
            _ => None,
        }
    }
}

impl Display for ParsedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParsedValue::Bool(b) => b.fmt(f),
            ParsedValue::Int(i) => i.fmt(f),
            ParsedValue::Float(x) => x.fmt(f),
            ParsedValue::Str(s) => s.fmt(f),
        }
    }
}

/// Types token 1 of a reply.
///
/// The first token echoes the command and the second carries the value;
/// tokens are counted across all reply lines. A reply with fewer than two
/// tokens yields [`NO_REPLY`] rather than an error.
///
/// Only that one token is typed, so a value line holding several words is
/// cut to its first word: `["ERROR", "Over temperature fault"]` gives
/// `Str("Over")`. Read [`Reply`] lines directly when the whole text matters.
///
/// Checks run in a fixed order: boolean keywords first (case-insensitive),
/// then base-10 integer, then float, falling back to the token itself. Since
/// booleans win, `1` and `0` parse as `Bool`, never as `Int`.
pub fn parse_single_value(reply: &Reply) -> ParsedValue {
    let token = match reply.tokens().nth(1) {
        Some(token) => token,
        None => return ParsedValue::no_reply(),
    };

    if TRUE_WORDS.iter().any(|w| token.eq_ignore_ascii_case(w)) {
        return ParsedValue::Bool(true);
    }
    if FALSE_WORDS.iter().any(|w| token.eq_ignore_ascii_case(w)) {
        return ParsedValue::Bool(false);
    }

    if let Ok(i) = token.parse::<i64>() {
        return ParsedValue::Int(i);
    }

    if let Ok(x) = token.parse::<f64>() {
        return ParsedValue::Float(x);
    }

    ParsedValue::Str(token.trim().to_string())
}
