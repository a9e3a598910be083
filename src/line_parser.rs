use serde::Serialize;
use thiserror::Error;

/// Index of the whitespace-separated field holding the sample value.
pub const SAMPLE_FIELD: usize = 4;

/// Single numeric value extracted from one log line.
#[derive(Copy, Clone, Debug, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Sample {
    pub value: f64,
}

impl Sample {
    pub fn new(value: f64) -> Self {
        Self { value }
    }
}

impl From<f64> for Sample {
    fn from(value: f64) -> Self {
        Self::new(value)
    }
}

/// Reasons a line does not yield a `Sample`.
///
/// These are per-line conditions: callers skip the line (optionally logging the reason) and keep going.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineRejection {
    #[error("line is blank")]
    Blank,
    #[error("line has only {0} fields")]
    TooFewFields(usize),
    #[error("field `{0}` is not a number")]
    NotNumeric(String),
}

/// Extract the sample from a raw log line.
///
/// The line is trimmed and split on whitespace; the fifth field must parse as `f64`, with single underscores
/// allowed between digits (`1_000`). Nothing else is validated.
///
/// ```rust
/// # use sampletail::{parse_line, LineRejection};
/// assert_eq!(parse_line("a b c d 3.14\n").unwrap().value, 3.14);
/// assert_eq!(parse_line("x y"), Err(LineRejection::TooFewFields(2)));
/// ```
pub fn parse_line(line: &str) -> Result<Sample, LineRejection> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return Err(LineRejection::Blank);
    }

    let mut fields = trimmed.split_whitespace();
    let Some(field) = fields.nth(SAMPLE_FIELD) else {
        return Err(LineRejection::TooFewFields(trimmed.split_whitespace().count()));
    };

    parse_number(field)
        .map(Sample::new)
        .ok_or_else(|| LineRejection::NotNumeric(field.to_string()))
}

fn parse_number(field: &str) -> Option<f64> {
    if !field.contains('_') {
        return field.parse().ok();
    }
    let bytes = field.as_bytes();
    let separates_digits = bytes.iter().enumerate().all(|(i, &b)| {
        b != b'_'
            || (i > 0
                && bytes[i - 1].is_ascii_digit()
                && bytes.get(i + 1).is_some_and(u8::is_ascii_digit))
    });
    if !separates_digits {
        return None;
    }
    field.replace('_', "").parse().ok()
}

/// Whether `c` ends a line: `\n`, `\r`, vertical tab, form feed, the file/group/record separators, NEL and the
/// Unicode line and paragraph separators.
pub(crate) fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c'..='\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split `text` on every `is_line_break` character.
pub(crate) fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split(is_line_break)
}
