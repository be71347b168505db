//! The `key: "value"` line grammar shared by the settings file and the
//! model-definition catalog.

use nom::{
    bytes::complete::{take_until, take_while1},
    character::complete::{char, space0},
    sequence::delimited,
    IResult, Parser,
};

/// One `key: "value"` pair and the (1-based) line it was read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub key: String,
    pub value: String,
    pub line: usize,
}

fn key(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || c == '_' || c == '.').parse(input)
}

fn quoted(input: &str) -> IResult<&str, &str> {
    delimited(char('"'), take_until("\""), char('"')).parse(input)
}

fn entry(input: &str) -> IResult<&str, (&str, &str)> {
    let (input, _) = space0.parse(input)?;
    let (input, k) = key(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, _) = char(':').parse(input)?;
    let (input, _) = space0.parse(input)?;
    let (input, v) = quoted(input)?;
    Ok((input, (k, v)))
}

/// Parse a single line.
///
/// Returns `None` for blank lines, `#` comments and lines that do not follow
/// the grammar. Anything after the closing quote is ignored.
pub fn parse_line(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    entry(trimmed).ok().map(|(_, kv)| kv)
}

/// Parse every entry in a document, keeping file order.
///
/// Non-comment lines that do not parse are logged and skipped.
pub fn parse_entries(text: &str, source: &str) -> Vec<Entry> {
    let mut entries = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        match parse_line(line) {
            Some((key, value)) => entries.push(Entry {
                key: key.to_string(),
                value: value.to_string(),
                line: idx + 1,
            }),
            None => {
                let trimmed = line.trim();
                if !trimmed.is_empty() && !trimmed.starts_with('#') {
                    log::warn!("{}:{}: ignoring unrecognized line: {}", source, idx + 1, trimmed);
                }
            }
        }
    }
    entries
}

/// Split a comma-separated list value, trimming whitespace and dropping empty items.
pub fn split_list(value: &str) -> Vec<&str> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}
