//! Mixed-listing line classification.
//!
//! `iasl -l` interleaves every ASL statement with the AML bytes it encodes:
//!
//! ```text
//!     Device (EC0)
//!         00001A2B:  5B 82 4B 04 45 43 30 5F  // [.K.EC0_
//! ```
//!
//! The number before the colon is the absolute byte offset inside the table.

use std::sync::LazyLock;

use regex::Regex;

static HEX_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*([0-9A-F]{4,}):((?:\s+[0-9A-F]{2})+)\s*(?://.*)?$").expect("hex line pattern is valid")
});

/// One decoded AML hex line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexLine {
    /// Table offset of the first byte.
    pub offset: usize,
    /// The bytes on this line.
    pub bytes: Vec<u8>,
}

/// Decodes `line` if it is an AML hex line.
#[must_use]
pub fn parse_hex_line(line: &str) -> Option<HexLine> {
    let caps = HEX_LINE.captures(line)?;
    let offset = usize::from_str_radix(caps.get(1)?.as_str(), 16).ok()?;
    let bytes = caps
        .get(2)?
        .as_str()
        .split_whitespace()
        .map(|b| u8::from_str_radix(b, 16))
        .collect::<Result<Vec<_>, _>>()
        .ok()?;
    Some(HexLine { offset, bytes })
}

/// Removes `//` and single-line `/* */` comments outside string literals.
#[must_use]
pub fn strip_comments(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut chars = line.chars().peekable();
    let mut in_string = false;
    let mut in_block = false;
    while let Some(c) = chars.next() {
        if in_block {
            if c == '*' && chars.peek() == Some(&'/') {
                chars.next();
                in_block = false;
            }
            continue;
        }
        if in_string {
            out.push(c);
            if c == '"' {
                in_string = false;
            }
            continue;
        }
        match (c, chars.peek()) {
            ('"', _) => {
                in_string = true;
                out.push(c);
            }
            ('/', Some('/')) => break,
            ('/', Some('*')) => {
                chars.next();
                in_block = true;
            }
            _ => out.push(c),
        }
    }
    out.trim_end().to_string()
}

/// Net `{`/`}` counts of a comment-stripped line, ignoring string contents.
#[must_use]
pub fn braces(line: &str) -> (usize, usize) {
    let mut in_string = false;
    let (mut open, mut close) = (0, 0);
    for c in line.chars() {
        match c {
            '"' => in_string = !in_string,
            '{' if !in_string => open += 1,
            '}' if !in_string => close += 1,
            _ => {}
        }
    }
    (open, close)
}
