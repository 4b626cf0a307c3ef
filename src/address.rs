use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::OnceLock;

pub const UNKNOWN: &str = "unknown";

/// A lower-cased, trimmed mailbox address, or the `unknown` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(String);

impl Address {
    pub fn unknown() -> Self {
        Address(UNKNOWN.to_string())
    }

    pub fn is_unknown(&self) -> bool {
        self.0 == UNKNOWN
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Normalizes a single address candidate such as `"Jane" <Jane@Example.com>`.
    /// Returns `None` when nothing shaped like `local@domain` remains.
    pub fn normalize(candidate: &str) -> Option<Self> {
        let inner = match (candidate.find('<'), candidate.rfind('>')) {
            (Some(open), Some(close)) if open < close => &candidate[open + 1..close],
            _ => strip_group_label(candidate),
        };

        let stripped = strip_comments(inner);
        let cleaned = stripped
            .trim()
            .trim_matches(|c: char| c == '"' || c == '\'' || c == '<' || c == '>')
            .trim()
            .to_lowercase();

        if address_shape().is_match(&cleaned) {
            Some(Address(cleaned))
        } else {
            None
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

fn address_shape() -> &'static Regex {
    static SHAPE: OnceLock<Regex> = OnceLock::new();
    SHAPE.get_or_init(|| {
        Regex::new(r#"^[^\s@<>()\[\]",;:]+@[^\s@<>()\[\]",;:]+$"#).expect("address pattern is valid")
    })
}

/// Drops a leading RFC 5322 group label, as in `Team: a@x.com`.
fn strip_group_label(candidate: &str) -> &str {
    match candidate.split_once(':') {
        Some((label, rest)) if !label.contains('@') && !label.contains('"') => rest,
        _ => candidate,
    }
}

fn strip_comments(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut depth = 0usize;
    for c in value.chars() {
        match c {
            '(' => depth += 1,
            ')' if depth > 0 => depth -= 1,
            _ if depth == 0 => out.push(c),
            _ => {}
        }
    }
    out
}

/// Splits a joined header value into address candidates on `,` and `;`,
/// ignoring separators inside quotes, angle brackets and comments.
pub fn split_address_list(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut angle = 0usize;
    let mut paren = 0usize;
    let mut escaped = false;

    for (idx, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => angle += 1,
            '>' if !in_quotes && angle > 0 => angle -= 1,
            '(' if !in_quotes => paren += 1,
            ')' if !in_quotes && paren > 0 => paren -= 1,
            ',' | ';' if !in_quotes && angle == 0 && paren == 0 => {
                parts.push(&value[start..idx]);
                start = idx + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);

    parts
        .into_iter()
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect()
}

/// Every usable address in a header value, in order of appearance.
pub fn extract_addresses(value: &str) -> Vec<Address> {
    split_address_list(value)
        .into_iter()
        .filter_map(Address::normalize)
        .collect()
}
