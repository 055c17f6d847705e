//! Quoting and escaping for the wire dialect.
//!
//! Two layers apply to full-text terms: the match expression is first
//! escaped for the full-text operator syntax, then the assembled expression
//! is quoted as an ordinary string literal. Field names take a stricter
//! profile than free text because `|` and `-` stay meaningful operators
//! inside a term but must never survive in a field reference.

/// Full-text operator metacharacters escaped in free text.
const MATCH_TEXT_META: &[char] = &[
    '\\', '(', ')', '!', '@', '~', '"', '&', '/', '^', '$', '=', '<', ' ',
];

/// Additional metacharacters escaped in field names.
const MATCH_FIELD_META: &[char] = &['|', '-'];

/// Quote a string literal for the dialect.
///
/// MySQL-style escaping: neutralizes the quote characters, backslash, NUL
/// and line terminators, so neither the dialect's own metacharacters nor
/// the `MATCH('...')` delimiter can be injected through a value.
pub fn quote_str(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 2);
    out.push('\'');
    for c in input.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\0' => out.push_str("\\0"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x1a' => out.push_str("\\Z"),
            _ => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Escape free text for use inside a full-text match expression.
pub fn escape_match_text(input: &str) -> String {
    escape_chars(input, MATCH_TEXT_META, &[])
}

/// Escape a field name for use after `@` in a match expression.
pub fn escape_match_field(input: &str) -> String {
    escape_chars(input, MATCH_TEXT_META, MATCH_FIELD_META)
}

fn escape_chars(input: &str, set: &[char], extra: &[char]) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if set.contains(&c) || extra.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
