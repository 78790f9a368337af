//! Last-resort permissive decoder.
//!
//! Normalizes the deviations strict JSON rejects but a model plausibly
//! emits: smart or single quotes, unquoted keys and bare word values,
//! Python literals, an unterminated string, and missing closers. The
//! normalized text then goes through `serde_json` one final time, so the
//! result is always a well-formed tree. This can coerce a malformed input
//! into a structurally different tree, which is why the pipeline only
//! reaches it after strict parsing has definitively failed.

use serde_json::Value;

use super::cleanup::remove_trailing_commas;

/// Attempts a permissive parse of `text`. The error, if any, is the strict
/// parser's verdict on the normalized text and serves as the pipeline's
/// final diagnostic.
pub fn parse_lenient(text: &str) -> Result<Value, serde_json::Error> {
    let normalized = fix_quote_variants(text);
    let normalized = rewrite_single_quoted(&normalized);
    let normalized = quote_bare_words(&normalized);
    let normalized = remove_trailing_commas(&normalized);
    let normalized = close_open_containers(&normalized);
    serde_json::from_str(&normalized)
}

/// Maps typographic quote characters to their ASCII forms.
fn fix_quote_variants(text: &str) -> String {
    text.chars()
        .map(|ch| match ch {
            '\u{201C}' | '\u{201D}' | '\u{201E}' => '"',
            '\u{2018}' | '\u{2019}' => '\'',
            other => other,
        })
        .collect()
}

/// Rewrites 'single quoted' strings as "double quoted" ones, escaping any
/// interior double quotes. Double-quoted strings pass through untouched.
fn rewrite_single_quoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    let mut in_double = false;
    let mut escape = false;
    while let Some(ch) = chars.next() {
        if in_double {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == '\\' {
                escape = true;
            } else if ch == '"' {
                in_double = false;
            }
            continue;
        }
        match ch {
            '"' => {
                in_double = true;
                escape = false;
                out.push(ch);
            }
            '\'' => {
                out.push('"');
                while let Some(inner) = chars.next() {
                    match inner {
                        '\\' => match chars.next() {
                            // \' has no meaning in JSON; emit the quote itself
                            Some('\'') => out.push('\''),
                            Some(other) => {
                                out.push('\\');
                                out.push(other);
                            }
                            None => break,
                        },
                        '\'' => break,
                        '"' => out.push_str("\\\""),
                        other => out.push(other),
                    }
                }
                out.push('"');
            }
            other => out.push(other),
        }
    }
    out
}

/// Quotes bare object keys and bare word values, and maps Python-style
/// literals onto their JSON counterparts. Anything unrecognizable is left
/// in place for the final parse to reject.
fn quote_bare_words(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut in_string = false;
    let mut escape = false;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            out.push(ch);
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            i += 1;
            continue;
        }
        if ch == b'"' {
            in_string = true;
            out.push(ch);
            i += 1;
            continue;
        }
        if ch.is_ascii_alphabetic() || ch == b'_' {
            let start = i;
            while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                i += 1;
            }
            let word = &text[start..i];
            if let Some(mapped) = map_literal(word) {
                out.extend_from_slice(mapped.as_bytes());
                continue;
            }
            let mut n = i;
            while n < bytes.len() && bytes[n].is_ascii_whitespace() {
                n += 1;
            }
            let next = bytes.get(n).copied();
            if next.is_none() || matches!(next, Some(b':' | b',' | b'}' | b']')) {
                out.push(b'"');
                out.extend_from_slice(word.as_bytes());
                out.push(b'"');
            } else {
                out.extend_from_slice(word.as_bytes());
            }
            continue;
        }
        out.push(ch);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn map_literal(word: &str) -> Option<&'static str> {
    match word {
        "true" | "True" => Some("true"),
        "false" | "False" => Some("false"),
        "null" | "None" | "undefined" | "NaN" => Some("null"),
        _ => None,
    }
}

/// Closes an unterminated string and appends missing closers in reverse
/// nesting order.
fn close_open_containers(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    for &ch in bytes {
        if in_string {
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
            }
            continue;
        }
        match ch {
            b'"' => in_string = true,
            b'{' | b'[' => stack.push(ch),
            b'}' | b']' => {
                stack.pop();
            }
            _ => {}
        }
    }
    if !in_string && stack.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + stack.len() + 1);
    out.push_str(text);
    if in_string {
        out.push('"');
    }
    while let Some(open) = stack.pop() {
        out.push(if open == b'{' { '}' } else { ']' });
    }
    out
}
