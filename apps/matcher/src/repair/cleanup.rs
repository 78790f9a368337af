//! Syntactic cleanup passes applied between the strict and lenient parse
//! attempts.
//!
//! Each pass is a pure text transform targeting one recurring malformation
//! observed in model output: markdown fencing, trailing commas near token
//! limits, a stray quote after a bare number, and arrays or objects the
//! model never closed. Passes run in a fixed order; `clean` composes them.

/// Runs every cleanup pass in order over `raw` and returns the cleaned text.
pub fn clean(raw: &str) -> String {
    let text = strip_code_fences(raw.trim());
    let text = remove_trailing_commas(text);
    let text = remove_stray_quote_after_number(&text);
    let text = collapse_whitespace(&text);
    let text = close_dangling_arrays(&text);
    close_truncated_objects(&text)
}

/// Strips ```json ... ``` or ``` ... ``` code fences wrapping the payload.
pub fn strip_code_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or_else(|| stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or_else(|| stripped.trim_start())
    } else {
        text
    }
}

fn is_number_byte(b: u8) -> bool {
    b.is_ascii_digit() || matches!(b, b'.' | b'e' | b'E' | b'+' | b'-')
}

/// Removes commas that immediately precede a closing bracket or brace.
/// String contents are left untouched.
pub fn remove_trailing_commas(text: &str) -> String {
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
        if ch == b',' {
            let mut j = i + 1;
            while j < bytes.len() && bytes[j].is_ascii_whitespace() {
                j += 1;
            }
            if j < bytes.len() && (bytes[j] == b'}' || bytes[j] == b']') {
                i += 1;
                continue;
            }
        }
        out.push(ch);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Drops a stray closing quote directly after a bare numeric value, the
/// `"score": 87",` shape. The quote must sit right after the number and be
/// followed by a delimiter; anything else is left alone.
pub fn remove_stray_quote_after_number(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    for (i, &ch) in bytes.iter().enumerate() {
        if ch == b'"' && closes_bare_number(bytes, i) {
            continue;
        }
        out.push(ch);
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn closes_bare_number(bytes: &[u8], at: usize) -> bool {
    if at == 0 || !bytes[at - 1].is_ascii_digit() {
        return false;
    }
    // walk back over the number, then any whitespace; a ':' must precede it
    let mut j = at - 1;
    while j > 0 && is_number_byte(bytes[j - 1]) {
        j -= 1;
    }
    let mut k = j;
    while k > 0 && bytes[k - 1].is_ascii_whitespace() {
        k -= 1;
    }
    if k == 0 || bytes[k - 1] != b':' {
        return false;
    }
    let mut n = at + 1;
    while n < bytes.len() && bytes[n].is_ascii_whitespace() {
        n += 1;
    }
    n == bytes.len() || matches!(bytes[n], b',' | b'}' | b']')
}

/// Collapses runs of whitespace to single spaces. Applies inside string
/// literals too, matching the original behavior; the score document never
/// carries significant whitespace.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Closes an array that runs into the next object key without a `]`:
/// `"skills": [ "a", "b", "experience": {...}` gains the missing bracket
/// before `"experience"`. Detection: a string directly inside an array
/// followed by `:` can only be a key that leaked in from the parent object.
pub fn close_dangling_arrays(text: &str) -> String {
    let bytes = text.as_bytes();
    let mut stack: Vec<u8> = Vec::new();
    let mut inserts: Vec<(usize, &'static str)> = Vec::new();
    let mut in_string = false;
    let mut escape = false;
    let mut string_start = 0;
    let mut i = 0;
    while i < bytes.len() {
        let ch = bytes[i];
        if in_string {
            if escape {
                escape = false;
            } else if ch == b'\\' {
                escape = true;
            } else if ch == b'"' {
                in_string = false;
                if stack.last() == Some(&b'[') && followed_by_colon(bytes, i + 1) {
                    let mut p = string_start;
                    while p > 0 && bytes[p - 1].is_ascii_whitespace() {
                        p -= 1;
                    }
                    if p > 0 && bytes[p - 1] == b',' {
                        // the comma belonged to the array; close before it
                        inserts.push((p - 1, "]"));
                    } else {
                        inserts.push((string_start, "],"));
                    }
                    stack.pop();
                }
            }
            i += 1;
            continue;
        }
        match ch {
            b'"' => {
                in_string = true;
                escape = false;
                string_start = i;
            }
            b'{' | b'[' => stack.push(ch),
            b'}' | b']' => {
                stack.pop();
            }
            _ => {}
        }
        i += 1;
    }
    if inserts.is_empty() {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + inserts.len() * 2);
    let mut prev = 0;
    for (pos, ins) in inserts {
        out.push_str(&text[prev..pos]);
        out.push_str(ins);
        prev = pos;
    }
    out.push_str(&text[prev..]);
    out
}

fn followed_by_colon(bytes: &[u8], mut i: usize) -> bool {
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    i < bytes.len() && bytes[i] == b':'
}

/// Appends the braces a truncated nested object never closed. Only fires
/// when the text ends outside any string and the sole imbalance is in
/// braces; array imbalance is the previous pass's concern and anything
/// messier is left for the lenient decoder.
pub fn close_truncated_objects(text: &str) -> String {
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
    if in_string || stack.is_empty() || stack.iter().any(|&b| b == b'[') {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + stack.len());
    out.push_str(text);
    for _ in 0..stack.len() {
        out.push('}');
    }
    out
}
