//! Text normalization and the pre-LLM quality gate.
//!
//! Pure, synchronous string processing — free functions rather than a
//! struct, since there is no configuration or state to own.

const DISQUALIFYING_TOKENS: &[&str] = &["TS", "CAM", "TELECINE", "HDCAM", "CAMRIP", "HDTS"];

/// Lowercase; replace `_`/`-` with spaces; drop all non-alphanumeric,
/// non-whitespace characters; collapse whitespace. The canonical form used
/// everywhere downstream.
pub fn normalize(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        if ch == '_' || ch == '-' {
            out.push(' ');
        } else if ch.is_alphanumeric() || ch.is_whitespace() {
            out.extend(ch.to_lowercase());
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Find the first 4-digit token in `[1900, 2099]`, on a word boundary.
/// Digits embedded in a longer numeric run (e.g. `"12021"`) do not count.
pub fn extract_year(s: &str) -> Option<String> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut i = 0;
    while i < len {
        if chars[i].is_ascii_digit() {
            let start = i;
            let mut j = i;
            while j < len && chars[j].is_ascii_digit() {
                j += 1;
            }
            let run_len = j - start;
            let boundary_before = start == 0 || !chars[start - 1].is_ascii_alphanumeric();
            let boundary_after = j == len || !chars[j].is_ascii_alphanumeric();
            if run_len == 4 && boundary_before && boundary_after {
                let token: String = chars[start..j].iter().collect();
                if let Ok(year) = token.parse::<u32>() {
                    if (1900..=2099).contains(&year) {
                        return Some(token);
                    }
                }
            }
            i = j;
        } else {
            i += 1;
        }
    }
    None
}

/// Remove all year tokens matched by [`extract_year`] and the whitespace
/// immediately surrounding them, collapsing the result.
pub fn remove_year(s: &str) -> String {
    let mut result = s.to_string();
    while let Some(year) = extract_year(&result) {
        if let Some(pos) = find_word_boundary_token(&result, &year) {
            let (before, after) = (&result[..pos.0], &result[pos.1..]);
            result = format!("{before} {after}");
        } else {
            break;
        }
    }
    result.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn find_word_boundary_token(s: &str, token: &str) -> Option<(usize, usize)> {
    let bytes = s.as_bytes();
    let tlen = token.len();
    let mut start = 0;
    while let Some(rel) = s[start..].find(token) {
        let idx = start + rel;
        let before_ok = idx == 0 || !(bytes[idx - 1] as char).is_ascii_alphanumeric();
        let end = idx + tlen;
        let after_ok = end >= bytes.len() || !(bytes[end] as char).is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some((idx, end));
        }
        start = idx + 1;
        if start >= s.len() {
            break;
        }
    }
    None
}

/// True if `title` should be rejected before any LLM call.
pub fn disqualify(title: &str) -> bool {
    if title.to_lowercase().contains("soundtrack") {
        return true;
    }
    if title.contains("Telesync") {
        return true;
    }
    for word in title.split_whitespace() {
        for sub_token in word.split(['.', '-', '_']) {
            let upper = sub_token.to_ascii_uppercase();
            if DISQUALIFYING_TOKENS.contains(&upper.as_str()) {
                return true;
            }
        }
    }
    false
}

/// Contiguous-phrase pre-filter run ahead of the expensive entity-extraction
/// call: both strings are normalized with `.`, `-`, `_` additionally
/// collapsed to spaces (`normalize` already does this), then `needle` must
/// appear as a contiguous substring of `haystack`.
pub fn contains_as_phrase(haystack: &str, needle: &str) -> bool {
    let haystack = normalize(haystack);
    let needle = normalize(needle);
    if needle.is_empty() {
        return true;
    }
    haystack.contains(&needle)
}
