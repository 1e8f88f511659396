//! Account normalization, keyword-input parsing, and the text normalization pipeline
//! `FilterEngine` runs entries through before keyword matching.

use crate::error::NormalizeError;
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::UnicodeNormalization;

/// Trim, strip trailing slashes, collapse a URL down to its last path segment, drop a
/// leading `@`. Mirrors the account-binding identity used everywhere else in the store.
pub fn normalize_account(raw: &str) -> Result<String, NormalizeError> {
    let mut candidate = raw.trim();
    while candidate.ends_with('/') {
        candidate = &candidate[..candidate.len() - 1];
    }
    if candidate.starts_with("http://") || candidate.starts_with("https://") {
        candidate = candidate.rsplit('/').next().unwrap_or("");
    }
    let candidate = candidate.strip_prefix('@').unwrap_or(candidate);
    if candidate.is_empty() {
        return Err(NormalizeError::EmptyAccount);
    }
    Ok(candidate.to_string())
}

/// NFKC-normalize, case-fold, and outer-trim a single piece of keyword text.
pub fn normalize_keyword_text(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let composed: String = value.nfkc().collect();
    composed.to_lowercase().trim().to_string()
}

/// Normalize a whole slice of keywords, dropping pieces that normalize to empty.
pub fn normalize_keywords<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    values
        .into_iter()
        .map(|v| normalize_keyword_text(v.as_ref()))
        .filter(|v| !v.is_empty())
        .collect()
}

static KEYWORD_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[,\n]+").unwrap());

/// Split a user-supplied string on runs of `[,\n]+`, normalize each piece, drop empties,
/// preserve order: `parse_keyword_input("A, b\nC") == ["a", "b", "c"]`.
pub fn parse_keyword_input(value: &str) -> Vec<String> {
    if value.is_empty() {
        return Vec::new();
    }
    normalize_keywords(KEYWORD_SPLIT_RE.split(value))
}

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]+>").unwrap());

/// Decode HTML entities and remove tags entirely, used to build `Entry.text` from markup.
pub fn strip_html(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    let decoded = html_escape::decode_html_entities(value);
    TAG_RE.replace_all(&decoded, "").trim().to_string()
}

/// Replace tag spans with a single space (not removed) so word boundaries survive —
/// used only to build the keyword-matching corpus from `Entry.raw_text`, never for display.
pub fn strip_markup(value: &str) -> String {
    if value.is_empty() {
        return String::new();
    }
    TAG_RE.replace_all(value, " ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_account_handles_url() {
        assert_eq!(normalize_account("https://x.com/FooBar/").unwrap(), "FooBar");
        assert_eq!(normalize_account("@foo").unwrap(), "foo");
        assert_eq!(normalize_account("  foo  ").unwrap(), "foo");
        assert!(normalize_account("   ").is_err());
        assert!(normalize_account("@").is_err());
    }

    #[test]
    fn parse_keyword_input_round_trips() {
        assert_eq!(
            parse_keyword_input("A, b\nC"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn normalize_keyword_text_is_idempotent() {
        let once = normalize_keyword_text("  Ａｂｃ  ");
        let twice = normalize_keyword_text(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn strip_markup_preserves_word_boundaries() {
        assert_eq!(strip_markup("a<br/>b"), "a b");
    }

    #[test]
    fn strip_html_decodes_and_removes_tags() {
        assert_eq!(strip_html("<p>a &amp; b</p>"), "a & b");
    }
}
