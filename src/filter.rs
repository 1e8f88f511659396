//! Pure predicate deciding whether a fetched `Entry` is eligible for delivery under a
//! `Subscription`'s repost/quote/keyword flags. No I/O, no store access — deterministic.

use crate::model::{Entry, Subscription};
use crate::normalize::{normalize_keyword_text, strip_markup};

const REPOST_MARKER_JA: &str = "リツイート";

fn is_repost(text: &str) -> bool {
    text.lines().any(|line| {
        let folded = line.trim_start().to_lowercase();
        if folded.is_empty() {
            return false;
        }
        if folded.starts_with(REPOST_MARKER_JA) {
            return true;
        }
        let Some(rest) = folded.strip_prefix("rt") else {
            return false;
        };
        match rest.chars().next() {
            None => true,
            Some(c) => !c.is_alphanumeric(),
        }
    })
}

fn is_quote(text: &str, raw_text: &str) -> bool {
    let folded = text.to_lowercase();
    if folded.contains("quote tweet") || text.contains("引用") || folded.contains("quoted tweet") {
        return true;
    }
    raw_text.to_lowercase().contains("rsshub-quote")
}

/// Concatenation of `normalize(entry.text)` and `normalize(strip_markup(entry.raw_text))`,
/// single-space joined — the corpus keyword membership is tested against.
fn normalized_corpus(entry: &Entry) -> String {
    let text_part = normalize_keyword_text(&entry.text);
    let raw_part = normalize_keyword_text(&strip_markup(&entry.raw_text));
    format!("{text_part} {raw_part}")
}

/// Ordered predicates; the first failing predicate decides the outcome.
pub fn should_include(entry: &Entry, sub: &Subscription) -> bool {
    if !sub.include_reposts && is_repost(&entry.text) {
        return false;
    }
    if !sub.include_quotes && is_quote(&entry.text, &entry.raw_text) {
        return false;
    }

    let corpus = normalized_corpus(entry);

    if sub
        .exclude_keywords
        .iter()
        .any(|kw| corpus.contains(kw.as_str()))
    {
        return false;
    }

    if !sub.include_keywords.is_empty()
        && !sub
            .include_keywords
            .iter()
            .any(|kw| corpus.contains(kw.as_str()))
    {
        return false;
    }

    true
}
