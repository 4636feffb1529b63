//! Keyword-based priority classification.
//!
//! Substring containment on lowercased `subject + " " + body`. Any urgent
//! keyword wins over any needs-reply keyword.

use std::ops::Range;

use crate::model::mail::Category;

/// Phrases that make a message urgent.
pub const URGENT_KEYWORDS: &[&str] = &[
    "urgent",
    "asap",
    "immediately",
    "deadline",
    "important",
    "critical",
    "server down",
    "outage",
];

/// Phrases that suggest the sender expects an answer.
pub const NEEDS_REPLY_KEYWORDS: &[&str] = &[
    "question",
    "inquire",
    "could you",
    "can you",
    "please",
    "request",
    "action required",
    "follow up",
];

/// Classify a message from its subject and body.
///
/// Pure and deterministic. Never returns [`Category::Unclassified`].
pub fn classify(subject: &str, body: &str) -> Category {
    let text = format!("{subject} {body}").to_lowercase();

    if count_matches(&text, URGENT_KEYWORDS) >= 1 {
        Category::Urgent
    } else if count_matches(&text, NEEDS_REPLY_KEYWORDS) >= 1 {
        Category::NeedsReply
    } else {
        Category::Informational
    }
}

/// Number of distinct keywords from `keywords` contained in `text`.
fn count_matches(text: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| text.contains(*k)).count()
}

/// The keyword set that produces `category`, if any.
pub fn keywords_for(category: Category) -> &'static [&'static str] {
    match category {
        Category::Urgent => URGENT_KEYWORDS,
        Category::NeedsReply => NEEDS_REPLY_KEYWORDS,
        Category::Informational | Category::Unclassified => &[],
    }
}

/// Byte ranges in `text` of every case-insensitive occurrence of the keywords
/// behind `category`, sorted and non-overlapping (earliest, then longest, wins).
pub fn keyword_matches(category: Category, text: &str) -> Vec<Range<usize>> {
    let keywords = keywords_for(category);
    if keywords.is_empty() {
        return Vec::new();
    }

    // ASCII lowercasing keeps byte offsets aligned with `text`.
    let lower = text.to_ascii_lowercase();
    let mut found: Vec<Range<usize>> = keywords
        .iter()
        .flat_map(|keyword| {
            lower
                .match_indices(keyword)
                .map(|(start, m)| start..start + m.len())
                .collect::<Vec<_>>()
        })
        .collect();
    found.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));

    let mut result: Vec<Range<usize>> = Vec::with_capacity(found.len());
    for range in found {
        if result.last().is_some_and(|last| range.start < last.end) {
            continue;
        }
        result.push(range);
    }
    result
}
