//! Extraction of `MEDIA:` references from assistant text.
//!
//! Agents attach files or images to a reply by emitting a line such as
//! `MEDIA: https://example.com/chart.png`. Those lines are removed from the
//! text delivered to humans and the references are returned separately.

use std::sync::LazyLock;

use regex::Regex;

/// Line marker introducing media references.
const MEDIA_MARKER: &str = "MEDIA:";

/// Accepted reference forms: web URLs, file URLs, absolute and relative paths.
static MEDIA_REFERENCE: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:https?://\S+|file://\S+|/\S+|\./\S+)$").ok());

/// Text with media lines removed, plus the references they carried.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaSplit {
    /// Remaining text, trimmed.
    pub text: String,
    /// References in order of appearance.
    pub media_urls: Vec<String>,
}

/// Split media references out of `text`.
///
/// A `MEDIA:` line with no valid reference is left in the text unchanged.
#[must_use]
pub fn extract_media(text: &str) -> MediaSplit {
    if !text.contains(MEDIA_MARKER) {
        return MediaSplit {
            text: text.trim().to_owned(),
            media_urls: Vec::new(),
        };
    }

    let mut kept: Vec<&str> = Vec::new();
    let mut media_urls = Vec::new();

    for line in text.lines() {
        let Some(rest) = line.trim_start().strip_prefix(MEDIA_MARKER) else {
            kept.push(line);
            continue;
        };

        let found: Vec<String> = rest
            .split_whitespace()
            .map(clean_token)
            .filter(|token| is_media_reference(token))
            .map(str::to_owned)
            .collect();

        if found.is_empty() {
            kept.push(line);
        } else {
            media_urls.extend(found);
        }
    }

    MediaSplit {
        text: kept.join("\n").trim().to_owned(),
        media_urls,
    }
}

fn clean_token(token: &str) -> &str {
    token
        .trim_end_matches(',')
        .trim_matches(|c| matches!(c, '`' | '"' | '\'' | '<' | '>'))
}

fn is_media_reference(token: &str) -> bool {
    MEDIA_REFERENCE
        .as_ref()
        .is_some_and(|pattern| pattern.is_match(token))
}
