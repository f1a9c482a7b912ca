//! Magnet URI and URL-candidate extraction from raw text.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, trace};
use url::Url;

use super::MagnetLink;

/// Magnet URIs embedded in URLs or free text: the grammar prefix followed by
/// anything up to whitespace or a quote.
#[allow(clippy::expect_used)]
static MAGNET_IN_TEXT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)magnet:\?xt=urn:btih:[a-z0-9]{32,40}[^\s"]*"#)
        .expect("magnet text regex is valid") // Static pattern, safe to panic
});

/// Magnet URIs in raw HTML source; the tail additionally stops at angle
/// brackets so matches do not run into adjacent markup.
#[allow(clippy::expect_used)]
static MAGNET_IN_HTML: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)magnet:\?xt=urn:btih:[a-z0-9]{32,40}[^\s"<>]*"#)
        .expect("magnet html regex is valid") // Static pattern, safe to panic
});

/// Best-effort URL recognition in free text: anything with an explicit
/// http(s) scheme, or a bare dotted hostname with optional port and path.
#[allow(clippy::expect_used)]
static URL_CANDIDATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://[^\s<>"']+|(?:[a-z0-9](?:[a-z0-9-]*[a-z0-9])?\.)+[a-z]{2,}(?::\d{1,5})?(?:/[^\s<>"']*)?)"#)
        .expect("url candidate regex is valid") // Static pattern, safe to panic
});

/// Scans a single URL string for an embedded magnet URI.
///
/// Returns the first case-insensitive match, or `None`. Useful for link
/// targets that wrap a magnet in a redirect-style URL.
#[must_use]
pub fn from_url(candidate_url: &str) -> Option<MagnetLink> {
    MAGNET_IN_TEXT
        .find(candidate_url)
        .and_then(|m| MagnetLink::parse(m.as_str()))
}

/// Scans free text for all magnet URIs.
///
/// Matches are filtered to grammar-valid links, deduplicated by exact
/// string, and returned in first-seen order. Pure function of the input.
#[tracing::instrument(skip(text), fields(text_len = text.len()))]
#[must_use]
pub fn all_from_text(text: &str) -> Vec<MagnetLink> {
    collect_magnets(&MAGNET_IN_TEXT, text)
}

/// Scans raw HTML source for all magnet URIs.
///
/// Text-level matching only, no DOM parsing. Callers are responsible for
/// bounding the document size before invocation (see the page fetcher).
#[tracing::instrument(skip(html), fields(html_len = html.len()))]
#[must_use]
pub fn all_from_html(html: &str) -> Vec<MagnetLink> {
    collect_magnets(&MAGNET_IN_HTML, html)
}

fn collect_magnets(pattern: &Regex, input: &str) -> Vec<MagnetLink> {
    let mut seen: Vec<MagnetLink> = Vec::new();

    for m in pattern.find_iter(input) {
        trace!(candidate = m.as_str(), "found magnet candidate");
        let Some(link) = MagnetLink::parse(m.as_str()) else {
            continue;
        };
        if seen.iter().any(|existing| existing == &link) {
            continue;
        }
        debug!(link = %link, "magnet link extracted");
        seen.push(link);
    }

    seen
}

/// Recognizes URL candidates in free text.
///
/// Bare domains are accepted and normalized by prepending `https://`; each
/// candidate is then validated as a well-formed HTTP(S) URL. Malformed
/// candidates are silently dropped. Order is first-seen, deduplicated.
#[tracing::instrument(skip(text), fields(text_len = text.len()))]
#[must_use]
pub fn url_candidates(text: &str) -> Vec<Url> {
    let mut results: Vec<Url> = Vec::new();

    for m in URL_CANDIDATE.find_iter(text) {
        let raw = m.as_str();
        let normalized = if raw.to_ascii_lowercase().starts_with("http://")
            || raw.to_ascii_lowercase().starts_with("https://")
        {
            raw.to_string()
        } else {
            format!("https://{raw}")
        };

        match Url::parse(&normalized) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.host().is_some() => {
                if !results.iter().any(|existing| existing == &url) {
                    debug!(url = %url, "URL candidate accepted");
                    results.push(url);
                }
            }
            Ok(_) | Err(_) => {
                trace!(candidate = raw, "URL candidate dropped");
            }
        }
    }

    results
}
