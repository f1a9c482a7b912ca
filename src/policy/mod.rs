//! Domain allow-list policy.
//!
//! The watch surface only auto-submits links found on pages whose host is
//! allow-listed. Matching is deliberately generous within a site: an entry
//! covers its exact host, any dot-suffixed subdomain, and any host sharing
//! the same base domain (last two labels). Spoof hosts that merely embed an
//! entry as a prefix never match.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

/// Seed entries used when nothing is persisted and on `domains reset`.
pub const DEFAULT_ALLOW_LIST: [&str; 5] = [
    "thepiratebay.org",
    "1337x.to",
    "rarbg.to",
    "nyaa.si",
    "eztv.re",
];

/// Maximum length of a normalized hostname.
const MAX_DOMAIN_LEN: usize = 253;

/// Hostname charset after normalization.
#[allow(clippy::expect_used)]
static HOST_CHARSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9.-]+$").expect("host charset regex is valid") // Static pattern, safe to panic
});

/// Normalizes raw user or page input down to a bare hostname.
///
/// Lower-cases, strips an `http(s)://` scheme and a leading `www.`, and cuts
/// at the first path, port, query, or fragment delimiter. Returns `None` for
/// empty input, hosts outside `[a-z0-9.-]`, hosts over 253 chars, and
/// dot-less values other than `localhost` / `local`.
#[must_use]
pub fn normalize(input: &str) -> Option<String> {
    let mut host = input.trim().to_ascii_lowercase();

    if let Some(rest) = host.strip_prefix("https://").or_else(|| host.strip_prefix("http://")) {
        host = rest.to_string();
    }
    if let Some(rest) = host.strip_prefix("www.") {
        host = rest.to_string();
    }

    // Cut at the first delimiter that ends the host part
    if let Some(idx) = host.find(['/', ':', '?', '#']) {
        host.truncate(idx);
    }

    if host.is_empty() || host.len() > MAX_DOMAIN_LEN {
        return None;
    }
    if !HOST_CHARSET.is_match(&host) {
        return None;
    }
    if !host.contains('.') && host != "localhost" && host != "local" {
        return None;
    }

    Some(host)
}

/// Validates the label structure of an already-normalized domain.
///
/// Labels must be 1-63 chars, with no leading or trailing dot and no
/// consecutive dots.
#[must_use]
pub fn is_valid_format(domain: &str) -> bool {
    if domain.is_empty() || domain.contains('@') {
        return false;
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return false;
    }
    domain.split('.').all(|label| !label.is_empty() && label.len() <= 63)
}

/// The last two labels of a host, or the host itself when it has fewer.
///
/// `tracker.example.org` and `example.org` share the base `example.org`.
#[must_use]
pub fn base_domain(host: &str) -> String {
    let labels: Vec<&str> = host.split('.').collect();
    if labels.len() <= 2 {
        host.to_string()
    } else {
        labels[labels.len() - 2..].join(".")
    }
}

/// Splits a bulk paste into normalized, validated, deduplicated domains.
///
/// Accepts newline, comma, semicolon, pipe, or whitespace separators.
/// Invalid entries are dropped silently; order is first-seen.
#[must_use]
pub fn parse_bulk(text: &str) -> Vec<String> {
    let mut domains: Vec<String> = Vec::new();

    for piece in text.split(['\n', ',', ';', '|', ' ', '\t', '\r']) {
        let Some(host) = normalize(piece) else {
            continue;
        };
        if !is_valid_format(&host) {
            continue;
        }
        if !domains.contains(&host) {
            domains.push(host);
        }
    }

    domains
}

/// The set of hosts whose pages are eligible for automatic submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllowList {
    entries: Vec<String>,
}

impl AllowList {
    /// Builds a list from already-trusted entries, dropping invalid ones.
    #[must_use]
    pub fn new(entries: Vec<String>) -> Self {
        let mut list = Self { entries: Vec::new() };
        for entry in entries {
            if let Some(host) = normalize(&entry) {
                if is_valid_format(&host) && !list.entries.contains(&host) {
                    list.entries.push(host);
                }
            }
        }
        list
    }

    /// The seed list shipped with the tool.
    #[must_use]
    pub fn default_seed() -> Self {
        Self::new(DEFAULT_ALLOW_LIST.iter().map(ToString::to_string).collect())
    }

    /// Current entries, in insertion order.
    #[must_use]
    pub fn domains(&self) -> &[String] {
        &self.entries
    }

    /// Checks whether a page host is covered by the list.
    ///
    /// A host matches an entry when it equals the entry, ends with
    /// `.entry`, or shares the entry's base domain. The raw host is
    /// normalized first; un-normalizable hosts never match.
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        let Some(host) = normalize(host) else {
            return false;
        };
        let host_base = base_domain(&host);

        self.entries.iter().any(|entry| {
            host == *entry
                || host.ends_with(&format!(".{entry}"))
                || host_base == base_domain(entry)
        })
    }

    /// Replaces the entries with a normalized, validated, deduplicated
    /// subset of `domains`.
    ///
    /// Returns `false` and leaves the list unchanged when the validated
    /// result would be empty; the list never becomes empty through update.
    pub fn update(&mut self, domains: &[String]) -> bool {
        let mut validated: Vec<String> = Vec::new();
        for raw in domains {
            let Some(host) = normalize(raw) else {
                warn!(entry = %raw, "dropping un-normalizable allow-list entry");
                continue;
            };
            if !is_valid_format(&host) {
                warn!(entry = %raw, "dropping malformed allow-list entry");
                continue;
            }
            if !validated.contains(&host) {
                validated.push(host);
            }
        }

        if validated.is_empty() {
            warn!("allow-list update rejected: no valid entries");
            return false;
        }

        debug!(count = validated.len(), "allow-list updated");
        self.entries = validated;
        true
    }
}

impl Default for AllowList {
    fn default() -> Self {
        Self::default_seed()
    }
}
