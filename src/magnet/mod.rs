//! Magnet URI types, extraction, and canonicalization.
//!
//! Detection is regex/grammar-based rather than a full URI parser: source
//! pages are untrusted and arbitrarily malformed, and the only parameter
//! that matters is the `xt` info-hash. The grammar recognizes that one
//! parameter and tolerates trailing garbage.
//!
//! # Overview
//!
//! - [`MagnetLink`] - a grammar-valid magnet URI string
//! - [`InfoHash`] - the lower-cased content hash from the `xt` parameter
//! - [`extract`] - finding magnet URIs and URL candidates in raw text
//! - [`canonical`] - stripping tracking parameters down to a canonical URI

pub mod canonical;
pub mod extract;

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

/// Anchored grammar for a valid magnet URI: `magnet:?xt=urn:btih:<32-40
/// alphanumeric chars>` with unconstrained trailing parameters.
#[allow(clippy::expect_used)]
static VALID_MAGNET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^magnet:\?xt=urn:btih:[a-z0-9]{32,40}").expect("magnet regex is valid")
    // Static pattern, safe to panic
});

/// Capture for the info-hash inside a magnet URI's `xt` parameter.
#[allow(clippy::expect_used)]
static HASH_CAPTURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)xt=urn:btih:([a-z0-9]+)").expect("hash regex is valid") // Static pattern, safe to panic
});

/// Returns true iff the candidate matches the magnet URI grammar.
///
/// The check is anchored at the start; anything after the info-hash
/// (display name, trackers, tracking junk) is unconstrained.
#[must_use]
pub fn is_valid(candidate: &str) -> bool {
    VALID_MAGNET.is_match(candidate)
}

/// A magnet URI that passed the grammar check. Immutable once extracted.
///
/// Two differently-decorated links may share the same [`InfoHash`]; equality
/// here is exact-string, dedup by content happens at the hash level.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MagnetLink(String);

impl MagnetLink {
    /// Parses a candidate string, returning `None` when it does not match
    /// the magnet URI grammar.
    #[must_use]
    pub fn parse(candidate: &str) -> Option<Self> {
        if is_valid(candidate) {
            Some(Self(candidate.to_string()))
        } else {
            None
        }
    }

    /// Returns the URI as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Computes the content hash of this link.
    ///
    /// Always succeeds for links built through [`MagnetLink::parse`] since
    /// the grammar requires the `xt` parameter.
    #[must_use]
    pub fn info_hash(&self) -> Option<InfoHash> {
        InfoHash::from_uri(&self.0)
    }
}

impl fmt::Display for MagnetLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The canonical identifier of a transfer's content, extracted from a magnet
/// URI's `xt` parameter and stored lower-cased.
///
/// Acts as the primary dedup key: two magnet URIs with the same hash are the
/// same logical transfer regardless of tracker or display-name decoration.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct InfoHash(String);

impl InfoHash {
    /// Pulls the `xt=urn:btih:(...)` capture out of any magnet URI string,
    /// lower-cased; `None` when the parameter is absent.
    #[must_use]
    pub fn from_uri(uri: &str) -> Option<Self> {
        HASH_CAPTURE
            .captures(uri)
            .and_then(|caps| caps.get(1))
            .map(|m| Self(m.as_str().to_ascii_lowercase()))
    }

    /// Returns the hash as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InfoHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
