//! Canonical form of a magnet URI.
//!
//! Source pages decorate magnet links with tracking parameters and
//! campaign junk. The canonical form keeps only the parameters that affect
//! the transfer itself, so the remote service sees a stable URI for the
//! same content.

use tracing::trace;

use super::MagnetLink;

/// Parameters that survive canonicalization, in any order of appearance:
/// content hash, display name, trackers, exact length, acceptable source.
const KEPT_PARAMS: [&str; 5] = ["xt", "dn", "tr", "xl", "as"];

/// Rebuilds a magnet URI keeping only transfer-relevant parameters.
///
/// Parameters are kept in their original order of appearance; everything
/// else (analytics tags, campaign markers) is dropped. Returns `None` when
/// the URI lacks the `xt=urn:btih:` content-hash parameter, since a magnet
/// without it identifies nothing.
///
/// Idempotent: canonicalizing a canonical URI returns it unchanged. The
/// info-hash is always preserved because `xt` is always kept.
#[must_use]
pub fn canonicalize(uri: &str) -> Option<MagnetLink> {
    if !uri.to_ascii_lowercase().contains("xt=urn:btih:") {
        return None;
    }

    // Scheme prefix is matched case-insensitively, like the grammar check
    let query = match uri.get(..8) {
        Some(prefix) if prefix.eq_ignore_ascii_case("magnet:?") => &uri[8..],
        _ => uri,
    };

    let kept: Vec<&str> = query
        .split('&')
        .filter(|part| {
            let key = part.split('=').next().unwrap_or("");
            KEPT_PARAMS.contains(&key.to_ascii_lowercase().as_str())
        })
        .collect();

    let canonical = format!("magnet:?{}", kept.join("&"));
    trace!(original = uri, canonical = %canonical, "canonicalized magnet URI");
    MagnetLink::parse(&canonical)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::magnet::InfoHash;

    const HASH: &str = "c12fe1c06bba254a9dc9f519b335aa7c1367a88a";

    // ==================== Parameter Filtering ====================

    #[test]
    fn test_canonicalize_plain_uri_unchanged() {
        let uri = format!("magnet:?xt=urn:btih:{HASH}");
        let link = canonicalize(&uri).unwrap();
        assert_eq!(link.as_str(), uri);
    }

    #[test]
    fn test_canonicalize_keeps_transfer_params() {
        let uri = format!(
            "magnet:?xt=urn:btih:{HASH}&dn=Some.File&tr=udp://tracker.example/announce&xl=12345&as=https://mirror.example/file"
        );
        let link = canonicalize(&uri).unwrap();
        assert_eq!(link.as_str(), uri);
    }

    #[test]
    fn test_canonicalize_drops_tracking_params() {
        let uri = format!(
            "magnet:?xt=urn:btih:{HASH}&utm_source=feed&dn=File&ref=homepage&tr=udp://t.example"
        );
        let link = canonicalize(&uri).unwrap();
        assert_eq!(
            link.as_str(),
            format!("magnet:?xt=urn:btih:{HASH}&dn=File&tr=udp://t.example")
        );
    }

    #[test]
    fn test_canonicalize_preserves_original_order() {
        let uri = format!("magnet:?dn=First&xt=urn:btih:{HASH}&tr=udp://t.example");
        // Canonical keeps appearance order even when dn precedes xt; the
        // result fails the anchored grammar so parse rejects it
        assert!(canonicalize(&uri).is_none());
    }

    #[test]
    fn test_canonicalize_uppercase_scheme() {
        // Any grammar-valid URI must canonicalize, whatever the case
        let upper = format!("MAGNET:?XT=URN:BTIH:{}&DN=File&utm_source=x", HASH.to_ascii_uppercase());
        let link = canonicalize(&upper).unwrap();
        assert!(!link.as_str().contains("utm_source"));
        assert_eq!(link.info_hash().unwrap().as_str(), HASH);
    }

    #[test]
    fn test_canonicalize_keeps_repeated_trackers() {
        let uri = format!("magnet:?xt=urn:btih:{HASH}&tr=udp://a.example&tr=udp://b.example");
        let link = canonicalize(&uri).unwrap();
        assert_eq!(link.as_str().matches("&tr=").count(), 2);
    }

    // ==================== Rejection ====================

    #[test]
    fn test_canonicalize_rejects_missing_hash() {
        assert!(canonicalize("magnet:?dn=name&tr=udp://t.example").is_none());
        assert!(canonicalize("https://example.com").is_none());
        assert!(canonicalize("").is_none());
    }

    // ==================== Properties ====================

    #[test]
    fn test_canonicalize_is_idempotent() {
        let uri = format!("magnet:?xt=urn:btih:{HASH}&dn=File&utm_medium=social&tr=udp://t.example");
        let once = canonicalize(&uri).unwrap();
        let twice = canonicalize(once.as_str()).unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_canonicalize_preserves_info_hash() {
        let uri = format!("magnet:?xt=urn:btih:{HASH}&junk=1&dn=File&utm_source=x");
        let before = InfoHash::from_uri(&uri).unwrap();
        let after = canonicalize(&uri).unwrap().info_hash().unwrap();
        assert_eq!(before, after);
    }
}
