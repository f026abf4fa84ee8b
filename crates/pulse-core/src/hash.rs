//! Deterministic id/content-hash derivation for [`crate::types::Item`].

use sha2::{Digest, Sha256};

/// Characters trimmed from a URL for canonicalization: trailing slash and
/// a fragment, if present. Scheme/host are lowercased; path/query untouched.
pub fn canonicalize_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let trimmed = without_fragment.trim_end_matches('/');

    if let Some(idx) = trimmed.find("://") {
        let (scheme, rest) = trimmed.split_at(idx);
        let rest = &rest[3..];
        if let Some(slash) = rest.find('/') {
            let (host, path) = rest.split_at(slash);
            format!("{}://{}{}", scheme.to_lowercase(), host.to_lowercase(), path)
        } else {
            format!("{}://{}", scheme.to_lowercase(), rest.to_lowercase())
        }
    } else {
        trimmed.to_string()
    }
}

/// Normalize body text for soft-dedup hashing: collapse runs of whitespace
/// to a single space and lowercase.
pub fn normalize_body(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut last_was_space = false;
    for c in body.chars() {
        if c.is_whitespace() {
            if !last_was_space {
                out.push(' ');
                last_was_space = true;
            }
        } else {
            out.push(c);
            last_was_space = false;
        }
    }
    out.trim().to_lowercase()
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}

/// Item id = hash(canonicalized URL ∥ title-prefix). Capping how much of
/// the title participates means a long title edited only past the cap
/// doesn't change the id.
pub fn item_id(url: &str, title: &str) -> String {
    const TITLE_PREFIX_LEN: usize = 80;
    let canon = canonicalize_url(url);
    let prefix: String = title.chars().take(TITLE_PREFIX_LEN).collect();
    sha256_hex(&format!("{canon}\u{1}{prefix}"))
}

/// Content hash over normalized body.
pub fn content_hash(body: &str) -> String {
    sha256_hex(&normalize_body(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalize_strips_fragment_and_trailing_slash() {
        assert_eq!(
            canonicalize_url("HTTPS://Example.COM/a/b/#frag"),
            "https://example.com/a/b"
        );
    }

    #[test]
    fn canonicalize_idempotent_on_bare_host() {
        assert_eq!(canonicalize_url("https://example.com"), "https://example.com");
    }

    #[test]
    fn normalize_body_collapses_whitespace_and_lowercases() {
        assert_eq!(normalize_body("  Hello\n\tWorld  "), "hello world");
    }

    #[test]
    fn item_id_stable_across_trailing_slash() {
        let a = item_id("https://example.com/x/", "Title");
        let b = item_id("https://example.com/x", "Title");
        assert_eq!(a, b);
    }

    #[test]
    fn item_id_differs_on_title() {
        let a = item_id("https://example.com/x", "Title One");
        let b = item_id("https://example.com/x", "Title Two");
        assert_ne!(a, b);
    }

    #[test]
    fn content_hash_stable_across_whitespace_variants() {
        let a = content_hash("Bitcoin   rallies\ntoday");
        let b = content_hash("bitcoin rallies today");
        assert_eq!(a, b);
    }
}
