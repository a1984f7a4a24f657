//! Link normalization helpers.

use once_cell::sync::Lazy;
use regex::Regex;

static SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^[a-z][a-z0-9+.\-]*://").expect("scheme pattern compiles"));

/// Whether `url` starts with `scheme://`.
pub fn has_scheme(url: &str) -> bool {
    SCHEME.is_match(url.trim())
}

/// Turns user input into an absolute link.
///
/// Empty input stays empty, a present scheme is kept, protocol-relative
/// `//host` becomes `https://host` and anything else gets `https://`.
///
/// # Example
///
/// ```
/// use linkapp_core::url::normalize_url;
///
/// assert_eq!(normalize_url(" example.com "), "https://example.com");
/// assert_eq!(normalize_url("ftp://files"), "ftp://files");
/// ```
pub fn normalize_url(url: &str) -> String {
    let s = url.trim();
    if s.is_empty() || has_scheme(s) {
        return s.to_string();
    }
    if let Some(rest) = s.strip_prefix("//") {
        return format!("https://{rest}");
    }
    format!("https://{s}")
}

/// Only `http` and `https` links may be opened.
pub fn is_safe_link_url(url: &str) -> bool {
    let normalized = normalize_url(url);
    let Some((scheme, rest)) = normalized.split_once("://") else {
        return false;
    };
    matches!(scheme.to_ascii_lowercase().as_str(), "http" | "https") && !rest.is_empty()
}

/// Host part of an absolute link (no userinfo, no port).
pub fn host_of(url: &str) -> Option<&str> {
    let (_, rest) = url.split_once("://")?;
    let authority = rest.split(['/', '?', '#']).next()?;
    let host = authority.rsplit('@').next()?;
    let host = match host.strip_prefix('[') {
        Some(v6) => v6.split(']').next()?,
        None => host.split(':').next()?,
    };
    (!host.is_empty()).then_some(host)
}
