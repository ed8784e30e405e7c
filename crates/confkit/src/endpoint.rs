//! Endpoint normalization.
//!
//! The configured site address may be given as `https://acme.atlassian.net`,
//! `https://acme.atlassian.net/wiki` or even `.../wiki/rest/api`, and callers
//! may address resources as `/rest/api/space`, `/wiki/rest/api/space` or plain
//! `space`. Everything is reduced to `<site>/wiki` + `/rest/api/<resource>`.
//!
//! All functions here are pure and total: malformed input still produces a
//! best-effort URL, the HTTP status tells the caller if it was wrong.

/// Product path segment on Confluence Cloud.
pub const PRODUCT_SEGMENT: &str = "/wiki";

/// REST API area below the product segment.
pub const API_SEGMENT: &str = "/rest/api";

/// API root for a configured site address: exactly one trailing `/wiki`.
#[must_use]
pub fn api_root(base: &str) -> String {
    let mut root = base.trim().trim_end_matches('/');
    while let Some(stripped) = root.strip_suffix(API_SEGMENT) {
        root = stripped.trim_end_matches('/');
    }
    if root.ends_with(PRODUCT_SEGMENT) {
        root.to_string()
    } else {
        format!("{root}{PRODUCT_SEGMENT}")
    }
}

/// Canonical `/rest/api/<resource>` form of a caller path.
///
/// Any query string is carried over untouched.
#[must_use]
pub fn normalize_path(path: &str) -> String {
    let (path, query) = match path.trim().split_once('?') {
        Some((p, q)) => (p, Some(q)),
        None => (path.trim(), None),
    };

    let path = strip_origin(path);

    // Rebuild from non-empty segments: collapses `//` and trailing `/`.
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let mut rest: &[&str] = &segments;
    // `wiki` is a prefix only ahead of `rest/api`; after it, it names a resource.
    while let ["wiki", tail @ ..] = rest {
        rest = tail;
    }
    while let ["rest", "api", tail @ ..] = rest {
        rest = tail;
    }

    let mut canonical = String::from(API_SEGMENT);
    for segment in rest {
        canonical.push('/');
        canonical.push_str(segment);
    }
    if let Some(q) = query.filter(|q| !q.is_empty()) {
        canonical.push('?');
        canonical.push_str(q);
    }
    canonical
}

/// Absolute URL for `path` against the configured site address.
#[must_use]
pub fn resolve(base: &str, path: &str) -> String {
    format!("{}{}", api_root(base), normalize_path(path))
}

/// Drop `scheme://host` from absolute URLs.
fn strip_origin(path: &str) -> &str {
    let Some((_, after_scheme)) = path.split_once("://") else {
        return path;
    };
    match after_scheme.find('/') {
        Some(idx) => &after_scheme[idx..],
        None => "",
    }
}
