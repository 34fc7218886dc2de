//! User-pattern matching
//!
//! A pattern is a plain string in one of five shapes: `*` (match-all),
//! `localhost`, a path/filename fragment ending in `.html`/`.htm`, a
//! wildcard-suffix domain (`*.example.com`), or a bare domain
//! (`example.com`). Patterns come from user input and may be malformed;
//! an unrecognizable pattern simply never matches. This function is total:
//! it never panics and has no side effects.

use crate::url::{extract_host, extract_path};

/// Check whether `url` matches `pattern`.
///
/// Rules are tried in priority order, first match wins:
/// 1. `*` matches everything.
/// 2. `localhost` matches only the hosts `localhost` and `127.0.0.1`.
/// 3. `.html`/`.htm` patterns match as substrings of the path or the full
///    URL (the latter catches file segments that ended up in a query
///    string).
/// 4. `*.domain` matches `domain` itself or any host with `domain` as a
///    suffix. The suffix check intentionally does NOT require a dot
///    boundary, so `*.example.com` also matches `evilexample.com`. This
///    over-match is pinned by test; see `wildcard_suffix_overmatch`.
/// 5. A bare domain matches the exact host, `www.` + domain, or any
///    subdomain (`.` + domain suffix).
///
/// Host comparison is case-insensitive. A URL with no extractable host can
/// only match rules 1 and 3.
pub fn matches(url: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return false;
    }

    if pattern == "*" {
        return true;
    }

    let host = extract_host(url).map(|h| h.to_ascii_lowercase());

    if pattern == "localhost" {
        return matches!(host.as_deref(), Some("localhost") | Some("127.0.0.1"));
    }

    if pattern.ends_with(".html") || pattern.ends_with(".htm") {
        return extract_path(url).contains(pattern) || url.contains(pattern);
    }

    let host = match host {
        Some(host) => host,
        None => return false,
    };
    let pattern = pattern.to_ascii_lowercase();

    if let Some(domain) = pattern.strip_prefix("*.") {
        return host == domain || host.ends_with(domain);
    }

    host == pattern
        || is_prefixed_match(&host, "www.", &pattern)
        || is_subdomain_of(&host, &pattern)
}

/// `host == prefix + domain`, without allocating.
#[inline]
fn is_prefixed_match(host: &str, prefix: &str, domain: &str) -> bool {
    host.len() == prefix.len() + domain.len()
        && host.starts_with(prefix)
        && host.ends_with(domain)
}

/// `host` ends with `"." + domain`, without allocating.
#[inline]
fn is_subdomain_of(host: &str, domain: &str) -> bool {
    host.len() > domain.len()
        && host.ends_with(domain)
        && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn match_all() {
        assert!(matches("https://anything.example", "*"));
        assert!(matches("garbage", "*"));
    }

    #[test]
    fn localhost_pattern() {
        assert!(matches("http://localhost:3000/app", "localhost"));
        assert!(matches("http://127.0.0.1/app", "localhost"));
        assert!(!matches("https://localhost.evil.com/", "localhost"));
        assert!(!matches("https://example.com/", "localhost"));
    }

    #[test]
    fn html_fragment_in_path() {
        assert!(matches("https://site.org/a/quiz.html?x=1", "quiz.html"));
        assert!(matches("https://site.org/lessons/intro.htm", "intro.htm"));
        assert!(!matches("https://site.org/a/other.html", "quiz.html"));
    }

    #[test]
    fn html_fragment_in_query() {
        // The file segment appears only in the query string; the full-URL
        // substring check still picks it up.
        assert!(matches("https://site.org/view?page=quiz.html", "quiz.html"));
    }

    #[test]
    fn exact_domain() {
        assert!(matches("https://example.com/path", "example.com"));
        assert!(matches("https://www.example.com/", "example.com"));
        assert!(matches("https://deep.sub.example.com/", "example.com"));
        assert!(!matches("https://notexample.com", "example.com"));
    }

    #[test]
    fn wildcard_suffix() {
        assert!(matches("https://sub.example.com", "*.example.com"));
        // Suffix-equal case: the bare domain itself matches.
        assert!(matches("https://example.com", "*.example.com"));
    }

    #[test]
    fn wildcard_suffix_overmatch() {
        // Pinned behavior: no dot boundary is required before the suffix,
        // so an unrelated host that merely ends with the domain matches.
        assert!(matches("https://evilexample.com", "*.example.com"));
    }

    #[test]
    fn case_insensitive_host() {
        assert!(matches("https://EXAMPLE.com/path", "example.com"));
        assert!(matches("https://sub.Example.COM", "*.Example.com"));
    }

    #[test]
    fn never_panics_on_garbage() {
        for url in ["", "not a url", "https://", "::::", "ht!tp://a b c/%%"] {
            for pattern in ["", "*", "localhost", "quiz.html", "*.x.com", "x.com", "\u{0}"] {
                // Result is irrelevant here, only totality.
                let _ = matches(url, pattern);
            }
        }
    }

    #[test]
    fn malformed_pattern_never_matches() {
        assert!(!matches("https://example.com", ""));
        assert!(!matches("https://example.com", "   "));
        assert!(!matches("https://example.com", "%%%"));
    }
}
