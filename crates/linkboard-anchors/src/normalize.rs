//! Comparison forms for link destinations and anchor text.

use reqwest::Url;

fn has_scheme(url: &Url, input: &str) -> bool {
    if matches!(url.scheme(), "http" | "https" | "ftp" | "ws" | "wss" | "file") {
        return true;
    }
    // `localhost:8080/x` parses with `localhost` as the scheme
    let rest = &input[url.scheme().len() + 1..];
    !rest.starts_with(|c: char| c.is_ascii_digit())
}

fn parse_lenient(input: &str) -> Option<Url> {
    match Url::parse(input) {
        Ok(url) if has_scheme(&url, input) => Some(url),
        // bare `example.com/path` or `host:port/path`
        _ => Url::parse(&format!("https://{input}")).ok(),
    }
}

/// `scheme://host[:port]/path[?query]` with trailing slashes dropped from the
/// path (an empty path stays `/`) and no fragment. Input without a scheme is
/// read as https. Applying it twice gives the same string.
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    if trimmed.is_empty() {
        return String::new();
    }
    let Some(mut parsed) = parse_lenient(trimmed) else {
        return trimmed.to_string();
    };
    parsed.set_fragment(None);
    if parsed.cannot_be_a_base() {
        // mailto:, javascript: and friends
        return parsed.to_string();
    }

    let host = match (parsed.host_str(), parsed.port()) {
        (Some(host), Some(port)) => format!("{host}:{port}"),
        (Some(host), None) => host.to_string(),
        (None, _) => String::new(),
    };
    let path = match parsed.path().trim_end_matches('/') {
        "" => "/",
        path => path,
    };
    match parsed.query() {
        Some(query) if !query.is_empty() => format!("{}://{host}{path}?{query}", parsed.scheme()),
        _ => format!("{}://{host}{path}", parsed.scheme()),
    }
}

/// Whitespace runs (line breaks and non-breaking spaces included) become one space.
pub fn normalize_anchor(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slash_and_fragment_do_not_matter() {
        assert_eq!(
            normalize_url("https://example.com/path/"),
            normalize_url("https://example.com/path")
        );
        assert_eq!(normalize_url("https://example.com/path#intro"), "https://example.com/path");
        assert_eq!(normalize_url("https://example.com"), "https://example.com/");
        assert_eq!(normalize_url("https://example.com///"), "https://example.com/");
    }

    #[test]
    fn query_and_port_are_kept() {
        assert_eq!(
            normalize_url(" http://Example.com:8080/a/?x=1&y=2 "),
            "http://example.com:8080/a?x=1&y=2"
        );
        assert_eq!(normalize_url("https://example.com/a?"), "https://example.com/a");
    }

    #[test]
    fn missing_scheme_defaults_to_https() {
        assert_eq!(normalize_url("example.com/blog/"), "https://example.com/blog");
        assert_eq!(normalize_url("   "), "");
    }

    #[test]
    fn host_with_port_and_no_scheme_defaults_to_https() {
        assert_eq!(normalize_url("localhost:8080/target/"), "https://localhost:8080/target");
        assert_eq!(normalize_url("Example.com:8443"), "https://example.com:8443/");
        assert_eq!(normalize_url("mailto:someone@example.com"), "mailto:someone@example.com");
    }

    #[test]
    fn normalization_is_idempotent() {
        for input in [
            "https://example.com/path/",
            "http://example.com:8080/a/?x=1",
            "example.com",
            "https://пример.рф/статья/",
            "https://example.com/a%20b/",
            "mailto:someone@example.com",
            "file:///tmp/x/",
            "localhost:8080/target/",
        ] {
            let once = normalize_url(input);
            assert_eq!(normalize_url(&once), once, "input {input}");
        }
    }

    #[test]
    fn anchor_whitespace_collapses() {
        assert_eq!(normalize_anchor("  Click \n\t Here\u{a0}now "), "Click Here now");
        assert_eq!(normalize_anchor(""), "");
    }
}
