use linkboard_core::MatchResult;
use linkboard_storage::HttpFetcher;
use reqwest::Url;
use scraper::{Html, Selector};
use thiserror::Error;

use crate::normalize::{normalize_anchor, normalize_url};

pub const LINK_NOT_FOUND: &str = "link not found";

#[derive(Debug, Error)]
pub enum AnchorError {
    #[error("invalid selector {selector}: {message}")]
    Selector { selector: String, message: String },
}

fn selector(css: &str) -> Result<Selector, AnchorError> {
    Selector::parse(css).map_err(|e| AnchorError::Selector {
        selector: css.to_string(),
        message: e.to_string(),
    })
}

/// Absolute form of `href` without its fragment. Hrefs that cannot be resolved
/// are skipped by the caller.
fn resolve_href(base: Option<&Url>, href: &str) -> Option<String> {
    let mut resolved = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    resolved.set_fragment(None);
    Some(resolved.to_string())
}

/// Scan the `<a href>` elements of `html` for one that points at `target_url`
/// and whose visible text equals `anchor` after whitespace normalization.
/// Relative hrefs resolve against `base_url`, the post-redirect page address.
pub fn find_anchor_link(
    html: &str,
    base_url: &str,
    target_url: &str,
    anchor: &str,
) -> Result<MatchResult, AnchorError> {
    let target = normalize_url(target_url);
    let anchor = normalize_anchor(anchor);
    let base = Url::parse(base_url).ok();

    let document = Html::parse_document(html);
    let links = selector("a[href]")?;
    let found = document.select(&links).any(|link| {
        let href = link.value().attr("href").unwrap_or_default().trim();
        if href.is_empty() || href.starts_with('#') {
            return false;
        }
        let Some(absolute) = resolve_href(base.as_ref(), href) else {
            return false;
        };
        normalize_url(&absolute) == target
            && normalize_anchor(&link.text().collect::<String>()) == anchor
    });

    Ok(if found {
        MatchResult::Found
    } else {
        MatchResult::NotFound(LINK_NOT_FOUND.to_string())
    })
}

/// Fetch `page_url` and look for the anchor link. Transport failures and
/// non-success statuses become `FetchError`.
pub async fn check_page(
    fetcher: &HttpFetcher,
    page_url: &str,
    target_url: &str,
    anchor: &str,
) -> MatchResult {
    let page = match fetcher.fetch(page_url).await {
        Ok(page) => page,
        Err(err) => return MatchResult::FetchError(err.to_string()),
    };
    find_anchor_link(&page.text(), &page.final_url, target_url, anchor)
        .unwrap_or_else(|err| MatchResult::FetchError(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"
        <html><body>
          <a href="#top">Click Here</a>
          <a href="">Click Here</a>
          <a href="/other">Click Here</a>
          <p>Read more: <a href="/target/#section">Click
             <b>Here</b></a></p>
          <a href="https://partner.example.org/landing/?utm=1">Partner   site</a>
        </body></html>
    "##;

    fn check(target: &str, anchor: &str) -> MatchResult {
        find_anchor_link(PAGE, "https://blog.example.com/posts/1", target, anchor).unwrap()
    }

    #[test]
    fn relative_href_matches_with_collapsed_anchor_text() {
        assert_eq!(check("https://blog.example.com/target", "Click   Here"), MatchResult::Found);
        assert_eq!(check("blog.example.com/target/", "Click Here"), MatchResult::Found);
    }

    #[test]
    fn wrong_anchor_text_is_not_found() {
        assert_eq!(
            check("https://blog.example.com/target", "Click There"),
            MatchResult::NotFound(LINK_NOT_FOUND.to_string())
        );
    }

    #[test]
    fn fragment_only_and_empty_hrefs_are_ignored() {
        assert!(matches!(
            check("https://blog.example.com/posts/1", "Click Here"),
            MatchResult::NotFound(_)
        ));
    }

    #[test]
    fn absolute_links_keep_their_query() {
        assert_eq!(
            check("https://partner.example.org/landing?utm=1", "Partner site"),
            MatchResult::Found
        );
        assert!(matches!(
            check("https://partner.example.org/landing", "Partner site"),
            MatchResult::NotFound(_)
        ));
    }

    #[test]
    fn relative_hrefs_follow_the_final_url() {
        let html = r#"<a href="../target">Go</a>"#;
        let found = find_anchor_link(html, "https://x.test/a/b/page", "https://x.test/a/target", "Go").unwrap();
        assert_eq!(found, MatchResult::Found);
        let elsewhere = find_anchor_link(html, "https://x.test/page", "https://x.test/a/target", "Go").unwrap();
        assert!(matches!(elsewhere, MatchResult::NotFound(_)));
    }
}
