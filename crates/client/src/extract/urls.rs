//! Finding URLs in message text.

use std::sync::LazyLock;

use linkify::{LinkFinder, LinkKind};
use regex::Regex;
use url::Url;

use super::ExtractError;

const ARCHIVE_HOST: &str = "web.archive.org";

static WAYBACK_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://web\.archive\.org").expect("valid wayback prefix pattern"));

/// Greedy prefix, so the capture is the last `http` in the text.
static EMBEDDED_URL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s).*(http.*)").expect("valid embedded url pattern"));

/// Extract every absolute http(s) URL from `text`, in order of appearance.
///
/// Bare domains (`example.com`) are not URLs here: a scheme and a host are
/// both required. Repeated URLs are kept, one entry per occurrence.
///
/// # Errors
///
/// Returns [`ExtractError::NoUrlsFound`] when the text is empty or holds no
/// URL.
pub fn extract_urls(text: &str) -> Result<Vec<String>, ExtractError> {
    let mut finder = LinkFinder::new();
    finder.kinds(&[LinkKind::Url]).url_must_have_scheme(true);

    let urls: Vec<String> = finder
        .links(text)
        .map(|link| link.as_str())
        .filter(|candidate| is_absolute_web_url(candidate))
        .map(str::to_string)
        .collect();

    if urls.is_empty() {
        return Err(ExtractError::NoUrlsFound);
    }

    tracing::debug!(count = urls.len(), "extracted urls");
    Ok(urls)
}

fn is_absolute_web_url(candidate: &str) -> bool {
    match Url::parse(candidate) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host_str().is_some_and(|h| !h.is_empty()),
        Err(_) => false,
    }
}

/// Append a trailing slash when missing.
///
/// The archive service keeps the slash on the URLs it hands back, so text
/// recovered from an earlier reply is normalized the same way.
pub fn with_trailing_slash(url: &str) -> String {
    if url.ends_with('/') { url.to_string() } else { format!("{url}/") }
}

/// Recover the original URL embedded in an archive link.
///
/// Returns `None` when `text` is not an archive link, or when the recovered
/// part still points at the archive host.
pub fn original_from_archive_link(text: &str) -> Option<String> {
    let text = text.trim();
    if !WAYBACK_PREFIX.is_match(text) {
        return None;
    }

    let original = EMBEDDED_URL.captures(text)?.get(1)?.as_str();
    if original.contains(ARCHIVE_HOST) {
        tracing::warn!(link = text, "could not recover original URL from archive link");
        return None;
    }
    Some(original.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_urls_in_order() {
        let text = "read https://example.com/a then http://news.test/story?id=4 please";
        let urls = extract_urls(text).unwrap();
        assert_eq!(urls, vec!["https://example.com/a", "http://news.test/story?id=4"]);
    }

    #[test]
    fn test_extract_urls_keeps_duplicates() {
        let text = "https://example.com/ and again https://example.com/";
        let urls = extract_urls(text).unwrap();
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0], urls[1]);
    }

    #[test]
    fn test_extract_urls_rejects_bare_domains() {
        assert_eq!(extract_urls("see example.com or www.example.org"), Err(ExtractError::NoUrlsFound));
    }

    #[test]
    fn test_extract_urls_ignores_non_web_schemes() {
        assert_eq!(extract_urls("ftp://files.example.com/x"), Err(ExtractError::NoUrlsFound));
    }

    #[test]
    fn test_extract_urls_empty() {
        assert_eq!(extract_urls(""), Err(ExtractError::NoUrlsFound));
        assert_eq!(extract_urls("no links here"), Err(ExtractError::NoUrlsFound));
    }

    #[test]
    fn test_extract_urls_strips_trailing_punctuation() {
        let urls = extract_urls("check (https://example.com/page).").unwrap();
        assert_eq!(urls, vec!["https://example.com/page"]);
    }

    #[test]
    fn test_with_trailing_slash() {
        assert_eq!(with_trailing_slash("https://example.com"), "https://example.com/");
        assert_eq!(with_trailing_slash("https://example.com/"), "https://example.com/");
    }

    #[test]
    fn test_original_from_archive_link() {
        let link = "https://web.archive.org/web/20230101000000/https://example.com/page";
        assert_eq!(original_from_archive_link(link).as_deref(), Some("https://example.com/page"));
    }

    #[test]
    fn test_original_from_archive_link_not_archive() {
        assert_eq!(original_from_archive_link("https://example.com/page"), None);
    }

    #[test]
    fn test_original_from_archive_link_only_archive() {
        assert_eq!(original_from_archive_link("https://web.archive.org/web/20230101000000/"), None);
    }
}
