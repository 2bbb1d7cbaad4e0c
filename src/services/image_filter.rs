//! Heuristics that decide whether an article is worth showing as a card.
//!
//! Upstream results frequently carry logos, placeholders, or `[Removed]`
//! stubs instead of real content. These checks are deliberately crude: a
//! URL either looks like a photo or it does not.

use once_cell::sync::Lazy;
use regex::Regex;

static IMAGE_EXTENSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(jpg|jpeg|png|webp|gif)(\?|$)").expect("valid regex"));

static IMAGE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(amazonaws\.com|cloudfront\.net|imgur\.com|unsplash\.com|pexels\.com|shutterstock\.com|gettyimages\.com|newsweek\.com|cnn\.com|bbc\.com|reuters\.com)",
    )
    .expect("valid regex")
});

static FEED_IMAGE_HOST: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\.(amazonaws\.com|cloudfront\.net|imgur\.com|unsplash\.com|pexels\.com|shutterstock\.com|gettyimages\.com|newsweek\.com|cnn\.com|bbc\.com|reuters\.com|videocardz\.com|techcrunch\.com|theverge\.com)",
    )
    .expect("valid regex")
});

const REJECTED_IMAGE_WORDS: [&str; 4] = ["placeholder", "default", "logo", "avatar"];

/// How strict the image check is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageCheck {
    /// Cached rows and search results.
    Standard,
    /// Category feed results: a few more trusted hosts, but the URL must
    /// have a real path beyond the domain.
    Feed,
}

fn passes_common_checks(url: &str) -> bool {
    url.starts_with("http")
        && url.len() >= 30
        && !REJECTED_IMAGE_WORDS.iter().any(|word| url.contains(word))
        && !url.ends_with(".svg")
}

/// Returns true when `url` plausibly points at a photo rather than a
/// placeholder or logo.
pub fn is_real_image(url: Option<&str>, check: ImageCheck) -> bool {
    let Some(url) = url else {
        return false;
    };

    if !passes_common_checks(url) {
        return false;
    }

    match check {
        ImageCheck::Standard => IMAGE_EXTENSION.is_match(url) || IMAGE_HOST.is_match(url),
        ImageCheck::Feed => {
            if url.split('/').count() < 4 {
                return false;
            }
            IMAGE_EXTENSION.is_match(url) || FEED_IMAGE_HOST.is_match(url)
        }
    }
}

fn is_present_text(value: Option<&str>) -> bool {
    matches!(value, Some(v) if v != "[Removed]" && !v.trim().is_empty())
}

/// Title and description must be real text and the link must be a live
/// http(s) URL.
pub fn has_valid_content(title: Option<&str>, description: Option<&str>, url: Option<&str>) -> bool {
    if !is_present_text(title) || !is_present_text(description) {
        return false;
    }

    matches!(url, Some(u) if u.starts_with("http") && !u.contains("removed.com"))
}
