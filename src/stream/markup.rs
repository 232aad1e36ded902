//! Markup helpers shared by the host resolvers and the episode aggregator.
//!
//! Everything here is synchronous and returns owned data: `scraper::Html`
//! is not `Send`, so documents are parsed, mined and dropped before the
//! next network call.

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use url::Url;

static VIDEO: Lazy<Selector> = Lazy::new(|| Selector::parse("video").expect("static selector"));
static SOURCE: Lazy<Selector> = Lazy::new(|| Selector::parse("source").expect("static selector"));
static IFRAME: Lazy<Selector> =
    Lazy::new(|| Selector::parse("iframe[src]").expect("static selector"));
static SCRIPT: Lazy<Selector> = Lazy::new(|| Selector::parse("script").expect("static selector"));

/// Absolute media URL inside script text, single or double quoted, optional query.
static MEDIA_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"https?://[^\s'"<>\\]+\.(?:mp4|m3u8)(?:\?[^\s'"<>\\]*)?"#).expect("valid regex")
});

/// `<source>` nested in the page's primary `<video>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoSource {
    pub src: String,
    /// Declared `type` attribute, lowercased; empty when absent.
    pub mime: String,
}

/// What a provider watch page (or its embed page) offers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchPage {
    pub video_source: Option<VideoSource>,
    /// First iframe whose `src` matched the provider's embed pattern.
    pub embed_url: Option<String>,
    /// Media URL literals from inline scripts, in document order.
    pub script_urls: Vec<String>,
}

impl WatchPage {
    pub fn parse(html: &str, page_url: &str, embed_pattern: Option<&Regex>) -> Self {
        let document = Html::parse_document(html);

        let embed_url = embed_pattern.and_then(|pattern| {
            document
                .select(&IFRAME)
                .filter_map(|iframe| iframe.value().attr("src"))
                .filter_map(|src| resolve_url(page_url, src))
                .find(|src| pattern.is_match(src))
        });

        Self {
            video_source: video_source(&document, page_url),
            embed_url,
            script_urls: script_media_urls(&document),
        }
    }
}

/// Primary `<video>`'s nested `<source src>`, or the video's own `src`.
pub fn video_source(document: &Html, page_url: &str) -> Option<VideoSource> {
    let video = document.select(&VIDEO).next()?;

    if let Some(source) = video.select(&SOURCE).find(|s| has_attr(s, "src")) {
        let src = source.value().attr("src")?;
        return Some(VideoSource {
            src: resolve_url(page_url, src)?,
            mime: source
                .value()
                .attr("type")
                .unwrap_or_default()
                .trim()
                .to_ascii_lowercase(),
        });
    }

    video
        .value()
        .attr("src")
        .filter(|s| !s.trim().is_empty())
        .and_then(|src| resolve_url(page_url, src))
        .map(|src| VideoSource {
            src,
            mime: String::new(),
        })
}

fn has_attr(element: &ElementRef<'_>, name: &str) -> bool {
    element
        .value()
        .attr(name)
        .is_some_and(|v| !v.trim().is_empty())
}

/// Media URLs from every inline `<script>`, in document order.
pub fn script_media_urls(document: &Html) -> Vec<String> {
    document
        .select(&SCRIPT)
        .flat_map(|script| extract_media_urls(&script.text().collect::<String>()))
        .collect()
}

/// Every `.mp4`/`.m3u8` URL literal in `text`, with JSON `\/` escapes undone.
pub fn extract_media_urls(text: &str) -> Vec<String> {
    let unescaped = text.replace("\\/", "/");
    MEDIA_URL
        .find_iter(&unescaped)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Resolve `href` against `base`; absolute hrefs pass through.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    if Url::parse(href).is_ok() {
        return Some(href.to_string());
    }
    Url::parse(base)
        .and_then(|b| b.join(href))
        .map(|u| u.to_string())
        .ok()
}

/// Try each step in order; first `Some` wins.
pub fn first_some<T>(steps: &[&dyn Fn() -> Option<T>]) -> Option<T> {
    steps.iter().find_map(|step| step())
}
