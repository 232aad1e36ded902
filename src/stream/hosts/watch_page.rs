//! Markup-driven resolution for hosts that serve an HTML watch page.
//!
//! Search order, first success wins:
//! 1. `<video><source>` on the watch page (trusted if it declares a media type)
//! 2. the provider's embed iframe, searched the same way
//! 3. media URL literals in inline scripts (embed page first), each probed

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use super::{HostResolver, ResolveContext};
use crate::stream::markup::{VideoSource, WatchPage};
use crate::stream::types::dedup_sources;
use crate::stream::verify::is_declared_media_type;

static FILEMOON_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://[^/\s]*filemoon[^/\s]*/e/").expect("valid regex"));
static VIDHIDE_EMBED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[^/\s]*vidhide[^/\s]*/(?:embed|v)/").expect("valid regex")
});
static KRAKEN_EMBED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^https?://krakenfiles\.com/embed-video").expect("valid regex"));

/// Resolver for one watch-page provider.
pub struct WatchPageResolver {
    name: &'static str,
    needles: &'static [&'static str],
    embed_pattern: Option<&'static Regex>,
}

impl WatchPageResolver {
    /// Resolver for a provider not built in. `embed_pattern` must match the
    /// absolute URL of the provider's player iframe.
    pub fn new(
        name: &'static str,
        needles: &'static [&'static str],
        embed_pattern: Option<&'static Regex>,
    ) -> Self {
        Self {
            name,
            needles,
            embed_pattern,
        }
    }

    pub fn filemoon() -> Self {
        Self {
            name: "filemoon",
            needles: &["filemoon"],
            embed_pattern: Some(&*FILEMOON_EMBED),
        }
    }

    pub fn vidhidepro() -> Self {
        Self {
            name: "vidhidepro",
            needles: &["vidhidepro"],
            embed_pattern: Some(&*VIDHIDE_EMBED),
        }
    }

    pub fn krakenfiles() -> Self {
        Self {
            name: "krakenfiles",
            needles: &["krakenfiles"],
            embed_pattern: Some(&*KRAKEN_EMBED),
        }
    }

    /// Mega pages have no embed player worth following.
    pub fn mega() -> Self {
        Self {
            name: "mega",
            needles: &["mega."],
            embed_pattern: None,
        }
    }

    async fn accept_source(
        &self,
        source: Option<&VideoSource>,
        ctx: &ResolveContext,
    ) -> Option<String> {
        let source = source?;
        if is_declared_media_type(&source.mime) {
            info!(host = self.name, url = %source.src, mime = %source.mime, "Found video source");
            return Some(source.src.clone());
        }
        if ctx.verifier.verify(&source.src).await {
            info!(host = self.name, url = %source.src, "Found video source (verified)");
            return Some(source.src.clone());
        }
        None
    }
}

#[async_trait]
impl HostResolver for WatchPageResolver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn needles(&self) -> &'static [&'static str] {
        self.needles
    }

    async fn resolve(&self, url: &str, ctx: &ResolveContext) -> Option<String> {
        let Some(html) = ctx.fetcher.get_page(url).await else {
            warn!(host = self.name, url, "Failed to fetch watch page");
            return None;
        };
        let page = WatchPage::parse(&html, url, self.embed_pattern);

        if let Some(found) = self.accept_source(page.video_source.as_ref(), ctx).await {
            return Some(found);
        }

        let mut script_urls = Vec::new();
        if let Some(embed_url) = &page.embed_url {
            debug!(host = self.name, embed_url = %embed_url, "Following embed iframe");
            if let Some(embed_html) = ctx.fetcher.get_page(embed_url).await {
                let embed = WatchPage::parse(&embed_html, embed_url, None);
                if let Some(found) = self.accept_source(embed.video_source.as_ref(), ctx).await {
                    return Some(found);
                }
                script_urls.extend(embed.script_urls);
            }
        }
        script_urls.extend(page.script_urls);

        for candidate in dedup_sources(script_urls) {
            if ctx.verifier.verify(&candidate).await {
                info!(host = self.name, url = %candidate, "Found stream URL in script");
                return Some(candidate);
            }
        }

        warn!(host = self.name, url, "No .mp4 or .m3u8 URL found");
        None
    }
}
