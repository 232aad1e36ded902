//! Episode stream aggregation.
//!
//! One episode page offers up to three kinds of stream sources:
//!
//! ```text
//! .movieplay iframe  ──HEAD──▶ final URL is media?            ─┐
//! .east_player_option ─AJAX──▶ embed URL per player           ─┼─▶ primary + all_stream_sources
//! #downloadb table   ─hosts─▶ verified direct URL per row     ─┤
//! inline <script>    ─regex─▶ loose .mp4/.m3u8 literals       ─┘
//! ```
//!
//! Failures anywhere below the page fetch only shrink the result; the page
//! fetch failing (or a panic) yields the empty shell.

use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use futures::FutureExt;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, error, info, instrument, warn};

use crate::config::Config;
use crate::error::FetchResult;
use crate::http_client::{Fetcher, Site};
use crate::stream::ajax::{AjaxEmbedClient, DEFAULT_STREAM_KIND};
use crate::stream::hosts::{HostRegistry, ResolveContext};
use crate::stream::markup::{first_some, resolve_url, script_media_urls};
use crate::stream::types::{
    dedup_sources, AjaxStream, DownloadLink, EpisodeStreamResult, StreamCandidate,
};
use crate::stream::verify::{has_media_extension, is_media_content_type};

pub const UNKNOWN_EPISODE: &str = "Unknown Episode";
const UNKNOWN_HOST: &str = "Unknown";

/// Providers preferred for the primary stream, in order.
const PRIMARY_PREFERENCE: [&str; 2] = ["filemoon", "pixeldrain"];

macro_rules! selector {
    ($css:literal) => {
        Lazy::new(|| Selector::parse($css).expect("static selector"))
    };
}

static LIST_TITLE: Lazy<Selector> = selector!("div.list-title h2");
static OG_TITLE: Lazy<Selector> = selector!(r#"meta[property="og:title"]"#);
static H2: Lazy<Selector> = selector!("h2");
static PLAYER_IFRAME: Lazy<Selector> = selector!(".movieplay iframe");
static PLAYER_OPTION: Lazy<Selector> = selector!("div.player-modes .east_player_option");
static SPAN: Lazy<Selector> = selector!("span");
static DOWNLOAD_ROW: Lazy<Selector> = selector!("div#downloadb li");
static STRONG: Lazy<Selector> = selector!("strong");
static ANCHOR: Lazy<Selector> = selector!("a");

/// Alternate player advertised on the episode page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerOption {
    pub label: String,
    pub post_id: Option<String>,
    pub stream_index: Option<String>,
    pub kind: String,
}

/// One link cell of the download table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRow {
    pub quality: String,
    pub host: String,
    /// `href` as written.
    pub href: String,
}

/// Everything the aggregator needs from the episode markup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EpisodePage {
    pub title: String,
    pub iframe_src: Option<String>,
    pub player_options: Vec<PlayerOption>,
    /// Quality headings in document order, including rows without links.
    pub download_qualities: Vec<String>,
    pub download_rows: Vec<DownloadRow>,
    pub script_urls: Vec<String>,
}

impl EpisodePage {
    pub fn parse(html: &str, page_url: &str) -> Self {
        let document = Html::parse_document(html);

        let iframe_src = document
            .select(&PLAYER_IFRAME)
            .next()
            .and_then(|f| f.value().attr("src"))
            .and_then(|src| resolve_url(page_url, src));
        let (download_qualities, download_rows) = download_table(&document);

        Self {
            title: extract_title(&document),
            iframe_src,
            player_options: player_options(&document),
            download_qualities,
            download_rows,
            script_urls: script_media_urls(&document),
        }
    }
}

fn text_of(element: ElementRef<'_>) -> String {
    element.text().collect::<String>().trim().to_string()
}

/// Title container, then `og:title`, then the first "Episode" heading.
fn extract_title(document: &Html) -> String {
    let from_container = || {
        document
            .select(&LIST_TITLE)
            .next()
            .map(text_of)
            .filter(|t| !t.is_empty())
    };
    let from_meta = || {
        document
            .select(&OG_TITLE)
            .next()
            .and_then(|m| m.value().attr("content"))
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string)
    };
    let from_heading = || {
        document
            .select(&H2)
            .map(text_of)
            .find(|t| t.contains("Episode"))
    };

    first_some(&[&from_container, &from_meta, &from_heading])
        .unwrap_or_else(|| UNKNOWN_EPISODE.to_string())
}

fn player_options(document: &Html) -> Vec<PlayerOption> {
    document
        .select(&PLAYER_OPTION)
        .filter_map(|option| {
            let label = option.select(&SPAN).next().map(text_of)?;
            let attr = |name: &str| {
                option
                    .value()
                    .attr(name)
                    .map(str::trim)
                    .filter(|v| !v.is_empty())
                    .map(str::to_string)
            };
            Some(PlayerOption {
                label,
                post_id: attr("data-post"),
                stream_index: attr("data-nume"),
                kind: attr("data-type").unwrap_or_else(|| DEFAULT_STREAM_KIND.to_string()),
            })
        })
        .collect()
}

fn download_table(document: &Html) -> (Vec<String>, Vec<DownloadRow>) {
    let mut qualities = Vec::new();
    let mut rows = Vec::new();
    for section in document.select(&DOWNLOAD_ROW) {
        let Some(quality) = section.select(&STRONG).next().map(text_of) else {
            continue;
        };
        qualities.push(quality.clone());
        for link in section.select(&ANCHOR) {
            rows.push(DownloadRow {
                quality: quality.clone(),
                host: text_of(link),
                href: link.value().attr("href").unwrap_or_default().trim().to_string(),
            });
        }
    }
    (qualities, rows)
}

/// A verified (or passed-through) row together with the resolver that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCandidate {
    pub resolver: &'static str,
    pub candidate: StreamCandidate,
}

/// Primary stream fallback chain.
///
/// iframe, first AJAX URL, preferred providers in [`PRIMARY_PREFERENCE`]
/// order, first candidate, first loose script URL. Providers are matched on
/// the row label only.
pub fn choose_primary(
    iframe: Option<&str>,
    ajax: &[AjaxStream],
    candidates: &[ResolvedCandidate],
    loose: &[String],
) -> Option<String> {
    let prefer = |provider: &str| {
        candidates
            .iter()
            .find(|c| c.candidate.host.to_lowercase().contains(provider))
            .map(|c| c.candidate.url.clone())
    };

    first_some(&[
        &|| iframe.map(str::to_string),
        &|| ajax.first().map(|a| a.url.clone()),
        &|| prefer(PRIMARY_PREFERENCE[0]),
        &|| prefer(PRIMARY_PREFERENCE[1]),
        &|| candidates.first().map(|c| c.candidate.url.clone()),
        &|| loose.first().cloned(),
    ])
}

/// Resolves episode pages into [`EpisodeStreamResult`]s.
pub struct EpisodeAggregator {
    fetcher: Fetcher,
    ajax: AjaxEmbedClient,
    registry: Arc<HostRegistry>,
    ctx: ResolveContext,
    concurrency: usize,
}

impl EpisodeAggregator {
    pub fn new(fetcher: Fetcher, config: &Config) -> Self {
        let ajax = AjaxEmbedClient::new(fetcher.clone(), &config.anime_base_url, &config.ajax_action);
        let ctx = ResolveContext::new(fetcher.clone());
        Self {
            fetcher,
            ajax,
            registry: Arc::new(HostRegistry::new()),
            ctx,
            concurrency: config.resolve_concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config) -> FetchResult<Self> {
        Ok(Self::new(Fetcher::for_site(Site::Anime, config)?, config))
    }

    #[must_use]
    pub fn with_registry(mut self, registry: HostRegistry) -> Self {
        self.registry = Arc::new(registry);
        self
    }

    pub fn registry(&self) -> &HostRegistry {
        &self.registry
    }

    pub fn resolve_context(&self) -> &ResolveContext {
        &self.ctx
    }

    /// Resolve every stream source on an episode page.
    ///
    /// Returns `None` (the empty shell) when the page cannot be fetched or
    /// resolution panics; a page with no streams is still `Some`.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_episode_streams(&self, url: &str) -> Option<EpisodeStreamResult> {
        info!("Fetching episode streams");
        match AssertUnwindSafe(self.collect(url)).catch_unwind().await {
            Ok(result) => result,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(error = %message, "Error extracting episode streams");
                None
            }
        }
    }

    async fn collect(&self, url: &str) -> Option<EpisodeStreamResult> {
        let html = self.fetcher.get_page(url).await?;
        let page = EpisodePage::parse(&html, url);
        drop(html);
        info!(title = %page.title, "Parsed episode page");

        let iframe_primary = match &page.iframe_src {
            Some(src) => self.probe_iframe(src).await,
            None => None,
        };

        let mut player_labels = Vec::with_capacity(page.player_options.len());
        let mut ajax_streams = Vec::new();
        for option in &page.player_options {
            player_labels.push(option.label.clone());
            let (Some(post_id), Some(stream_index)) = (&option.post_id, &option.stream_index)
            else {
                continue;
            };
            if let Some(embed) = self
                .ajax
                .get_embed_url(post_id, stream_index, &option.kind)
                .await
            {
                ajax_streams.push(AjaxStream {
                    player: option.label.clone(),
                    url: embed,
                });
            }
        }

        let mut download_links: BTreeMap<String, Vec<DownloadLink>> = page
            .download_qualities
            .iter()
            .map(|q| (q.clone(), Vec::new()))
            .collect();
        for row in &page.download_rows {
            download_links
                .entry(row.quality.clone())
                .or_default()
                .push(DownloadLink {
                    host: row.host.clone(),
                    url: row.href.clone(),
                });
        }

        let resolved = self.resolve_rows(url, &page.download_rows).await;

        let stream_url = choose_primary(
            iframe_primary.as_deref(),
            &ajax_streams,
            &resolved,
            &page.script_urls,
        );

        let all_stream_sources = dedup_sources(
            stream_url
                .iter()
                .cloned()
                .chain(ajax_streams.iter().map(|a| a.url.clone()))
                .chain(resolved.iter().map(|r| r.candidate.url.clone()))
                .chain(page.script_urls.iter().cloned()),
        );

        info!(
            stream_url = ?stream_url,
            direct = resolved.len(),
            ajax = ajax_streams.len(),
            sources = all_stream_sources.len(),
            "Successfully extracted streams"
        );

        Some(EpisodeStreamResult {
            title: page.title,
            stream_url,
            download_links,
            player_options: player_labels,
            direct_stream_urls: resolved.into_iter().map(|r| r.candidate).collect(),
            ajax_stream_urls: ajax_streams,
            all_stream_sources,
        })
    }

    /// HEAD the player iframe; keep the post-redirect URL if it is media.
    async fn probe_iframe(&self, src: &str) -> Option<String> {
        let head = self.ctx.verifier.probe(src).await?;
        if has_media_extension(&head.final_url) || is_media_content_type(&head.content_type) {
            info!(url = %head.final_url, "Found iframe stream URL");
            Some(head.final_url)
        } else {
            debug!(url = %head.final_url, content_type = %head.content_type, "Iframe is not direct media");
            None
        }
    }

    /// Dispatch download rows to host resolvers, keeping document order.
    async fn resolve_rows(&self, page_url: &str, rows: &[DownloadRow]) -> Vec<ResolvedCandidate> {
        let outcomes: Vec<Option<ResolvedCandidate>> = stream::iter(rows.iter().cloned())
            .map(|row: DownloadRow| async move {
                let target = resolve_url(page_url, &row.href)?;
                let link = self.registry.resolve(&row.host, &target, &self.ctx).await?;
                Some(ResolvedCandidate {
                    resolver: link.resolver,
                    candidate: StreamCandidate {
                        quality: Some(row.quality),
                        host: if row.host.is_empty() {
                            UNKNOWN_HOST.to_string()
                        } else {
                            row.host
                        },
                        url: link.url,
                        verified: link.verified,
                    },
                })
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        let resolved: Vec<_> = outcomes.into_iter().flatten().collect();
        if resolved.is_empty() && !rows.is_empty() {
            warn!(rows = rows.len(), "No download row resolved to a direct URL");
        }
        resolved
    }
}
