//! Request-scoped records produced by one episode resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// A direct URL found for one download-table row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamCandidate {
    pub quality: Option<String>,
    /// Provider label as written in the page (free text).
    pub host: String,
    pub url: String,
    /// `false` for hosts whose links are passed through without a probe.
    pub verified: bool,
}

/// Raw download-table cell: provider label and link as found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub host: String,
    pub url: String,
}

/// Embed URL returned by the AJAX lookup for one player option.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AjaxStream {
    pub player: String,
    pub url: String,
}

/// Everything found for one episode page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeStreamResult {
    pub title: String,
    /// Chosen primary stream; always `all_stream_sources[0]` when set.
    pub stream_url: Option<String>,
    /// Quality label -> raw links, unresolved.
    pub download_links: BTreeMap<String, Vec<DownloadLink>>,
    pub player_options: Vec<String>,
    pub direct_stream_urls: Vec<StreamCandidate>,
    pub ajax_stream_urls: Vec<AjaxStream>,
    /// Deduplicated, first-occurrence order, primary first.
    pub all_stream_sources: Vec<String>,
}

impl EpisodeStreamResult {
    /// Number of raw download links across all quality buckets.
    pub fn download_link_count(&self) -> usize {
        self.download_links.values().map(Vec::len).sum()
    }
}

/// Order-preserving concatenation without repeats.
pub fn dedup_sources<I>(urls: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    urls.into_iter()
        .filter(|u| !u.is_empty() && seen.insert(u.clone()))
        .collect()
}
