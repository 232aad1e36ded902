//! Content-Type verification of candidate media URLs.
//!
//! A candidate is playable when a HEAD request succeeds and the server
//! labels it as video, HLS, or an opaque binary download.

use tracing::{debug, warn};

use crate::http_client::{FetchPolicy, Fetcher, HeadResponse};

/// Substrings of `Content-Type` that mark a response as media.
pub const MEDIA_TYPE_MARKERS: [&str; 3] = [
    "video",
    "application/vnd.apple.mpegurl",
    "application/octet-stream",
];

/// Case-insensitive match against [`MEDIA_TYPE_MARKERS`].
pub fn is_media_content_type(content_type: &str) -> bool {
    let lower = content_type.to_ascii_lowercase();
    MEDIA_TYPE_MARKERS.iter().any(|m| lower.contains(m))
}

/// MIME type declared on a `<source type=...>` that can be trusted without a probe.
pub fn is_declared_media_type(mime: &str) -> bool {
    let lower = mime.trim().to_ascii_lowercase();
    lower.starts_with("video/") || lower.contains("mpegurl")
}

/// `true` if the URL path ends in `.mp4` or `.m3u8`, ignoring query and fragment.
pub fn has_media_extension(url: &str) -> bool {
    let path = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    path.ends_with(".mp4") || path.ends_with(".m3u8")
}

/// HEAD-based media check shared by every host resolver.
#[derive(Clone)]
pub struct MediaVerifier {
    fetcher: Fetcher,
}

impl MediaVerifier {
    /// Probes run single-attempt on the given fetcher's pool and profile.
    pub fn new(fetcher: &Fetcher) -> Self {
        Self {
            fetcher: fetcher.with_policy(FetchPolicy::probe()),
        }
    }

    /// HEAD the URL; `None` on any transport failure or non-2xx status.
    pub async fn probe(&self, url: &str) -> Option<HeadResponse> {
        match self.fetcher.head(url).await {
            Ok(head) => Some(head),
            Err(e) => {
                debug!(url = %url, error = %e, "Probe failed");
                None
            }
        }
    }

    /// Verdict for an already probed response.
    pub fn accepts(head: &HeadResponse) -> bool {
        head.status.is_success() && is_media_content_type(&head.content_type)
    }

    /// Whether `url` answers 2xx with a media `Content-Type`.
    ///
    /// Failures are rejections, never errors.
    pub async fn verify(&self, url: &str) -> bool {
        let Some(head) = self.probe(url).await else {
            return false;
        };
        if Self::accepts(&head) {
            debug!(url = %url, content_type = %head.content_type, "Verified media");
            true
        } else {
            warn!(
                url = %url,
                status = %head.status,
                content_type = %head.content_type,
                "Invalid Content-Type for candidate"
            );
            false
        }
    }
}
