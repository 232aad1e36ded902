//! Embed lookup through the site's `admin-ajax.php` endpoint.
//!
//! Each player option on an episode page carries a post id and a stream
//! index; posting them back returns the embed URL for that player.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::http_client::Fetcher;

/// `src` of an iframe snippet returned in place of a bare URL.
static IFRAME_SRC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"(?i)<iframe[^>]*\ssrc\s*=\s*["']([^"']+)["']"#).expect("valid regex"));

pub const DEFAULT_STREAM_KIND: &str = "urliframe";

/// Client for the player embed endpoint.
#[derive(Clone)]
pub struct AjaxEmbedClient {
    fetcher: Fetcher,
    endpoint: String,
    action: String,
}

impl AjaxEmbedClient {
    pub fn new(fetcher: Fetcher, base_url: &str, action: &str) -> Self {
        Self {
            fetcher,
            endpoint: format!("{}/wp-admin/admin-ajax.php", base_url.trim_end_matches('/')),
            action: action.to_string(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Embed URL for `(post_id, stream_index)`, or `None` on any failure.
    pub async fn get_embed_url(
        &self,
        post_id: &str,
        stream_index: &str,
        kind: &str,
    ) -> Option<String> {
        let form = [
            ("action", self.action.as_str()),
            ("post", post_id),
            ("nume", stream_index),
            ("type", kind),
        ];

        let page = match self.fetcher.post_form(&self.endpoint, &form).await {
            Ok(page) => page,
            Err(e) => {
                warn!(post_id, stream_index, error = %e, "AJAX embed lookup failed");
                return None;
            }
        };

        let embed = parse_embed_response(&page.body);
        match &embed {
            Some(url) => info!(post_id, stream_index, url = %url, "Found AJAX embed URL"),
            None => warn!(post_id, stream_index, "Failed to get AJAX stream URL"),
        }
        embed
    }
}

/// JSON `{"embed_url": ..}` or a bare URL body; anything else is `None`.
pub fn parse_embed_response(body: &str) -> Option<String> {
    match serde_json::from_str::<Value>(body) {
        Ok(json) => json
            .get("embed_url")
            .and_then(Value::as_str)
            .and_then(normalize_embed),
        Err(_) => {
            let text = body.trim();
            text.starts_with("http").then(|| text.to_string())
        }
    }
}

fn normalize_embed(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.starts_with("http") {
        return Some(raw.to_string());
    }
    IFRAME_SRC
        .captures(raw)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|src| src.starts_with("http"))
}
