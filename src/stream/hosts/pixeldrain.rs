//! PixelDrain: the file id in `/u/<id>` maps straight to the download API.

use async_trait::async_trait;
use tracing::{info, warn};
use url::Url;

use super::{HostResolver, ResolveContext};

pub struct PixeldrainResolver;

impl PixeldrainResolver {
    /// `https://pixeldrain.com/u/<id>?..` -> `https://pixeldrain.com/api/file/<id>`
    pub fn api_url(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let id = parsed.path().split("/u/").nth(1)?.split('/').next()?;
        if id.is_empty() {
            return None;
        }
        Some(format!(
            "{}/api/file/{id}",
            parsed.origin().ascii_serialization()
        ))
    }
}

#[async_trait]
impl HostResolver for PixeldrainResolver {
    fn name(&self) -> &'static str {
        "pixeldrain"
    }

    fn needles(&self) -> &'static [&'static str] {
        &["pixeldrain"]
    }

    async fn resolve(&self, url: &str, ctx: &ResolveContext) -> Option<String> {
        let Some(direct) = Self::api_url(url) else {
            warn!(host = "pixeldrain", url, "Invalid PixelDrain URL format");
            return None;
        };

        if ctx.verifier.verify(&direct).await {
            info!(url = %direct, "Found PixelDrain direct URL");
            Some(direct)
        } else {
            warn!(host = "pixeldrain", url = %direct, "PixelDrain URL not streamable");
            None
        }
    }
}
