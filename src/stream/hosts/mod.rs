//! File-host resolvers.
//!
//! Turns a provider watch-page URL from an episode's download table into a
//! direct media URL.
//!
//! # Architecture
//!
//! - [`HostResolver`]: async trait, one implementation per provider family
//! - [`HostRegistry`]: selects the resolver by provider label or URL
//! - [`ResolveContext`]: fetcher + verifier handed to every resolver
//!
//! # Example
//!
//! ```rust,no_run
//! use streamsift::config::Config;
//! use streamsift::http_client::{Fetcher, Site};
//! use streamsift::stream::hosts::{HostRegistry, ResolveContext};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let fetcher = Fetcher::for_site(Site::Anime, &Config::default())?;
//! let ctx = ResolveContext::new(fetcher);
//! let registry = HostRegistry::new();
//!
//! if let Some(link) = registry.resolve("PixelDrain", "https://pixeldrain.com/u/abc", &ctx).await {
//!     println!("{} -> {}", link.resolver, link.url);
//! }
//! # Ok(())
//! # }
//! ```

pub mod passthrough;
pub mod pixeldrain;
pub mod watch_page;

use async_trait::async_trait;
use tracing::debug;

use crate::http_client::Fetcher;
use crate::stream::verify::MediaVerifier;

pub use passthrough::PassthroughResolver;
pub use pixeldrain::PixeldrainResolver;
pub use watch_page::WatchPageResolver;

/// Network access shared by all resolvers for one request.
#[derive(Clone)]
pub struct ResolveContext {
    pub fetcher: Fetcher,
    pub verifier: MediaVerifier,
}

impl ResolveContext {
    pub fn new(fetcher: Fetcher) -> Self {
        let verifier = MediaVerifier::new(&fetcher);
        Self { fetcher, verifier }
    }
}

/// Strategy for one hosting provider.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Short lowercase provider name (e.g., `"pixeldrain"`).
    fn name(&self) -> &'static str;

    /// Lowercase substrings identifying the provider in a label or URL.
    fn needles(&self) -> &'static [&'static str];

    /// Case-insensitive match on the table label or the link itself.
    fn matches(&self, label: &str, url: &str) -> bool {
        let label = label.to_lowercase();
        let url = url.to_lowercase();
        self.needles()
            .iter()
            .any(|n| label.contains(n) || url.contains(n))
    }

    /// Whether a returned URL passed the media check.
    fn verifies(&self) -> bool {
        true
    }

    /// Direct media URL for the watch page, or `None`.
    async fn resolve(&self, url: &str, ctx: &ResolveContext) -> Option<String>;
}

/// Result of a registry dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLink {
    pub resolver: &'static str,
    pub url: String,
    pub verified: bool,
}

/// Routes download links to the matching host resolver.
///
/// Resolvers are checked in registration order. First match wins.
pub struct HostRegistry {
    resolvers: Vec<Box<dyn HostResolver>>,
}

impl HostRegistry {
    /// Create a registry with every known provider.
    #[must_use]
    pub fn new() -> Self {
        let resolvers: Vec<Box<dyn HostResolver>> = vec![
            Box::new(WatchPageResolver::filemoon()),
            Box::new(WatchPageResolver::vidhidepro()),
            Box::new(WatchPageResolver::krakenfiles()),
            Box::new(WatchPageResolver::mega()),
            Box::new(PixeldrainResolver),
            Box::new(PassthroughResolver::hellabyte()),
            Box::new(PassthroughResolver::buzzheavier()),
        ];

        Self { resolvers }
    }

    pub fn with_resolvers(resolvers: Vec<Box<dyn HostResolver>>) -> Self {
        Self { resolvers }
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.resolvers.iter().map(|r| r.name()).collect()
    }

    pub fn select(&self, label: &str, url: &str) -> Option<&dyn HostResolver> {
        self.resolvers
            .iter()
            .find(|r| r.matches(label, url))
            .map(AsRef::as_ref)
    }

    /// Dispatch one download link.
    ///
    /// Returns `None` if no provider matches or resolution finds nothing
    /// (logged by the resolver).
    pub async fn resolve(
        &self,
        label: &str,
        url: &str,
        ctx: &ResolveContext,
    ) -> Option<ResolvedLink> {
        let Some(resolver) = self.select(label, url) else {
            debug!(label, url, "No host resolver for link");
            return None;
        };
        debug!(host = resolver.name(), url, "Matched host resolver");

        let direct = resolver.resolve(url, ctx).await?;
        Some(ResolvedLink {
            resolver: resolver.name(),
            url: direct,
            verified: resolver.verifies(),
        })
    }
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}
