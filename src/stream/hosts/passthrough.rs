//! Hosts whose download links are already direct.
//!
//! The link is returned as-is and never probed, so results from these hosts
//! are reported with `verified: false`.

use async_trait::async_trait;
use tracing::debug;

use super::{HostResolver, ResolveContext};

pub struct PassthroughResolver {
    name: &'static str,
    needles: &'static [&'static str],
}

impl PassthroughResolver {
    pub fn hellabyte() -> Self {
        Self {
            name: "hellabyte",
            needles: &["hellabyte"],
        }
    }

    pub fn buzzheavier() -> Self {
        Self {
            name: "buzzheavier",
            needles: &["buzzheavier"],
        }
    }
}

#[async_trait]
impl HostResolver for PassthroughResolver {
    fn name(&self) -> &'static str {
        self.name
    }

    fn needles(&self) -> &'static [&'static str] {
        self.needles
    }

    fn verifies(&self) -> bool {
        false
    }

    async fn resolve(&self, url: &str, _ctx: &ResolveContext) -> Option<String> {
        let url = url.trim();
        if url.is_empty() {
            return None;
        }
        debug!(host = self.name, url, "Passing link through unverified");
        Some(url.to_string())
    }
}
