//! Browser Fingerprint Spoofing
//!
//! Scraped sites and file hosts reject obvious bots, so every request carries
//! a desktop browser header set with the site root as `Referer`. One site
//! family additionally rotates its user agent per attempt.

use rand::seq::SliceRandom;
use reqwest::header::{
    HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, CONNECTION, REFERER,
    UPGRADE_INSECURE_REQUESTS, USER_AGENT,
};

/// Desktop Chrome agent used for the anime site and the file hosts it links.
pub const DESKTOP_CHROME: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Rotation pool for the comic site, indexed by attempt number.
pub const ROTATING_AGENTS: [&str; 3] = [
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/119.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:109.0) Gecko/20100101 Firefox/119.0",
];

const ACCEPT_HTML: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8";

/// How the `User-Agent` header is chosen for an attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserAgentMode {
    Fixed(String),
    /// Attempt `n` uses `pool[n % pool.len()]`.
    Rotate(&'static [&'static str]),
}

impl UserAgentMode {
    pub fn for_attempt(&self, attempt: u32) -> &str {
        match self {
            Self::Fixed(ua) => ua,
            Self::Rotate(pool) if pool.is_empty() => DESKTOP_CHROME,
            Self::Rotate(pool) => pool[attempt as usize % pool.len()],
        }
    }

    pub fn rotates(&self) -> bool {
        matches!(self, Self::Rotate(_))
    }
}

/// Header set presented to one site.
#[derive(Debug, Clone)]
pub struct BrowserProfile {
    pub user_agent: UserAgentMode,
    pub accept: String,
    pub accept_language: String,
    /// Site root with trailing slash.
    pub referer: String,
}

impl BrowserProfile {
    /// Fixed desktop Chrome profile with `base_url` as referer.
    #[must_use]
    pub fn desktop(base_url: &str) -> Self {
        Self {
            user_agent: UserAgentMode::Fixed(DESKTOP_CHROME.to_string()),
            accept: ACCEPT_HTML.to_string(),
            accept_language: random_accept_language(),
            referer: site_root(base_url),
        }
    }

    /// Profile that cycles through [`ROTATING_AGENTS`] on every attempt.
    #[must_use]
    pub fn rotating(base_url: &str) -> Self {
        Self {
            user_agent: UserAgentMode::Rotate(&ROTATING_AGENTS),
            ..Self::desktop(base_url)
        }
    }

    /// Convert profile to a reqwest `HeaderMap` for the given attempt.
    pub fn headers_for_attempt(&self, attempt: u32) -> HeaderMap {
        let mut headers = HeaderMap::new();

        insert(&mut headers, USER_AGENT, self.user_agent.for_attempt(attempt));
        insert(&mut headers, ACCEPT, &self.accept);
        insert(&mut headers, ACCEPT_LANGUAGE, &self.accept_language);
        insert(&mut headers, REFERER, &self.referer);
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(UPGRADE_INSECURE_REQUESTS, HeaderValue::from_static("1"));

        headers
    }
}

fn insert(headers: &mut HeaderMap, name: reqwest::header::HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(v) => {
            headers.insert(name, v);
        }
        Err(_) => tracing::warn!(header = %name, "dropping header with invalid value"),
    }
}

/// `https://host` or `https://host/` -> `https://host/`
fn site_root(base_url: &str) -> String {
    format!("{}/", base_url.trim_end_matches('/'))
}

/// Generate random English Accept-Language header
fn random_accept_language() -> String {
    let mut rng = rand::thread_rng();
    let languages = ["en-US,en;q=0.5", "en-US,en;q=0.9", "en-GB,en;q=0.9"];
    languages
        .choose(&mut rng)
        .copied()
        .unwrap_or("en-US,en;q=0.5")
        .to_string()
}
