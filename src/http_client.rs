//! Retrying HTTP Client
//!
//! Features:
//! - Browser header set per site (see [`crate::fingerprint`])
//! - Exponential backoff on transport errors and non-2xx statuses
//! - Per-attempt user-agent rotation and courtesy delay for sites that need it
//! - HEAD probes that follow redirects and report the final URL
//!
//! The retry policy and header profile are immutable values owned by each
//! [`Fetcher`]; deriving a fetcher with another policy never affects others.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, Response, StatusCode};
use tracing::{debug, info, instrument, warn};

use crate::config::Config;
use crate::error::{FetchError, FetchResult};
use crate::fingerprint::BrowserProfile;

/// Which scraped site a fetcher is presenting itself to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Site {
    /// Episode pages and the file hosts they link to.
    Anime,
    /// Comic site: rotating agents, courtesy delay, HTML only.
    Comic,
}

/// Retry behaviour for one fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchPolicy {
    pub max_attempts: u32,
    /// Delay after the first failure; doubled after every further failure.
    pub initial_backoff: Duration,
    /// Fixed pause inserted before every attempt, independent of backoff.
    pub courtesy_delay: Option<Duration>,
}

impl FetchPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            initial_backoff: config.initial_backoff(),
            courtesy_delay: None,
        }
    }

    /// Single attempt, no delays. Used for media verification probes.
    pub fn probe() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff: Duration::ZERO,
            courtesy_delay: None,
        }
    }

    /// Backoff slept after failed attempt number `attempt` (0-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(attempt))
    }
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Source of delays. Swapped out in tests to observe backoff without waiting.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real delays via the tokio timer.
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Successful GET/POST with its body read.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// URL after redirects.
    pub url: String,
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

/// Outcome of a HEAD request after redirects.
#[derive(Debug, Clone)]
pub struct HeadResponse {
    pub final_url: String,
    pub status: StatusCode,
    /// Lowercased `Content-Type`, empty when absent.
    pub content_type: String,
}

/// HTTP client with a site header profile and retry policy
#[derive(Clone)]
pub struct Fetcher {
    client: Client,
    profile: Arc<BrowserProfile>,
    policy: FetchPolicy,
    sleeper: Arc<dyn Sleeper>,
}

impl Fetcher {
    /// Create a fetcher with its own connection pool.
    pub fn new(
        profile: BrowserProfile,
        policy: FetchPolicy,
        timeout: Duration,
    ) -> FetchResult<Self> {
        let client = Client::builder()
            .http2_adaptive_window(true)
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .tcp_nodelay(true)
            .use_rustls_tls()
            .brotli(true)
            .zstd(true)
            .gzip(true)
            .deflate(true)
            .connect_timeout(timeout)
            .timeout(timeout)
            // HEAD probes must land on the real media URL
            .redirect(reqwest::redirect::Policy::limited(10))
            .cookie_store(true)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            profile: Arc::new(profile),
            policy,
            sleeper: Arc::new(TokioSleeper),
        })
    }

    /// Fetcher preconfigured for one of the scraped sites.
    pub fn for_site(site: Site, config: &Config) -> FetchResult<Self> {
        let (profile, policy) = match site {
            Site::Anime => (
                BrowserProfile::desktop(&config.anime_base_url),
                FetchPolicy::from_config(config),
            ),
            Site::Comic => (
                BrowserProfile::rotating(&config.comic_base_url),
                FetchPolicy {
                    courtesy_delay: Some(config.courtesy_delay()),
                    ..FetchPolicy::from_config(config)
                },
            ),
        };
        Self::new(profile, policy, config.request_timeout())
    }

    #[must_use]
    pub fn with_sleeper(mut self, sleeper: Arc<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    /// Same connection pool and profile, different retry policy.
    #[must_use]
    pub fn with_policy(&self, policy: FetchPolicy) -> Self {
        Self {
            policy,
            ..self.clone()
        }
    }

    pub fn profile(&self) -> &BrowserProfile {
        &self.profile
    }

    pub fn policy(&self) -> &FetchPolicy {
        &self.policy
    }

    /// GET with retries; body is read once the response succeeded.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get(&self, url: &str) -> FetchResult<FetchedPage> {
        let response = self.send_with_retry(Method::GET, url, None).await?;
        read_page(url, response).await
    }

    pub async fn get_text(&self, url: &str) -> FetchResult<String> {
        Ok(self.get(url).await?.body)
    }

    /// GET that maps every failure to `None`.
    pub async fn get_page(&self, url: &str) -> Option<String> {
        match self.get_text(url).await {
            Ok(body) => Some(body),
            Err(e) => {
                warn!(url = %url, error = %e, "Giving up on page");
                None
            }
        }
    }

    /// GET that additionally requires an HTML content type.
    ///
    /// A successful response with another type is not retried.
    pub async fn get_html(&self, url: &str) -> Option<String> {
        let page = match self.get(url).await {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %url, error = %e, "Giving up on page");
                return None;
            }
        };
        let content_type = page.content_type.as_deref().unwrap_or_default();
        if content_type.to_lowercase().contains("text/html") {
            Some(page.body)
        } else {
            warn!(url = %url, content_type = %content_type, "Unexpected Content-Type");
            None
        }
    }

    /// HEAD following redirects. Non-2xx statuses are retried like GET.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn head(&self, url: &str) -> FetchResult<HeadResponse> {
        let response = self.send_with_retry(Method::HEAD, url, None).await?;
        Ok(HeadResponse {
            final_url: response.url().to_string(),
            status: response.status(),
            content_type: header_content_type(&response)
                .unwrap_or_default()
                .to_lowercase(),
        })
    }

    /// Form-encoded POST with retries.
    #[instrument(skip(self, form), fields(url = %url))]
    pub async fn post_form(
        &self,
        url: &str,
        form: &[(&str, &str)],
    ) -> FetchResult<FetchedPage> {
        let response = self.send_with_retry(Method::POST, url, Some(form)).await?;
        read_page(url, response).await
    }

    async fn send_with_retry(
        &self,
        method: Method,
        url: &str,
        form: Option<&[(&str, &str)]>,
    ) -> FetchResult<Response> {
        let attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            if let Some(delay) = self.policy.courtesy_delay {
                self.sleeper.sleep(delay).await;
            }

            let headers = self.profile.headers_for_attempt(attempt);
            debug!(
                attempt = attempt + 1,
                user_agent = self.profile.user_agent.for_attempt(attempt),
                "Sending {method}"
            );

            let mut request = self.client.request(method.clone(), url).headers(headers);
            if let Some(form) = form {
                request = request.form(form);
            }

            let error = match request.send().await {
                Ok(response) if response.status().is_success() => {
                    info!(
                        status = %response.status(),
                        version = ?response.version(),
                        "Response received"
                    );
                    return Ok(response);
                }
                Ok(response) => FetchError::Status {
                    url: url.to_string(),
                    status: response.status(),
                },
                Err(source) => FetchError::Transport {
                    url: url.to_string(),
                    source,
                },
            };

            if attempt + 1 >= attempts {
                warn!(attempts, error = %error, "Failed to fetch after all attempts");
                return Err(error);
            }

            let delay = self.policy.backoff_for(attempt);
            warn!(
                attempt = attempt + 1,
                error = %error,
                "Retrying in {:?}",
                delay
            );
            self.sleeper.sleep(delay).await;
            attempt += 1;
        }
    }
}

async fn read_page(url: &str, response: Response) -> FetchResult<FetchedPage> {
    let final_url = response.url().to_string();
    let status = response.status();
    let content_type = header_content_type(&response).map(str::to_string);
    let body = response
        .text()
        .await
        .map_err(|source| FetchError::Transport {
            url: url.to_string(),
            source,
        })?;

    Ok(FetchedPage {
        url: final_url,
        status,
        content_type,
        body,
    })
}

fn header_content_type(response: &Response) -> Option<&str> {
    response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_initial_delay() {
        let policy = FetchPolicy::default();
        assert_eq!(policy.backoff_for(0), Duration::from_secs(2));
        assert_eq!(policy.backoff_for(1), Duration::from_secs(4));
        assert_eq!(policy.backoff_for(2), Duration::from_secs(8));
    }

    #[test]
    fn probe_policy_is_single_attempt() {
        let policy = FetchPolicy::probe();
        assert_eq!(policy.max_attempts, 1);
        assert!(policy.courtesy_delay.is_none());
    }

    #[test]
    fn zero_attempts_in_config_still_tries_once() {
        let config = Config {
            max_attempts: 0,
            ..Config::default()
        };
        assert_eq!(FetchPolicy::from_config(&config).max_attempts, 1);
    }

    #[test]
    fn comic_site_gets_rotation_and_courtesy_delay() {
        let config = Config::default();
        let fetcher = Fetcher::for_site(Site::Comic, &config).unwrap();
        assert!(fetcher.profile().user_agent.rotates());
        assert_eq!(
            fetcher.policy().courtesy_delay,
            Some(Duration::from_secs(1))
        );
        assert_eq!(fetcher.profile().referer, "https://komikindo.ch/");
    }

    #[test]
    fn anime_site_has_no_courtesy_delay() {
        let fetcher = Fetcher::for_site(Site::Anime, &Config::default()).unwrap();
        assert!(!fetcher.profile().user_agent.rotates());
        assert!(fetcher.policy().courtesy_delay.is_none());
        assert_eq!(fetcher.profile().referer, "https://winbu.tv/");
    }

    #[test]
    fn with_policy_keeps_profile() {
        let fetcher = Fetcher::for_site(Site::Anime, &Config::default()).unwrap();
        let probe = fetcher.with_policy(FetchPolicy::probe());
        assert_eq!(probe.policy().max_attempts, 1);
        assert_eq!(fetcher.policy().max_attempts, 3);
        assert_eq!(probe.profile().referer, fetcher.profile().referer);
    }
}
