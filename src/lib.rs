//! `streamsift` - episode stream extraction service
//!
//! # Features
//!
//! - **Stream aggregation**: embedded player, AJAX alternate players, download
//!   table and inline scripts of one episode page, merged and ranked
//! - **Host resolvers**: per-provider watch-page resolution to direct
//!   `.mp4`/`.m3u8` URLs, verified by `Content-Type`
//! - **Retrying fetcher**: per-site browser headers, exponential backoff,
//!   user-agent rotation
//! - **HTTP API**: JSON endpoints for the aggregator and the app version record
//!
//! # Example
//!
//! ```rust,no_run
//! use streamsift::{Config, EpisodeAggregator};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let aggregator = EpisodeAggregator::from_config(&Config::default())?;
//!     if let Some(result) = aggregator
//!         .get_episode_streams("https://winbu.tv/episode/example-episode-1/")
//!         .await
//!     {
//!         println!("{:?}", result.stream_url);
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod fingerprint;
pub mod http_client;
pub mod server;
pub mod stream;
pub mod version;

pub use config::Config;
pub use error::{FetchError, FetchResult};
pub use fingerprint::BrowserProfile;
pub use http_client::{FetchPolicy, Fetcher, Site};
pub use stream::{EpisodeAggregator, EpisodeStreamResult, HostRegistry, MediaVerifier};
pub use version::{AppVersion, VersionStore};

/// Version of streamsift
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
