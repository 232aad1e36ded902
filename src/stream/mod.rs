//! Episode stream discovery
//!
//! Extracts playable URLs from an episode page: the embedded player, the
//! AJAX-served alternate players, the download table (resolved per file
//! host) and media literals left in inline scripts.

pub mod ajax;
pub mod episode;
pub mod hosts;
pub mod markup;
pub mod types;
pub mod verify;

pub use ajax::AjaxEmbedClient;
pub use episode::{EpisodeAggregator, EpisodePage};
pub use hosts::{HostRegistry, HostResolver, ResolveContext, ResolvedLink};
pub use types::{AjaxStream, DownloadLink, EpisodeStreamResult, StreamCandidate};
pub use verify::MediaVerifier;
