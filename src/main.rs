//! `streamsift` CLI - run the API server or exercise the pipeline from a shell

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use streamsift::http_client::{Fetcher, Site};
use streamsift::stream::{EpisodeAggregator, HostRegistry, MediaVerifier, ResolveContext};
use streamsift::{server, Config};

#[derive(Parser)]
#[command(name = "streamsift")]
#[command(about = "Episode stream extraction service")]
#[command(version)]
struct Cli {
    /// Config file (default: ~/.config/streamsift/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the HTTP API
    Serve {
        /// Listen address, overrides the config file
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Extract every stream source from an episode page
    Streams {
        /// Episode page URL
        url: String,
    },

    /// Resolve one file-host watch page to a direct media URL
    Resolve {
        /// Watch page URL
        url: String,

        /// Provider label as shown in the download table
        #[arg(long, default_value = "")]
        host: String,
    },

    /// Check that a URL serves media
    Verify {
        /// Candidate media URL
        url: String,
    },

    /// Fetch a page with a site's browser profile
    Fetch {
        /// URL to fetch
        url: String,

        /// Site profile to present
        #[arg(long, value_enum, default_value = "anime")]
        site: SiteArg,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum SiteArg {
    Anime,
    Comic,
}

impl From<SiteArg> for Site {
    fn from(arg: SiteArg) -> Self {
        match arg {
            SiteArg::Anime => Site::Anime,
            SiteArg::Comic => Site::Comic,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { bind } => cmd_serve(config, bind).await,
        Commands::Streams { url } => cmd_streams(&config, &url).await,
        Commands::Resolve { url, host } => cmd_resolve(&config, &url, &host).await,
        Commands::Verify { url } => cmd_verify(&config, &url).await,
        Commands::Fetch { url, site } => cmd_fetch(&config, &url, site.into()).await,
    }
}

async fn cmd_serve(mut config: Config, bind: Option<String>) -> Result<()> {
    if let Some(bind) = bind {
        config.bind = bind;
    }
    server::serve(&config).await
}

async fn cmd_streams(config: &Config, url: &str) -> Result<()> {
    let aggregator = EpisodeAggregator::from_config(config)?;
    let start = Instant::now();
    let result = aggregator.get_episode_streams(url).await;

    let json = match result {
        Some(result) => serde_json::to_string_pretty(&result)?,
        None => "{}".to_string(),
    };
    println!("{json}");
    eprintln!("⏱️  {:.2?}", start.elapsed());
    Ok(())
}

async fn cmd_resolve(config: &Config, url: &str, host: &str) -> Result<()> {
    let ctx = ResolveContext::new(Fetcher::for_site(Site::Anime, config)?);
    let registry = HostRegistry::new();

    let Some(resolver) = registry.select(host, url) else {
        anyhow::bail!(
            "No resolver for {url} (known: {})",
            registry.names().join(", ")
        );
    };
    println!("🔎 Resolver: {}", resolver.name());

    match registry.resolve(host, url, &ctx).await {
        Some(link) => {
            println!("{}", link.url);
            if !link.verified {
                println!("⚠️  Not verified (passed through)");
            }
            Ok(())
        }
        None => anyhow::bail!("No direct media URL found"),
    }
}

async fn cmd_verify(config: &Config, url: &str) -> Result<()> {
    let fetcher = Fetcher::for_site(Site::Anime, config)?;
    let verifier = MediaVerifier::new(&fetcher);

    let head = verifier
        .probe(url)
        .await
        .with_context(|| format!("HEAD {url} failed"))?;
    println!("📊 Status: {}", head.status);
    println!("📄 Content-Type: {}", head.content_type);
    println!("🔗 Final URL: {}", head.final_url);

    if MediaVerifier::accepts(&head) {
        println!("✅ Media");
        Ok(())
    } else {
        anyhow::bail!("{url} is not a media URL")
    }
}

async fn cmd_fetch(config: &Config, url: &str, site: Site) -> Result<()> {
    let fetcher = Fetcher::for_site(site, config)?;
    println!("🌐 Fetching: {url}");
    println!("🎭 User-Agent: {}", fetcher.profile().user_agent.for_attempt(0));

    let start = Instant::now();
    let body = match site {
        Site::Comic => fetcher
            .get_html(url)
            .await
            .context("no HTML page after all attempts")?,
        Site::Anime => fetcher.get_text(url).await?,
    };

    println!("📦 Size: {} bytes", body.len());
    println!("⏱️  Time: {:.2?}", start.elapsed());
    Ok(())
}
