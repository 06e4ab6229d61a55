//! facesort - groups uploaded photos into per-person albums.

mod config;
mod server;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use facesort_album::Workspace;
use facesort_embed::HttpEmbedder;
use facesort_pipeline::Processor;
use tracing::info;
use tracing_subscriber::EnvFilter;

use config::Config;

/// HTTP service that clusters uploaded photos by the person in them.
#[derive(Parser, Debug)]
#[command(name = "facesort")]
#[command(about = "Group photos into per-person albums")]
#[command(version)]
struct Args {
    /// Config file (YAML or JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address (e.g. :5000), overrides the config file
    #[arg(long)]
    listen: Option<String>,

    /// Data directory, overrides the config file
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Face representation service URL, overrides the config file
    #[arg(long)]
    embedder_url: Option<String>,

    /// Verbose output (debug logging)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let mut cfg = Config::load(args.config.as_deref())?;
    if let Some(listen) = args.listen {
        cfg.listen = listen;
    }
    if let Some(dir) = args.data_dir {
        cfg.data_dir = dir;
    }
    if let Some(url) = args.embedder_url {
        cfg.embedder.base_url = url;
    }

    let embedder = HttpEmbedder::with_config(&cfg.api_key(), cfg.embed_config());
    info!(
        data_dir = %cfg.data_dir.display(),
        model = embedder.model(),
        eps = cfg.eps,
        mode = ?cfg.publish_mode,
        "facesort: starting"
    );

    let workspace = Arc::new(Workspace::new(&cfg.data_dir));
    let processor = Arc::new(Processor::new(
        Arc::new(embedder),
        workspace,
        cfg.processor_config(),
    ));

    let app = server::router(processor, cfg.max_upload_bytes());
    server::serve(&cfg.listen, app).await
}

/// Logs to stderr. `RUST_LOG` takes precedence; otherwise `info`, or
/// `debug` with `--verbose`.
fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
