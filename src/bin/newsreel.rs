use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use newsreel::pipeline::{Pipeline, RunState};
use newsreel::{FeedConfig, FeedService, FfmpegEncoder, FrameStyle, NewsreelApp};

#[derive(Parser, Debug)]
#[command(name = "newsreel", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the generation API over HTTP.
    Serve(ServeArgs),
    /// Run one generation and write the MP4 to disk (requires `ffmpeg` on PATH).
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct ServeArgs {
    /// Listen address.
    #[arg(long, default_value = "127.0.0.1:8080")]
    listen: SocketAddr,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Output MP4 path.
    #[arg(long)]
    out: PathBuf,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Parser, Debug)]
struct CommonArgs {
    /// Upstream RSS feed URL.
    #[arg(long, env = "NEWSREEL_FEED_URL", default_value = newsreel::DEFAULT_FEED_URL)]
    feed_url: String,

    /// Encoder scratch directory.
    #[arg(long, env = "NEWSREEL_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Title-card font file (TTF/OTF).
    #[arg(long)]
    font: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Serve(args) => cmd_serve(args).await,
        Command::Render(args) => cmd_render(args).await,
    }
}

fn build_pipeline(common: &CommonArgs) -> anyhow::Result<Pipeline> {
    let feed = FeedService::new(FeedConfig::default().with_url(common.feed_url.clone()))?;
    let style = FrameStyle::load(common.font.as_deref())?;
    let work_dir = common
        .work_dir
        .clone()
        .unwrap_or_else(|| std::env::temp_dir().join("newsreel"));
    let encoder = FfmpegEncoder::new(work_dir);
    Ok(Pipeline::new(feed, style, Box::new(encoder)))
}

async fn cmd_serve(args: ServeArgs) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&args.common)?;
    let app = Arc::new(NewsreelApp::new(pipeline));
    newsreel::serve(app, args.listen).await?;
    Ok(())
}

async fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let pipeline = build_pipeline(&args.common)?;

    let observer: newsreel::StateObserver = Arc::new(|state: RunState| {
        tracing::info!(status = state.label(), percent = state.percent(), "progress");
    });
    let video = pipeline.produce_video(observer).await?;

    if let Some(parent) = args.out.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, &video)
        .with_context(|| format!("write mp4 '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
