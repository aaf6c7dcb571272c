//! slugdex RPC server and build tool.
//!
//! `serve` exposes the slug index over JSON-RPC 2.0; `build` regenerates the
//! SQLite store from a partitioned corpus and exits.

mod handler;
mod server;
mod wrapper;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use slugdex_core::{IndexBuilder, IndexSettings, SlugIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "slugdex-rpc")]
#[command(about = "Slug resolution index: JSON-RPC server and build tool")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the slug database from a partitioned corpus
    Build(BuildArgs),
    /// Serve slug queries over JSON-RPC
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    /// Corpus root holding the sitemap-* partitions (defaults to SLUG_LINKS_DIR)
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Database to write (defaults to SLUG_DB_PATH, then ./slugs.db)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Skip the final FTS5 optimize and VACUUM
    #[arg(long)]
    no_compact: bool,
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Port to listen on (0 = auto-assign)
    #[arg(short, long, default_value = "0")]
    port: u16,

    /// Host to bind to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Slug database (defaults to SLUG_DB_PATH, then ./slugs.db)
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Corpus to build from when the database is missing (defaults to SLUG_LINKS_DIR)
    #[arg(long)]
    source_root: Option<PathBuf>,

    /// Idle SQLite connections kept for reuse (defaults to the CPU count)
    #[arg(long)]
    max_idle_connections: Option<usize>,

    /// Do not open or build the index before accepting requests
    #[arg(long)]
    no_warm: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    let log_level = if cli.debug { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Command::Build(args) => run_build(args).await,
        Command::Serve(args) => run_serve(args).await,
    }
}

async fn run_build(args: BuildArgs) -> Result<()> {
    let env = IndexSettings::from_env();
    let dest = args.output.unwrap_or(env.db_path);
    let Some(source_root) = args.source_root.or(env.source_root) else {
        error!("No source corpus given; pass --source-root or set SLUG_LINKS_DIR");
        bail!("missing source root");
    };
    if !source_root.is_dir() {
        error!("Source corpus not found: {}", source_root.display());
        bail!("source root {} does not exist", source_root.display());
    }

    let builder = IndexBuilder::new().compact(!args.no_compact);
    let report = tokio::task::spawn_blocking(move || builder.build(&source_root, &dest))
        .await
        .context("build task panicked")??;

    if report.record_count == 0 {
        error!("Build loaded no slugs");
        bail!("no slugs loaded");
    }

    info!(
        "Built {} slugs from {} partitions ({} skipped)",
        report.record_count, report.partitions_read, report.partitions_skipped
    );
    Ok(())
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    info!("Starting slugdex RPC server");

    let mut settings = IndexSettings::from_env();
    if let Some(db_path) = args.db_path {
        settings.db_path = db_path;
    }
    if let Some(source_root) = args.source_root {
        settings.source_root = Some(source_root);
    }
    if let Some(max) = args.max_idle_connections {
        settings = settings.with_max_idle_connections(max);
    }

    let index = Arc::new(SlugIndex::new(settings));

    if args.no_warm {
        info!("Skipping index warm-up");
    } else {
        let warming = Arc::clone(&index);
        let warmed = tokio::task::spawn_blocking(move || warming.warm()).await?;
        if !warmed {
            warn!("Slug index unavailable; queries will return empty results");
        }
    }

    let addr = server::start_server(index, &args.host, args.port).await?;

    // Intentional stdout for the parent process
    println!("RPC_PORT={}", addr.port());

    info!("RPC server running on {}", addr);

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received, exiting");

    Ok(())
}
