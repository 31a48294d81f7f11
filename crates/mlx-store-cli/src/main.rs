//! MLX Store CLI - manage the local cache of MLX model bundles.
//!
//! Logs go to stderr so `--json` output on stdout stays machine-readable.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mlx_store::{ModelStore, NetworkConfig, StoreConfig};
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser, Debug)]
#[command(name = "mlx-store")]
#[command(about = "Local cache and fetcher for MLX model bundles")]
struct Args {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Cache root (defaults to MLX_STORE_DIR, then OLLAMA_MODELS/mlx, then ~/.ollama/models/mlx)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List cached bundles
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Show metadata for one cached bundle
    Show {
        reference: String,
        #[arg(long)]
        json: bool,
    },
    /// Fetch a bundle unless it is already cached
    Pull { reference: String },
    /// Remove a cached bundle
    Rm { reference: String },
    /// Search the hub for MLX bundles
    Search {
        query: String,
        #[arg(short, long, default_value_t = NetworkConfig::DEFAULT_SEARCH_LIMIT)]
        limit: usize,
        #[arg(long)]
        json: bool,
    },
    /// Print the local directory a reference maps to
    Path { reference: String },
    /// List recommended bundles
    Popular,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over --debug when set
    let default_level = if args.debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let mut config = StoreConfig::from_env()?;
    if let Some(dir) = args.store_dir {
        config.cache_root = dir;
    }
    debug!("Cache root: {}", config.cache_root.display());

    let store = ModelStore::new(config)?;

    match args.command {
        Command::List { json } => commands::list(&store, json),
        Command::Show { reference, json } => commands::show(&store, &reference, json),
        Command::Pull { reference } => commands::pull(&store, &reference).await,
        Command::Rm { reference } => commands::remove(&store, &reference).await,
        Command::Search { query, limit, json } => {
            commands::search(&store, &query, limit, json).await
        }
        Command::Path { reference } => {
            println!("{}", store.resolve_path(&reference).display());
            Ok(())
        }
        Command::Popular => {
            for reference in store.popular_models() {
                let marker = if store.exists(reference) { "*" } else { " " };
                println!("{} {}", marker, reference);
            }
            Ok(())
        }
    }
}
