use anyhow::Context;
use avafav_core::{AvatarStore, Bridge, StoreConfig};
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "avafav")]
#[command(version, about = "Inspect and edit an avatar favorites store", long_about = None)]
struct Cli {
    /// Directory holding the favorites and cache files
    #[arg(long, env = "AVAFAV_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// TOML config file (overrides --data-dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Favorite an avatar (JSON CacheEntry record) into a category
    Add {
        /// Category name
        #[arg(short, long)]
        category: String,
        /// CacheEntry record as JSON
        item: String,
    },
    /// Remove an avatar from one category
    Remove { item_id: String, category: String },
    /// Remove an avatar from every category
    RemoveAll { item_id: String },
    /// Overwrite cached metadata for an already cached avatar
    Refresh {
        /// CacheEntry record as JSON
        item: String,
    },
    /// List favorites joined with their cached metadata
    Favorites {
        /// The game client is running - read through a snapshot
        #[arg(long)]
        game_running: bool,
    },
    /// List every cached avatar
    Cached {
        #[arg(long)]
        game_running: bool,
    },
    /// Create or overwrite a category (JSON Category record)
    SetCategory { category: String },
    /// Delete a category and its memberships
    RemoveCategory { name: String },
    /// List categories
    Categories {
        #[arg(long)]
        game_running: bool,
    },
}

fn main() -> anyhow::Result<()> {
    // Initialize logging - helps when things go sideways
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "avafav=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let Some(command) = cli.command else {
        println!("No command specified. Try --help");
        return Ok(());
    };

    let config = match (cli.config, cli.data_dir) {
        (Some(path), _) => StoreConfig::load(&path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        (None, Some(dir)) => StoreConfig::in_dir(dir),
        (None, None) => StoreConfig::in_dir(StoreConfig::default_dir()?),
    };
    tracing::debug!("Using data dir {}", config.data_dir.display());

    let bridge = Bridge::new(AvatarStore::open(config)?);

    match command {
        Commands::Add { category, item } => {
            bridge.add_favorite(&item, &category)?;
        }
        Commands::Remove { item_id, category } => {
            println!("{}", bridge.remove_favorite(&item_id, &category)?);
        }
        Commands::RemoveAll { item_id } => {
            println!("{}", bridge.remove_all_favorites(&item_id)?);
        }
        Commands::Refresh { item } => {
            println!("{}", bridge.refresh_cache_entry(&item)?);
        }
        Commands::Favorites { game_running } => {
            print_json(&bridge.list_favorites(game_running)?)?;
        }
        Commands::Cached { game_running } => {
            print_json(&bridge.list_cached_items(game_running)?)?;
        }
        Commands::SetCategory { category } => {
            bridge.upsert_category(&category)?;
        }
        Commands::RemoveCategory { name } => {
            println!("{}", bridge.remove_category(&name)?);
        }
        Commands::Categories { game_running } => {
            print_json(&bridge.list_categories(game_running)?)?;
        }
    }

    Ok(())
}

/// Pretty-print a JSON array from the bridge so humans can read it
fn print_json(raw: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(raw)?;
    println!("{}", serde_json::to_string_pretty(&value)?);
    Ok(())
}
