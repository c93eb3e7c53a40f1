// Avatar favorites store - memberships, categories and a metadata cache,
// readable even while the game client has the files locked
pub mod bridge;
pub mod categories;
pub mod config;
pub mod error;
pub mod favorites;
pub mod models;
pub mod snapshot;

pub use avafav_store::Upserted;
pub use bridge::Bridge;
pub use categories::CategoryRepository;
pub use config::StoreConfig;
pub use error::Error;
pub use favorites::FavoritesRepository;
pub use models::{CacheEntry, Category, FavoriteMembership};

use tracing::{debug, info};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;

/// Entry point: a validated config plus the two repositories built from it
///
/// Holds no connections and no cached data between calls. Every operation
/// opens the files it needs and closes them before returning.
#[derive(Debug, Clone)]
pub struct AvatarStore {
    config: StoreConfig,
}

impl AvatarStore {
    /// Validate the config, make sure the data directory exists and clear out
    /// snapshot copies a previous crashed process may have left around
    pub fn open(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.data_dir)?;

        let swept = snapshot::sweep_stale(
            &config.data_dir,
            &[config.favorites_file.as_str(), config.store_file.as_str()],
        )?;
        if swept > 0 {
            info!("Cleaned up {} stale snapshot files", swept);
        }

        debug!("Opened avatar store in {}", config.data_dir.display());
        Ok(Self { config })
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn favorites(&self) -> FavoritesRepository {
        FavoritesRepository::new(&self.config)
    }

    pub fn categories(&self) -> CategoryRepository {
        CategoryRepository::new(&self.config)
    }
}
