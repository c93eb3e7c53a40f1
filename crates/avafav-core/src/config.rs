use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Where the store files live
///
/// Finding the directory is the host's job (it knows where the game keeps its
/// data). Whatever it finds gets threaded into the repositories through this,
/// so tests can point everything at a temp dir.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    pub data_dir: PathBuf,

    /// Memberships + categories
    #[serde(default = "default_favorites_file")]
    pub favorites_file: String,

    /// Cached avatar metadata
    #[serde(default = "default_store_file")]
    pub store_file: String,
}

fn default_favorites_file() -> String {
    "favorites.db".to_string()
}

fn default_store_file() -> String {
    "avatar-cache.db".to_string()
}

impl StoreConfig {
    /// Default file names inside `dir`
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            data_dir: dir.into(),
            favorites_file: default_favorites_file(),
            store_file: default_store_file(),
        }
    }

    /// Load from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        let config: StoreConfig = toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to disk
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();

        // Create config directory if it doesn't exist
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Fallback directory for standalone use (the CLI). The embedding
    /// application is expected to supply its own.
    pub fn default_dir() -> crate::Result<PathBuf> {
        Ok(dirs::data_dir()
            .ok_or_else(|| crate::Error::ConfigError("Could not find data directory".into()))?
            .join("avafav"))
    }

    pub fn favorites_path(&self) -> PathBuf {
        self.data_dir.join(&self.favorites_file)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(&self.store_file)
    }

    /// Both files must be plain names in `data_dir`, and distinct
    pub fn validate(&self) -> crate::Result<()> {
        for name in [&self.favorites_file, &self.store_file] {
            let plain = Path::new(name).file_name().map(|n| n == name.as_str());
            if name.is_empty() || plain != Some(true) {
                return Err(crate::Error::ConfigError(format!(
                    "Store file name must be a plain file name, got '{}'",
                    name
                )));
            }
        }

        if self.favorites_file == self.store_file {
            return Err(crate::Error::ConfigError(
                "favorites_file and store_file must differ".into(),
            ));
        }

        Ok(())
    }
}
