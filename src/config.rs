//! Configuration for the listing service.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (LISTINGS_HOME, LISTINGS_DB, LISTINGS_IMAGE_DIR,
//!    LISTINGS_ADDRESS, FRONT_URL)
//! 2. Config file (.listings/config.yaml)
//! 3. Defaults (~/.listings)
//!
//! Config file discovery:
//! - Searches current directory and parents for .listings/config.yaml
//! - Paths in config file are relative to the project root (the parent of
//!   .listings/)

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::storage::DEFAULT_IMAGE_NAME;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

pub const DEFAULT_ADDRESS: &str = "0.0.0.0:9000";
pub const DEFAULT_FRONT_URL: &str = "http://localhost:3000";
pub const DEFAULT_POOL_SIZE: usize = 8;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub server: Option<ServerConfig>,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// Data directory
    pub home: Option<String>,
    /// SQLite database file
    pub database: Option<String>,
    /// Image directory
    pub images: Option<String>,
    /// Placeholder image
    pub default_image: Option<String>,
    /// Directory with categories.sql / items.sql overriding the built-in schema
    pub schema_dir: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub address: Option<String>,
    pub front_url: Option<String>,
    pub max_upload_bytes: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub pool_size: Option<usize>,
}

/// Resolved configuration with absolute paths
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Data directory
    pub home: PathBuf,
    /// SQLite database file
    pub db_path: PathBuf,
    /// Content-addressed image directory
    pub image_dir: PathBuf,
    /// Image served when an item's blob is missing
    pub default_image: PathBuf,
    /// External schema directory, if any
    pub schema_dir: Option<PathBuf>,
    /// Address the HTTP server binds to
    pub address: String,
    /// Origin allowed by CORS
    pub front_url: String,
    /// Maximum pooled database connections
    pub pool_size: usize,
    /// Maximum accepted request body for uploads
    pub max_upload_bytes: usize,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl ResolvedConfig {
    /// Defaults rooted at `home`
    pub fn with_home(home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let image_dir = home.join("images");
        Self {
            db_path: home.join("listings.sqlite3"),
            default_image: image_dir.join(DEFAULT_IMAGE_NAME),
            image_dir,
            home,
            schema_dir: None,
            address: DEFAULT_ADDRESS.to_string(),
            front_url: DEFAULT_FRONT_URL.to_string(),
            pool_size: DEFAULT_POOL_SIZE,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            config_file: None,
        }
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".listings").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}

/// A set, non-empty environment variable
fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env_value(key).map(PathBuf::from)
}

/// Layer a parsed config file and the environment over the defaults
fn resolve(file: Option<(&Path, ConfigFile)>, default_home: PathBuf) -> ResolvedConfig {
    let (base_dir, paths, server, database, config_file) = match file {
        Some((config_path, config)) => {
            // .listings/config.yaml -> project root
            let base_dir = config_path
                .parent()
                .and_then(|p| p.parent())
                .unwrap_or(Path::new("."))
                .to_path_buf();
            (
                Some(base_dir),
                config.paths,
                config.server,
                config.database,
                Some(config_path.to_path_buf()),
            )
        }
        None => (None, PathsConfig::default(), None, None, None),
    };

    let from_file = |value: &Option<String>| -> Option<PathBuf> {
        let value = value.as_deref()?;
        Some(match &base_dir {
            Some(base) => resolve_path(base, value),
            None => PathBuf::from(value),
        })
    };

    let home = env_path("LISTINGS_HOME")
        .or_else(|| from_file(&paths.home))
        .unwrap_or(default_home);

    let mut config = ResolvedConfig::with_home(home);
    config.config_file = config_file;

    if let Some(db) = env_path("LISTINGS_DB").or_else(|| from_file(&paths.database)) {
        config.db_path = db;
    }

    if let Some(images) = env_path("LISTINGS_IMAGE_DIR").or_else(|| from_file(&paths.images)) {
        config.default_image = images.join(DEFAULT_IMAGE_NAME);
        config.image_dir = images;
    }

    if let Some(default_image) = from_file(&paths.default_image) {
        config.default_image = default_image;
    }

    config.schema_dir = from_file(&paths.schema_dir);

    if let Some(server) = server {
        if let Some(address) = server.address {
            config.address = address;
        }
        if let Some(front_url) = server.front_url {
            config.front_url = front_url;
        }
        if let Some(limit) = server.max_upload_bytes {
            config.max_upload_bytes = limit;
        }
    }

    if let Some(pool_size) = database.and_then(|d| d.pool_size) {
        config.pool_size = pool_size.max(1);
    }

    if let Some(address) = env_value("LISTINGS_ADDRESS") {
        config.address = address;
    }
    if let Some(front_url) = env_value("FRONT_URL") {
        config.front_url = front_url;
    }

    config
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".listings");

    let config_file = find_config_file();
    let parsed = match config_file {
        Some(ref path) => Some((path.as_path(), load_config_file(path)?)),
        None => None,
    };

    Ok(resolve(parsed, default_home))
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}
