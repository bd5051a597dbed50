use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 6540;
const DEFAULT_LIBRARY_NAME: &str = "Media Library";
const DEFAULT_DATA_DIR: &str = "data";
const DEFAULT_CACHE_CAPACITY: usize = 1000;
const DEFAULT_CACHE_MAX_SIZE: u64 = 512 * 1024 * 1024;
const DEFAULT_BATCH_SIZE: usize = 100;
const DEFAULT_DELAY_MS: u64 = 500;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Contents of the TOML config file. Every key is optional and unknown keys
/// are ignored, so older files keep working.
#[derive(Deserialize, Default, Debug)]
pub struct FileConfig {
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub library: LibrarySection,
    #[serde(default)]
    pub database: DatabaseSection,
    #[serde(default)]
    pub thumbnails: ThumbnailsSection,
    #[serde(default)]
    pub processing: ProcessingSection,
    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Deserialize, Default, Debug)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Deserialize, Default, Debug)]
pub struct LibrarySection {
    pub path: Option<PathBuf>,
    pub name: Option<String>,
}

#[derive(Deserialize, Default, Debug)]
pub struct DatabaseSection {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Default, Debug)]
pub struct ThumbnailsSection {
    pub output_dir: Option<PathBuf>,
    pub cache_capacity: Option<usize>,
    /// Bytes.
    pub cache_max_size: Option<u64>,
}

#[derive(Deserialize, Default, Debug)]
pub struct ProcessingSection {
    pub enabled: Option<bool>,
    pub batch_size: Option<usize>,
    pub delay_ms: Option<u64>,
}

#[derive(Deserialize, Default, Debug)]
pub struct LoggingSection {
    pub level: Option<String>,
}

/// Effective settings after merging CLI flags, the config file and defaults.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub library_path: Option<PathBuf>,
    pub library_name: String,
    /// `None` keeps the library in memory.
    pub database_path: Option<PathBuf>,
    pub thumbnail_dir: PathBuf,
    pub cache_capacity: usize,
    pub cache_max_size: u64,
    pub background: bool,
    pub batch_size: usize,
    pub delay: Duration,
    pub log_level: String,
}

impl Config {
    /// CLI beats the config file, the config file beats defaults.
    pub fn resolve(file: Option<FileConfig>, args: &crate::cli::Args) -> Self {
        let file = file.unwrap_or_default();
        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR));

        let database_path = if args.in_memory {
            None
        } else {
            Some(
                file.database
                    .path
                    .unwrap_or_else(|| data_dir.join("library.db")),
            )
        };

        Config {
            host: args
                .host
                .clone()
                .or(file.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: args.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            library_path: args.library.clone().or(file.library.path),
            library_name: args
                .name
                .clone()
                .or(file.library.name)
                .unwrap_or_else(|| DEFAULT_LIBRARY_NAME.to_string()),
            database_path,
            thumbnail_dir: file
                .thumbnails
                .output_dir
                .unwrap_or_else(|| data_dir.join("thumbnails")),
            cache_capacity: file
                .thumbnails
                .cache_capacity
                .unwrap_or(DEFAULT_CACHE_CAPACITY),
            cache_max_size: file
                .thumbnails
                .cache_max_size
                .unwrap_or(DEFAULT_CACHE_MAX_SIZE),
            background: !args.no_background && file.processing.enabled.unwrap_or(true),
            batch_size: file.processing.batch_size.unwrap_or(DEFAULT_BATCH_SIZE).max(1),
            delay: Duration::from_millis(file.processing.delay_ms.unwrap_or(DEFAULT_DELAY_MS)),
            log_level: file
                .logging
                .level
                .unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
        }
    }
}

pub fn find_config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_owned());
    }
    let cwd_config = PathBuf::from("reelshelf.toml");
    if cwd_config.exists() {
        return Some(cwd_config);
    }
    let xdg_config = dirs::config_dir()?.join("reelshelf").join("config.toml");
    xdg_config.exists().then_some(xdg_config)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

pub fn load_config(path: &Path) -> Result<FileConfig, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}
