use std::{fs, path::PathBuf};

use serde::{Deserialize, Serialize};

pub const APP_NAME: &str = "gacl";
pub const CONFIG_FILE_NAME: &str = "config.toml";
pub const DB_FILE_NAME: &str = "db.sqlite";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Permission bits stamped on newly created groups
    #[serde(default = "default_permission")]
    pub default_permission: u16,
    /// Default log level when RUST_LOG is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily rolling log files (stderr only when unset)
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
}

fn default_permission() -> u16 {
    15
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_permission: default_permission(),
            log_level: default_log_level(),
            log_dir: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the gacl directory (~/.gacl)
    pub gacl_dir: PathBuf,
    /// Path to the SQLite database
    pub db_path: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the gacl directory path (custom or default ~/.gacl)
    pub fn gacl_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new gacl state directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let gacl_dir = Self::gacl_dir(custom_path)?;

        if gacl_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&gacl_dir)?;

        let config = config.unwrap_or_default();
        let config_path = gacl_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        // schema is created when the store is first opened
        let db_path = gacl_dir.join(DB_FILE_NAME);
        fs::write(&db_path, "")?;

        Ok(Self {
            gacl_dir,
            db_path,
            config_path,
            config,
        })
    }

    /// Load existing state from the gacl directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let gacl_dir = Self::gacl_dir(custom_path)?;

        if !gacl_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let db_path = gacl_dir.join(DB_FILE_NAME);
        let config_path = gacl_dir.join(CONFIG_FILE_NAME);

        if !db_path.exists() {
            return Err(StateError::MissingFile(DB_FILE_NAME.to_string()));
        }
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            gacl_dir,
            db_path,
            config_path,
            config,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("gacl directory not initialized. Run 'gacl init' first")]
    NotInitialized,

    #[error("gacl directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}
