use std::path::PathBuf;

use clap::Args;
use store::{SqliteStore, StoreError};

use crate::state::{AppConfig, AppState};

#[derive(Args, Debug, Clone)]
pub struct Init {
    /// Permission bits for newly created groups (create 1, read 2, update 4, delete 8, notify 16)
    #[arg(long, default_value_t = 15)]
    pub default_permission: u16,

    /// Default log level
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Write daily rolling log files into this directory
    #[arg(long)]
    pub log_dir: Option<PathBuf>,
}

#[derive(Debug, thiserror::Error)]
pub enum InitError {
    #[error("init failed: {0}")]
    StateFailed(#[from] crate::state::StateError),
    #[error("failed to create database: {0}")]
    Store(#[from] StoreError),
}

#[async_trait::async_trait]
impl crate::op::Op for Init {
    type Error = InitError;
    type Output = String;

    async fn execute(&self, ctx: &crate::op::OpContext) -> Result<Self::Output, Self::Error> {
        let config = AppConfig {
            default_permission: self.default_permission,
            log_level: self.log_level.clone(),
            log_dir: self.log_dir.clone(),
        };

        let state = AppState::init(ctx.config_path.clone(), Some(config))?;
        SqliteStore::new(&state.db_path).await?;

        let log_dir = match &state.config.log_dir {
            Some(dir) => dir.display().to_string(),
            None => "none (stderr only)".to_string(),
        };

        let output = format!(
            "Initialized gacl directory at: {}\n\
             - Database: {}\n\
             - Config: {}\n\
             - Default permission: {}\n\
             - Log level: {}\n\
             - Log directory: {}",
            state.gacl_dir.display(),
            state.db_path.display(),
            state.config_path.display(),
            state.config.default_permission,
            state.config.log_level,
            log_dir
        );

        Ok(output)
    }
}
