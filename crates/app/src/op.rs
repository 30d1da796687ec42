use std::error::Error;
use std::path::PathBuf;

use common::group::Permission;
use common::manager::GroupManager;
use common::policy::GroupPolicy;
use store::{SqliteStore, StoreError};

use crate::state::{AppState, StateError};

/// Group manager wired to the on-disk store.
pub type Manager = GroupManager<SqliteStore, SqliteStore, GroupPolicy<SqliteStore>>;

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error(transparent)]
    State(#[from] StateError),
    #[error("failed to open store: {0}")]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone)]
pub struct OpContext {
    /// Optional custom config path (defaults to ~/.gacl)
    pub config_path: Option<PathBuf>,
}

impl OpContext {
    pub fn new(config_path: Option<PathBuf>) -> Self {
        Self { config_path }
    }

    pub fn state(&self) -> Result<AppState, ContextError> {
        Ok(AppState::load(self.config_path.clone())?)
    }

    pub async fn store(&self) -> Result<SqliteStore, ContextError> {
        let state = self.state()?;
        Ok(SqliteStore::new(&state.db_path).await?)
    }

    /// A manager using the store both for group records and device ACLs.
    pub async fn manager(&self) -> Result<Manager, ContextError> {
        let state = self.state()?;
        let store = SqliteStore::new(&state.db_path).await?;
        let permission = Permission::from_bits(state.config.default_permission);
        Ok(
            GroupManager::new(store.clone(), store.clone(), GroupPolicy::new(store))
                .with_default_permission(permission),
        )
    }
}

#[async_trait::async_trait]
pub trait Op: Send + Sync {
    type Error: Error + Send + Sync + 'static;
    type Output;

    async fn execute(&self, ctx: &OpContext) -> Result<Self::Output, Self::Error>;
}

#[macro_export]
macro_rules! command_enum {
    ($(($variant:ident, $type:ty)),* $(,)?) => {
        #[derive(Subcommand, Debug, Clone)]
        pub enum Command {
            $($variant($type),)*
        }

        #[derive(Debug)]
        pub enum OpOutput {
            $($variant(<$type as $crate::op::Op>::Output),)*
        }

        #[derive(Debug, thiserror::Error)]
        pub enum OpError {
            $(
                #[error(transparent)]
                $variant(<$type as $crate::op::Op>::Error),
            )*
        }

        #[async_trait::async_trait]
        impl $crate::op::Op for Command {
            type Output = OpOutput;
            type Error = OpError;

            async fn execute(&self, ctx: &$crate::op::OpContext) -> Result<Self::Output, Self::Error> {
                match self {
                    $(
                        Command::$variant(op) => {
                            op.execute(ctx).await
                                .map(OpOutput::$variant)
                                .map_err(OpError::$variant)
                        },
                    )*
                }
            }
        }

        impl std::fmt::Display for OpOutput {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                match self {
                    $(
                        OpOutput::$variant(output) => write!(f, "{}", output),
                    )*
                }
            }
        }
    };
}
