//! SQLite backend for gacl
//!
//! [`SqliteStore`] implements both engine collaborators over a single
//! database:
//!
//! - [`GroupStore`](common::provider::GroupStore): group records, a membership
//!   index and the ACE cross-reference table
//! - [`DeviceAclService`](common::provider::DeviceAclService): one ACL document
//!   per registered device
//!
//! # Example
//!
//! ```rust,no_run
//! use common::manager::GroupManager;
//! use common::policy::GroupPolicy;
//! use store::SqliteStore;
//! use std::path::Path;
//!
//! # async fn example() -> Result<(), store::StoreError> {
//! let store = SqliteStore::new(Path::new("/tmp/gacl/db.sqlite")).await?;
//! let manager = GroupManager::new(store.clone(), store.clone(), GroupPolicy::new(store));
//! # Ok(())
//! # }
//! ```

mod acls;
mod database;
mod error;
mod groups;

pub use acls::DeviceEntry;
pub use database::SqliteStore;
pub use error::{Result, StoreError};
