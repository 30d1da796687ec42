//! Collaborators the engine reads from and writes to.
//!
//! - [`GroupStore`]: group records and the ACE cross-reference table
//! - [`DeviceAclService`]: per-device ACL documents
//!
//! [`memory`] has in-process implementations of both.

pub mod memory;

use async_trait::async_trait;

use crate::acl::{Ace, AceFilter, AceRecord, AceSpec, AclDocument};
use crate::group::Group;

pub use memory::{MemoryAclService, MemoryGroupStore};

#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    /// The requested record does not exist
    #[error("not found: {0}")]
    NotFound(String),
    /// The write would violate a uniqueness constraint
    #[error("conflict: {0}")]
    Conflict(String),
    /// The backing store failed
    #[error("provider backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("provider error: {0}")]
    Internal(String),
}

impl ProviderError {
    pub fn backend(e: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(e))
    }
}

/// Durable storage for group records and ACE cross-reference records.
#[async_trait]
pub trait GroupStore: Send + Sync + std::fmt::Debug + Clone + 'static {
    /// Get a group by id
    ///
    /// # Returns
    /// * `Ok(None)` - No group with this id exists
    async fn group(&self, gid: &str) -> Result<Option<Group>, ProviderError>;

    /// Insert the group, replacing any record with the same `gid`
    async fn put_group(&self, group: &Group) -> Result<(), ProviderError>;

    /// Delete a group record
    ///
    /// # Returns
    /// * `Ok(true)` - A record was deleted
    async fn delete_group(&self, gid: &str) -> Result<bool, ProviderError>;

    /// Every group whose `members` contains `uid`
    async fn groups_with_member(&self, uid: &str) -> Result<Vec<Group>, ProviderError>;

    /// Cross-reference records matching every condition in `filter`
    async fn select_aces(&self, filter: &AceFilter) -> Result<Vec<AceRecord>, ProviderError>;

    /// Insert a cross-reference record
    ///
    /// Should fail with `ProviderError::Conflict` if a record for the same
    /// (gid, di, uid) already exists.
    async fn insert_ace(&self, record: &AceRecord) -> Result<(), ProviderError>;

    /// Delete records matching every condition in `filter`
    ///
    /// # Returns
    /// * `Ok(n)` - The number of deleted records
    async fn delete_aces(&self, filter: &AceFilter) -> Result<u64, ProviderError>;
}

/// The device security resource exposing one ACL document per device.
#[async_trait]
pub trait DeviceAclService: Send + Sync + std::fmt::Debug + Clone + 'static {
    /// Id of the ACL document for a device, if the device has one
    async fn acl_id(&self, di: &str) -> Result<Option<String>, ProviderError>;

    /// Read an ACL document
    async fn acl(&self, acl_id: &str) -> Result<AclDocument, ProviderError>;

    /// Add an ACE to an ACL, returning the id the device assigned it
    async fn create_ace(&self, acl_id: &str, spec: &AceSpec) -> Result<String, ProviderError>;

    /// Overwrite an existing ACE
    async fn update_ace(
        &self,
        acl_id: &str,
        aceid: &str,
        spec: &AceSpec,
    ) -> Result<(), ProviderError>;

    /// Remove an ACE
    async fn delete_ace(&self, acl_id: &str, aceid: &str) -> Result<(), ProviderError>;

    /// Read a single ACE
    async fn ace(&self, acl_id: &str, aceid: &str) -> Result<Ace, ProviderError> {
        let acl = self.acl(acl_id).await?;
        acl.ace(aceid)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("ace {} in acl {}", aceid, acl_id)))
    }
}
