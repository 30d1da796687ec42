/**
 * Device ACL documents, the ACE cross-reference
 *  index, and the synchronizer that keeps device
 *  ACEs in line with group membership.
 */
pub mod acl;
pub mod error;
/**
 * Group records, routed resource hrefs and
 *  the typed property values requests carry.
 */
pub mod group;
/**
 * Hierarchy operations over groups: adds that
 *  validate against the parent and deletes that
 *  cascade into subgroups.
 */
pub mod manager;
/**
 * Role-based authorization of group requests.
 */
pub mod policy;
/**
 * Collaborator traits (group store, device ACL
 *  service) and their in-memory implementations.
 */
pub mod provider;
/**
 * Decoding request payloads into property updates.
 */
pub mod request;
/**
 * Helper for setting build version information
 *  at compile time.
 */
pub mod version;

pub mod prelude {
    pub use crate::acl::{AceFilter, AceRecord, AclSynchronizer};
    pub use crate::error::{ErrorKind, GroupError};
    pub use crate::group::{
        Group, GroupResource, Operation, Permission, Property, PropertyKey, PropertyUpdate,
        Replacement,
    };
    pub use crate::manager::GroupManager;
    pub use crate::policy::{GroupPolicy, PolicyChecker};
    pub use crate::provider::{DeviceAclService, GroupStore, ProviderError};
    pub use crate::version::build_info;
}
