//! Device ACL types and group-to-device ACE synchronization
//!
//! - **[`Ace`]** / **[`AclDocument`]**: what a device's ACL looks like
//! - **[`AceRecord`]**: the cross-reference from (group, device, grantee) to a device ACE
//! - **[`AclSynchronizer`]**: fans group membership changes out to device ACLs

mod ace;
mod index;
mod sync;

pub use ace::{
    merge_resources, remove_resources, Ace, AceResource, AceSpec, AclDocument, SubjectType,
    WILDCARD_HREF,
};
pub use index::{AceFilter, AceRecord};
pub use sync::AclSynchronizer;
