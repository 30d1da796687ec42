//! # Group roles
//!
//! Every user in a group holds exactly one role:
//!
//! - **Owner**: created the group (or had it handed over); may do anything,
//!   including deleting the group
//! - **Master**: may grow the group (members, masters, devices, resources,
//!   subgroups), shrink its members, devices and resources, and rename it
//! - **Member**: may only share or withdraw devices and resources
//!
//! Users outside `members` may do nothing.

use std::fmt;

use async_trait::async_trait;

use crate::group::{Group, Operation, PropertyKey};
use crate::provider::{GroupStore, ProviderError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Owner,
    Master,
    Member,
}

impl Role {
    /// The role `uid` holds in `group`, if any.
    pub fn of(group: &Group, uid: &str) -> Option<Role> {
        if group.owner == uid {
            Some(Role::Owner)
        } else if group.masters.contains(uid) {
            Some(Role::Master)
        } else if group.members.contains(uid) {
            Some(Role::Member)
        } else {
            None
        }
    }

    pub fn allows(&self, operation: Operation, key: PropertyKey) -> bool {
        match (self, operation) {
            (Role::Owner, _) => true,
            (Role::Master, Operation::Add) => matches!(
                key,
                PropertyKey::Members
                    | PropertyKey::Masters
                    | PropertyKey::Devices
                    | PropertyKey::Resources
                    | PropertyKey::Subgroups
            ),
            (Role::Master, Operation::Delete) => matches!(
                key,
                PropertyKey::Members | PropertyKey::Devices | PropertyKey::Resources
            ),
            (Role::Master, Operation::Replace) => key == PropertyKey::Name,
            (Role::Member, Operation::Add | Operation::Delete) => {
                matches!(key, PropertyKey::Devices | PropertyKey::Resources)
            }
            (Role::Member, Operation::Replace) => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => write!(f, "owner"),
            Role::Master => write!(f, "master"),
            Role::Member => write!(f, "member"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    #[error("group not found: {0}")]
    GroupNotFound(String),
    #[error("user {uid} is not a member of group {gid}")]
    NotMember { gid: String, uid: String },
    #[error("{role} {uid} may not {operation} {property} of group {gid}")]
    Forbidden {
        gid: String,
        uid: String,
        role: Role,
        operation: Operation,
        property: PropertyKey,
    },
    #[error("policy lookup failed: {0}")]
    Provider(#[from] ProviderError),
}

/// Decides whether a user may apply an operation to a set of group properties.
#[async_trait]
pub trait PolicyChecker: Send + Sync + std::fmt::Debug + Clone + 'static {
    async fn verify(
        &self,
        gid: &str,
        uid: &str,
        operation: Operation,
        keys: &[PropertyKey],
    ) -> Result<(), AuthzError>;
}

/// Role-based policy reading roles from the group record itself.
#[derive(Debug, Clone)]
pub struct GroupPolicy<S> {
    store: S,
}

impl<S: GroupStore> GroupPolicy<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: GroupStore> PolicyChecker for GroupPolicy<S> {
    async fn verify(
        &self,
        gid: &str,
        uid: &str,
        operation: Operation,
        keys: &[PropertyKey],
    ) -> Result<(), AuthzError> {
        let group = self
            .store
            .group(gid)
            .await?
            .ok_or_else(|| AuthzError::GroupNotFound(gid.to_string()))?;

        let role = Role::of(&group, uid).ok_or_else(|| AuthzError::NotMember {
            gid: gid.to_string(),
            uid: uid.to_string(),
        })?;

        if let Some(&property) = keys.iter().find(|&&key| !role.allows(operation, key)) {
            tracing::debug!(gid, uid, %role, %operation, %property, "policy rejected request");
            return Err(AuthzError::Forbidden {
                gid: gid.to_string(),
                uid: uid.to_string(),
                role,
                operation,
                property,
            });
        }

        Ok(())
    }
}
