use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::href::{self, HrefError};

/// OCF-style permission bitmask granted by a group ACE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u16);

impl Permission {
    pub const CREATE: Permission = Permission(1);
    pub const READ: Permission = Permission(2);
    pub const UPDATE: Permission = Permission(4);
    pub const DELETE: Permission = Permission(8);
    pub const NOTIFY: Permission = Permission(16);

    /// Create, read, update and delete.
    pub const DEFAULT: Permission = Permission(15);

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u16 {
        self.0
    }

    pub fn contains(&self, other: Permission) -> bool {
        self.0 & other.0 == other.0
    }
}

impl Default for Permission {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl std::ops::BitOr for Permission {
    type Output = Permission;

    fn bitor(self, rhs: Self) -> Self::Output {
        Permission(self.0 | rhs.0)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A resource registered to a group.
///
/// The href is the full routed href, e.g. `/di/<device id>/a/light/1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupResource {
    pub href: String,
    #[serde(rename = "rt", default)]
    pub resource_types: Vec<String>,
    #[serde(rename = "if", default)]
    pub interfaces: Vec<String>,
}

impl GroupResource {
    pub fn new(
        href: impl Into<String>,
        resource_types: impl IntoIterator<Item = impl Into<String>>,
        interfaces: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        Self {
            href: href.into(),
            resource_types: resource_types.into_iter().map(Into::into).collect(),
            interfaces: interfaces.into_iter().map(Into::into).collect(),
        }
    }

    /// Id of the device this resource lives on.
    pub fn device_id(&self) -> Result<&str, HrefError> {
        href::device_id(&self.href)
    }

    /// The href as seen from inside the device's own ACL.
    pub fn local_href(&self) -> Result<&str, HrefError> {
        href::local_href(&self.href)
    }
}

/// Default access granted to group members on in-group devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupAcl {
    pub permission: Permission,
}

/// A group record as persisted by a [`GroupStore`](crate::provider::GroupStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    pub gid: String,
    #[serde(rename = "gname")]
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub members: BTreeSet<String>,
    #[serde(default)]
    pub masters: BTreeSet<String>,
    #[serde(default)]
    pub devices: BTreeSet<String>,
    #[serde(default)]
    pub resources: Vec<GroupResource>,
    #[serde(default)]
    pub subgroups: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    #[serde(default)]
    pub gacl: Vec<GroupAcl>,
}

impl Group {
    /// A fresh group whose only member is its owner.
    pub fn new(
        gid: impl Into<String>,
        name: impl Into<String>,
        owner: impl Into<String>,
        parent: Option<String>,
        permission: Permission,
    ) -> Self {
        let owner = owner.into();
        Self {
            gid: gid.into(),
            name: name.into(),
            members: BTreeSet::from([owner.clone()]),
            owner,
            masters: BTreeSet::new(),
            devices: BTreeSet::new(),
            resources: Vec::new(),
            subgroups: BTreeSet::new(),
            parent,
            gacl: vec![GroupAcl { permission }],
        }
    }

    /// Permission handed to members when the synchronizer creates ACEs.
    pub fn permission(&self) -> Permission {
        self.gacl
            .first()
            .map(|acl| acl.permission)
            .unwrap_or_default()
    }

    pub fn has_resource_href(&self, href: &str) -> bool {
        self.resources.iter().any(|r| r.href == href)
    }

    /// Registered resources living on any of the given devices.
    pub fn resources_on<'a>(
        &'a self,
        devices: &'a BTreeSet<String>,
    ) -> impl Iterator<Item = &'a GroupResource> + 'a {
        self.resources.iter().filter(move |r| {
            r.device_id()
                .map(|di| devices.contains(di))
                .unwrap_or(false)
        })
    }
}
