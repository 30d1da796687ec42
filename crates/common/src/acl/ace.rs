use serde::{Deserialize, Serialize};

use crate::group::Permission;

/// Href of the sentinel resource granting access to every resource on a device.
pub const WILDCARD_HREF: &str = "*";

/// A resource inside a device ACE, addressed by its device-local href.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AceResource {
    pub href: String,
    #[serde(rename = "rt", default)]
    pub resource_types: Vec<String>,
    #[serde(rename = "if", default)]
    pub interfaces: Vec<String>,
}

impl AceResource {
    pub fn wildcard() -> Self {
        Self {
            href: WILDCARD_HREF.to_string(),
            resource_types: vec![WILDCARD_HREF.to_string()],
            interfaces: vec![WILDCARD_HREF.to_string()],
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.href == WILDCARD_HREF
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    Uuid,
    Role,
    ConnType,
}

/// Everything about an ACE except its device-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AceSpec {
    #[serde(rename = "subjectuuid")]
    pub subject_id: String,
    #[serde(rename = "stype")]
    pub subject_type: SubjectType,
    pub permission: Permission,
    pub resources: Vec<AceResource>,
}

impl AceSpec {
    /// A grant for a single user.
    pub fn for_user(
        uid: impl Into<String>,
        permission: Permission,
        resources: Vec<AceResource>,
    ) -> Self {
        Self {
            subject_id: uid.into(),
            subject_type: SubjectType::Uuid,
            permission,
            resources,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.resources.len() == 1 && self.resources[0].is_wildcard()
    }
}

/// An ACE as stored on a device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ace {
    pub aceid: String,
    #[serde(flatten)]
    pub spec: AceSpec,
}

/// A device's ACL document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclDocument {
    pub aclid: String,
    pub di: String,
    #[serde(rename = "oid")]
    pub owner_id: String,
    #[serde(default)]
    pub aces: Vec<Ace>,
}

impl AclDocument {
    pub fn ace(&self, aceid: &str) -> Option<&Ace> {
        self.aces.iter().find(|ace| ace.aceid == aceid)
    }
}

/// Merge `added` into an ACE's resource list.
///
/// A wildcard entry is dropped (the ACE becomes explicitly scoped) and only
/// hrefs not already present are appended, so merging the same set twice is
/// the same as merging it once.
pub fn merge_resources(current: &[AceResource], added: &[AceResource]) -> Vec<AceResource> {
    let mut merged: Vec<AceResource> = current
        .iter()
        .filter(|r| !r.is_wildcard())
        .cloned()
        .collect();
    for resource in added {
        if !merged.iter().any(|r| r.href == resource.href) {
            merged.push(resource.clone());
        }
    }
    merged
}

/// Drop every resource whose href is in `hrefs`.
pub fn remove_resources(current: &[AceResource], hrefs: &[&str]) -> Vec<AceResource> {
    current
        .iter()
        .filter(|r| !hrefs.contains(&r.href.as_str()))
        .cloned()
        .collect()
}
