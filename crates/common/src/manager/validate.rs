use std::collections::BTreeSet;

use super::GroupManager;
use crate::error::GroupError;
use crate::group::{Group, Operation, Property, PropertyUpdate};
use crate::policy::PolicyChecker;
use crate::provider::{DeviceAclService, GroupStore};

/// Candidate values not yet stored in the group.
pub fn added_values(group: &Group, property: &Property) -> Property {
    match property {
        Property::Members(values) => {
            Property::Members(values.difference(&group.members).cloned().collect())
        }
        Property::Masters(values) => {
            Property::Masters(values.difference(&group.masters).cloned().collect())
        }
        Property::Devices(values) => {
            Property::Devices(values.difference(&group.devices).cloned().collect())
        }
        Property::Resources(values) => Property::Resources(
            values
                .iter()
                .filter(|r| !group.has_resource_href(&r.href))
                .cloned()
                .collect(),
        ),
    }
}

/// Stored values missing from the candidates, i.e. what replacing the stored
/// list by the candidates would remove.
pub fn removed_values(group: &Group, property: &Property) -> Property {
    match property {
        Property::Members(values) => {
            Property::Members(group.members.difference(values).cloned().collect())
        }
        Property::Masters(values) => {
            Property::Masters(group.masters.difference(values).cloned().collect())
        }
        Property::Devices(values) => {
            Property::Devices(group.devices.difference(values).cloned().collect())
        }
        Property::Resources(values) => Property::Resources(
            group
                .resources
                .iter()
                .filter(|stored| !values.iter().any(|r| r.href == stored.href))
                .cloned()
                .collect(),
        ),
    }
}

fn first_outside<'a>(
    values: &'a BTreeSet<String>,
    scope: &BTreeSet<String>,
) -> Option<&'a String> {
    values.iter().find(|v| !scope.contains(*v))
}

impl<S, A, P> GroupManager<S, A, P>
where
    S: GroupStore,
    A: DeviceAclService,
    P: PolicyChecker,
{
    pub async fn get_add_property_values(
        &self,
        gid: &str,
        property: &Property,
    ) -> Result<Property, GroupError> {
        let group = self.group(gid).await?;
        Ok(added_values(&group, property))
    }

    pub async fn get_delete_property_values(
        &self,
        gid: &str,
        property: &Property,
    ) -> Result<Property, GroupError> {
        let group = self.group(gid).await?;
        Ok(removed_values(&group, property))
    }

    /// Authorize `uid` for the update, then check it against the group and
    /// its parent.
    ///
    /// Nothing is written; any violation is reported as a bad request.
    #[tracing::instrument(skip(self, update), fields(keys = ?update.keys()))]
    pub async fn verify_post_request_authz(
        &self,
        gid: &str,
        uid: &str,
        update: &PropertyUpdate,
        operation: Operation,
    ) -> Result<(), GroupError> {
        self.policy
            .verify(gid, uid, operation, &update.keys())
            .await?;

        let group = self.group(gid).await?;
        let parent = self.parent_of(&group).await?;

        match operation {
            Operation::Add | Operation::Delete => {
                if let Some(replacement) = update.replacements.first() {
                    return Err(GroupError::bad_request(format!(
                        "{} can only be replaced",
                        replacement.key()
                    )));
                }
            }
            Operation::Replace => {
                if let Some(property) = update.properties.first() {
                    return Err(GroupError::bad_request(format!(
                        "{} must be a single value",
                        property.key()
                    )));
                }
            }
        }

        for property in &update.properties {
            if property.is_empty() {
                return Err(GroupError::bad_request(format!(
                    "no {} given",
                    property.key()
                )));
            }
            match operation {
                Operation::Add => self.verify_add(uid, parent.as_ref(), property).await?,
                Operation::Delete => verify_delete(&group, parent.as_ref(), property)?,
                Operation::Replace => {}
            }
        }

        Ok(())
    }

    async fn parent_of(&self, group: &Group) -> Result<Option<Group>, GroupError> {
        let Some(parent) = &group.parent else {
            return Ok(None);
        };
        self.store.group(parent).await?.map(Some).ok_or_else(|| {
            GroupError::Internal(format!("parent {} of group {} is missing", parent, group.gid))
        })
    }

    async fn verify_add(
        &self,
        uid: &str,
        parent: Option<&Group>,
        property: &Property,
    ) -> Result<(), GroupError> {
        match property {
            Property::Members(values) | Property::Masters(values) => {
                if let Some(parent) = parent {
                    if let Some(outsider) = first_outside(values, &parent.members) {
                        return Err(GroupError::bad_request(format!(
                            "{} is not a member of parent group {}",
                            outsider, parent.gid
                        )));
                    }
                }
            }
            Property::Devices(values) => {
                for di in values {
                    self.verify_device_owner(di, uid).await?;
                }
                if let Some(parent) = parent {
                    if let Some(di) = first_outside(values, &parent.devices) {
                        return Err(GroupError::bad_request(format!(
                            "device {} is not shared with parent group {}",
                            di, parent.gid
                        )));
                    }
                }
            }
            Property::Resources(values) => {
                for resource in values {
                    if resource.resource_types.is_empty() || resource.interfaces.is_empty() {
                        return Err(GroupError::bad_request(format!(
                            "resource {} needs both rt and if",
                            resource.href
                        )));
                    }
                    let di = resource.device_id()?;
                    self.verify_device_owner(di, uid).await?;

                    if let Some(parent) = parent {
                        if !parent.devices.contains(di) && !parent.resources.contains(resource) {
                            return Err(GroupError::bad_request(format!(
                                "resource {} is not shared with parent group {}",
                                resource.href, parent.gid
                            )));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    async fn verify_device_owner(&self, di: &str, uid: &str) -> Result<(), GroupError> {
        if self.sync.acls().acl_id(di).await?.is_none() {
            return Err(GroupError::bad_request(format!("unknown device {}", di)));
        }
        let owner = self.sync.device_owner_id(di).await?;
        if owner != uid {
            return Err(GroupError::bad_request(format!(
                "device {} is not owned by {}",
                di, uid
            )));
        }
        Ok(())
    }
}

fn verify_delete(
    group: &Group,
    parent: Option<&Group>,
    property: &Property,
) -> Result<(), GroupError> {
    let owner_removed = match property {
        Property::Members(values) | Property::Devices(values) => values.contains(&group.owner),
        Property::Resources(values) => {
            let mut owned = false;
            for resource in values {
                if resource.device_id()? == group.owner {
                    owned = true;
                    break;
                }
            }
            owned
        }
        Property::Masters(_) => false,
    };
    if owner_removed {
        return Err(GroupError::bad_request(format!(
            "owner {} cannot be removed from {} of group {}",
            group.owner,
            property.key(),
            group.gid
        )));
    }

    let Some(parent) = parent else {
        return Ok(());
    };
    let outside = match property {
        Property::Members(values) | Property::Masters(values) => {
            first_outside(values, &parent.members).cloned()
        }
        Property::Devices(values) => first_outside(values, &parent.devices).cloned(),
        Property::Resources(values) => {
            let mut outside = None;
            for resource in values {
                let di = resource.device_id()?;
                if !parent.devices.contains(di) && !parent.has_resource_href(&resource.href) {
                    outside = Some(resource.href.clone());
                    break;
                }
            }
            outside
        }
    };

    match outside {
        Some(value) => Err(GroupError::bad_request(format!(
            "{} {} is not part of parent group {}",
            property.key(),
            value,
            parent.gid
        ))),
        None => Ok(()),
    }
}
