//! Group hierarchy management.
//!
//! [`GroupManager`] owns every mutation of group records. Each mutation
//! persists the group first and then hands the actually-changed values to the
//! [`AclSynchronizer`] so device ACEs follow membership.
//!
//! Deletes cascade down the subgroup tree; adds only validate up against the
//! parent (see [`GroupManager::verify_post_request_authz`]).

use std::collections::{BTreeMap, BTreeSet};

use uuid::Uuid;

use crate::acl::AclSynchronizer;
use crate::error::GroupError;
use crate::group::{
    Group, GroupResource, Operation, Permission, Property, PropertyKey, PropertyUpdate,
    Replacement,
};
use crate::policy::{AuthzError, PolicyChecker};
use crate::provider::{DeviceAclService, GroupStore};

mod validate;

pub use validate::{added_values, removed_values};

#[derive(Debug, Clone)]
pub struct GroupManager<S, A, P> {
    store: S,
    sync: AclSynchronizer<S, A>,
    policy: P,
    default_permission: Permission,
}

impl<S, A, P> GroupManager<S, A, P>
where
    S: GroupStore,
    A: DeviceAclService,
    P: PolicyChecker,
{
    pub fn new(store: S, acls: A, policy: P) -> Self {
        Self {
            sync: AclSynchronizer::new(store.clone(), acls),
            store,
            policy,
            default_permission: Permission::DEFAULT,
        }
    }

    /// Permission placed in the `gacl` of newly created groups.
    pub fn with_default_permission(mut self, permission: Permission) -> Self {
        self.default_permission = permission;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn synchronizer(&self) -> &AclSynchronizer<S, A> {
        &self.sync
    }

    async fn group(&self, gid: &str) -> Result<Group, GroupError> {
        self.store
            .group(gid)
            .await?
            .ok_or_else(|| GroupError::GroupNotFound(gid.to_string()))
    }

    /* Request entry points */

    /// Create a group owned by `uid`, optionally as a subgroup of `parent`.
    #[tracing::instrument(skip(self))]
    pub async fn create_group(
        &self,
        uid: &str,
        name: &str,
        parent: Option<&str>,
        gid: Option<String>,
    ) -> Result<Group, GroupError> {
        if name.is_empty() {
            return Err(GroupError::bad_request("group name must not be empty"));
        }

        let parent_group = match parent {
            Some(parent) => {
                let group = self.store.group(parent).await?.ok_or_else(|| {
                    GroupError::bad_request(format!("parent group {} does not exist", parent))
                })?;
                self.policy
                    .verify(parent, uid, Operation::Add, &[PropertyKey::Subgroups])
                    .await?;
                Some(group)
            }
            None => None,
        };

        let gid = gid.unwrap_or_else(|| Uuid::new_v4().to_string());
        if self.store.group(&gid).await?.is_some() {
            return Err(GroupError::bad_request(format!("group {} already exists", gid)));
        }

        let group = Group::new(
            gid.clone(),
            name,
            uid,
            parent.map(str::to_string),
            self.default_permission,
        );
        self.store.put_group(&group).await?;

        if let Some(mut parent_group) = parent_group {
            parent_group.subgroups.insert(gid.clone());
            self.store.put_group(&parent_group).await?;
        }

        tracing::info!(gid = %group.gid, owner = uid, parent = ?group.parent, "created group");
        Ok(group)
    }

    /// The group record, visible to its members only.
    pub async fn get_group(&self, gid: &str, uid: &str) -> Result<Group, GroupError> {
        let group = self.group(gid).await?;
        if !group.members.contains(uid) {
            return Err(GroupError::Unauthorized(AuthzError::NotMember {
                gid: gid.to_string(),
                uid: uid.to_string(),
            }));
        }
        Ok(group)
    }

    #[tracing::instrument(skip(self, update), fields(keys = ?update.keys()))]
    pub async fn add_properties(
        &self,
        gid: &str,
        uid: &str,
        update: &PropertyUpdate,
    ) -> Result<(), GroupError> {
        if update.is_empty() {
            return Err(GroupError::bad_request("no properties to add"));
        }
        self.verify_post_request_authz(gid, uid, update, Operation::Add)
            .await?;
        self.apply_additions(gid, &update.properties).await
    }

    #[tracing::instrument(skip(self, update), fields(keys = ?update.keys()))]
    pub async fn delete_properties(
        &self,
        gid: &str,
        uid: &str,
        update: &PropertyUpdate,
    ) -> Result<(), GroupError> {
        if update.is_empty() {
            return Err(GroupError::bad_request("no properties to delete"));
        }
        self.verify_post_request_authz(gid, uid, update, Operation::Delete)
            .await?;
        self.apply_deletions(gid, &update.properties).await
    }

    /// Replace scalar properties and swap list properties for the given
    /// lists.
    ///
    /// A list is applied as the deletion of stored values missing from it,
    /// followed by the addition of values not yet stored. Every part is
    /// authorized and validated before anything is written.
    #[tracing::instrument(skip(self, update), fields(keys = ?update.keys()))]
    pub async fn update_properties(
        &self,
        gid: &str,
        uid: &str,
        update: &PropertyUpdate,
    ) -> Result<(), GroupError> {
        if update.is_empty() {
            return Err(GroupError::bad_request("no properties to update"));
        }

        let group = self.group(gid).await?;
        let replacements = PropertyUpdate {
            replacements: update.replacements.clone(),
            properties: Vec::new(),
        };
        let mut deletions = PropertyUpdate::new();
        let mut additions = PropertyUpdate::new();
        for property in &update.properties {
            let removed = removed_values(&group, property);
            if !removed.is_empty() {
                deletions.properties.push(removed);
            }
            let added = added_values(&group, property);
            if !added.is_empty() {
                additions.properties.push(added);
            }
        }

        if replacements.is_empty() && deletions.is_empty() && additions.is_empty() {
            self.policy
                .verify(gid, uid, Operation::Add, &update.keys())
                .await?;
            tracing::debug!(gid, "update leaves the group unchanged");
            return Ok(());
        }

        if !replacements.is_empty() {
            self.verify_post_request_authz(gid, uid, &replacements, Operation::Replace)
                .await?;
        }
        if !deletions.is_empty() {
            self.verify_post_request_authz(gid, uid, &deletions, Operation::Delete)
                .await?;
        }
        if !additions.is_empty() {
            self.verify_post_request_authz(gid, uid, &additions, Operation::Add)
                .await?;
        }

        for replacement in &replacements.replacements {
            match replacement {
                Replacement::Name(name) => self.replace_name(gid, name).await?,
                Replacement::Owner(owner) => self.replace_owner(gid, owner).await?,
            }
        }
        self.apply_deletions(gid, &deletions.properties).await?;
        self.apply_additions(gid, &additions.properties).await
    }

    /// Delete a group and its subtree on behalf of `uid`.
    #[tracing::instrument(skip(self))]
    pub async fn remove_group(&self, gid: &str, uid: &str) -> Result<(), GroupError> {
        self.policy
            .verify(gid, uid, Operation::Delete, &[PropertyKey::Group])
            .await?;
        self.delete_group(gid).await
    }

    async fn apply_additions(&self, gid: &str, properties: &[Property]) -> Result<(), GroupError> {
        for property in properties {
            match property {
                Property::Members(values) => self.add_members(gid, values).await?,
                Property::Masters(values) => self.add_masters(gid, values).await?,
                Property::Devices(values) => self.add_devices(gid, values).await?,
                Property::Resources(values) => self.add_resources(gid, values).await?,
            }
        }
        Ok(())
    }

    async fn apply_deletions(&self, gid: &str, properties: &[Property]) -> Result<(), GroupError> {
        for property in properties {
            match property {
                Property::Members(values) => self.delete_members(gid, values).await?,
                Property::Masters(values) => self.delete_masters(gid, values).await?,
                Property::Devices(values) => self.delete_devices(gid, values).await?,
                Property::Resources(values) => self.delete_resources(gid, values).await?,
            }
        }
        Ok(())
    }

    /* Additions */

    pub async fn add_members(&self, gid: &str, values: &BTreeSet<String>) -> Result<(), GroupError> {
        if values.is_empty() {
            return Err(GroupError::bad_request("no members given"));
        }

        let mut group = self.group(gid).await?;
        let added: BTreeSet<String> = values.difference(&group.members).cloned().collect();
        if added.is_empty() {
            tracing::debug!(gid, "members already present");
            return Ok(());
        }

        group.members.extend(added.iter().cloned());
        self.store.put_group(&group).await?;
        tracing::info!(gid, added = ?added, "added members");

        self.sync
            .add_ace_by_members(gid, group.permission(), &added)
            .await
    }

    /// Promote users to masters, making them members first where needed.
    pub async fn add_masters(&self, gid: &str, values: &BTreeSet<String>) -> Result<(), GroupError> {
        if values.is_empty() {
            return Err(GroupError::bad_request("no masters given"));
        }

        let group = self.group(gid).await?;
        let new_members: BTreeSet<String> = values.difference(&group.members).cloned().collect();
        if !new_members.is_empty() {
            self.add_members(gid, &new_members).await?;
        }

        let mut group = self.group(gid).await?;
        let added: BTreeSet<String> = values.difference(&group.masters).cloned().collect();
        if added.is_empty() {
            return Ok(());
        }

        group.masters.extend(added.iter().cloned());
        self.store.put_group(&group).await?;
        tracing::info!(gid, added = ?added, "added masters");
        Ok(())
    }

    /// Share whole devices with the group.
    ///
    /// Resources already registered on a newly added device are dropped from
    /// this group, and their scoped grants give way to wildcard grants.
    pub async fn add_devices(&self, gid: &str, values: &BTreeSet<String>) -> Result<(), GroupError> {
        if values.is_empty() {
            return Err(GroupError::bad_request("no devices given"));
        }

        let mut group = self.group(gid).await?;
        let added: BTreeSet<String> = values.difference(&group.devices).cloned().collect();
        if added.is_empty() {
            tracing::debug!(gid, "devices already present");
            return Ok(());
        }

        let superseded: Vec<GroupResource> = group.resources_on(&added).cloned().collect();
        group.resources.retain(|r| !superseded.contains(r));
        group.devices.extend(added.iter().cloned());
        self.store.put_group(&group).await?;
        tracing::info!(
            gid,
            added = ?added,
            superseded = superseded.len(),
            "added devices"
        );

        if !superseded.is_empty() {
            self.sync.remove_ace_by_resources(&superseded, gid).await?;
        }
        self.sync
            .add_ace_by_devices(gid, group.permission(), &added)
            .await
    }

    pub async fn add_resources(
        &self,
        gid: &str,
        values: &[GroupResource],
    ) -> Result<(), GroupError> {
        if values.is_empty() {
            return Err(GroupError::bad_request("no resources given"));
        }

        let mut group = self.group(gid).await?;
        let mut added: Vec<GroupResource> = Vec::new();
        for resource in values {
            if group.has_resource_href(&resource.href)
                || added.iter().any(|r| r.href == resource.href)
            {
                continue;
            }
            added.push(resource.clone());
        }
        if added.is_empty() {
            tracing::debug!(gid, "resources already present");
            return Ok(());
        }

        group.resources.extend(added.iter().cloned());
        self.store.put_group(&group).await?;
        tracing::info!(gid, added = added.len(), "added resources");

        self.sync
            .add_ace_by_resources(gid, group.permission(), &added, None)
            .await
    }

    /* Deletions, cascading into subgroups */

    /// Remove members, along with whatever they shared with the group.
    pub async fn delete_members(
        &self,
        gid: &str,
        values: &BTreeSet<String>,
    ) -> Result<(), GroupError> {
        let group = self.group(gid).await?;
        let removed: BTreeSet<String> = group.members.intersection(values).cloned().collect();
        if removed.is_empty() {
            return Ok(());
        }

        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        let mut owned_devices = BTreeSet::new();
        for di in &group.devices {
            if removed.contains(&self.cached_owner(&mut owners, di).await?) {
                owned_devices.insert(di.clone());
            }
        }
        let mut owned_resources = Vec::new();
        for resource in &group.resources {
            let di = resource.device_id()?;
            if removed.contains(&self.cached_owner(&mut owners, di).await?) {
                owned_resources.push(resource.clone());
            }
        }

        if !owned_devices.is_empty() {
            self.delete_devices(gid, &owned_devices).await?;
        }
        if !owned_resources.is_empty() {
            self.delete_resources(gid, &owned_resources).await?;
        }

        let mut group = self.group(gid).await?;
        group.members.retain(|uid| !removed.contains(uid));
        group.masters.retain(|uid| !removed.contains(uid));
        self.store.put_group(&group).await?;
        tracing::info!(gid, removed = ?removed, "removed members");

        for subgroup in &group.subgroups {
            Box::pin(self.delete_members(subgroup, &removed)).await?;
        }

        self.sync.remove_ace_by_members(&removed, gid).await
    }

    pub async fn delete_masters(
        &self,
        gid: &str,
        values: &BTreeSet<String>,
    ) -> Result<(), GroupError> {
        let mut group = self.group(gid).await?;
        let removed: BTreeSet<String> = group.masters.intersection(values).cloned().collect();
        if removed.is_empty() {
            return Ok(());
        }

        group.masters.retain(|uid| !removed.contains(uid));
        self.store.put_group(&group).await?;
        tracing::info!(gid, removed = ?removed, "removed masters");

        for subgroup in &group.subgroups {
            Box::pin(self.delete_masters(subgroup, &removed)).await?;
        }
        Ok(())
    }

    /// Withdraw devices, along with any resources registered on them.
    pub async fn delete_devices(
        &self,
        gid: &str,
        values: &BTreeSet<String>,
    ) -> Result<(), GroupError> {
        let group = self.group(gid).await?;
        let scoped: Vec<GroupResource> = group.resources_on(values).cloned().collect();
        if !scoped.is_empty() {
            self.delete_resources(gid, &scoped).await?;
        }

        let mut group = self.group(gid).await?;
        let removed: BTreeSet<String> = group.devices.intersection(values).cloned().collect();
        if removed.is_empty() {
            return Ok(());
        }

        group.devices.retain(|di| !removed.contains(di));
        self.store.put_group(&group).await?;
        tracing::info!(gid, removed = ?removed, "removed devices");

        for subgroup in &group.subgroups {
            Box::pin(self.delete_devices(subgroup, &removed)).await?;
        }

        self.sync.remove_ace_by_devices(&removed, gid).await
    }

    /// Withdraw resources, matched by href.
    pub async fn delete_resources(
        &self,
        gid: &str,
        values: &[GroupResource],
    ) -> Result<(), GroupError> {
        let mut group = self.group(gid).await?;
        let hrefs: BTreeSet<&str> = values.iter().map(|r| r.href.as_str()).collect();
        let (removed, kept): (Vec<GroupResource>, Vec<GroupResource>) = group
            .resources
            .into_iter()
            .partition(|r| hrefs.contains(r.href.as_str()));
        group.resources = kept;
        if removed.is_empty() {
            return Ok(());
        }

        self.store.put_group(&group).await?;
        tracing::info!(gid, removed = removed.len(), "removed resources");

        for subgroup in &group.subgroups {
            Box::pin(self.delete_resources(subgroup, &removed)).await?;
        }

        self.sync.remove_ace_by_resources(&removed, gid).await
    }

    /* Replacements */

    pub async fn replace_name(&self, gid: &str, value: &str) -> Result<(), GroupError> {
        if value.is_empty() {
            return Ok(());
        }
        let mut group = self.group(gid).await?;
        group.name = value.to_string();
        self.store.put_group(&group).await?;
        tracing::info!(gid, name = value, "renamed group");
        Ok(())
    }

    pub async fn replace_owner(&self, gid: &str, value: &str) -> Result<(), GroupError> {
        if value.is_empty() {
            return Ok(());
        }
        let mut group = self.group(gid).await?;
        group.owner = value.to_string();
        self.store.put_group(&group).await?;
        tracing::info!(gid, owner = value, "handed over group");
        Ok(())
    }

    /* Whole groups */

    /// Delete a group, its whole subtree, and every ACE granted on their
    /// behalf.
    pub async fn delete_group(&self, gid: &str) -> Result<(), GroupError> {
        let group = self.group(gid).await?;

        if let Some(parent) = &group.parent {
            if let Some(mut parent_group) = self.store.group(parent).await? {
                if parent_group.subgroups.remove(gid) {
                    self.store.put_group(&parent_group).await?;
                }
            }
        }

        self.store.delete_group(gid).await?;
        tracing::info!(gid, subgroups = group.subgroups.len(), "deleted group");

        for subgroup in &group.subgroups {
            Box::pin(self.delete_group(subgroup)).await?;
        }

        self.sync.remove_ace_by_group(gid).await
    }

    /// Withdraw a device from every group its owner belongs to.
    #[tracing::instrument(skip(self))]
    pub async fn delete_devices_from_all_groups(&self, di: &str) -> Result<(), GroupError> {
        let owner = self.sync.device_owner_id(di).await?;
        let devices = BTreeSet::from([di.to_string()]);

        for group in self.store.groups_with_member(&owner).await? {
            if !group.devices.contains(di) && group.resources_on(&devices).next().is_none() {
                continue;
            }
            // an ancestor's cascade may already have removed the group
            if self.store.group(&group.gid).await?.is_none() {
                continue;
            }
            self.delete_devices(&group.gid, &devices).await?;
        }
        Ok(())
    }

    async fn cached_owner(
        &self,
        owners: &mut BTreeMap<String, String>,
        di: &str,
    ) -> Result<String, GroupError> {
        if let Some(owner) = owners.get(di) {
            return Ok(owner.clone());
        }
        let owner = self.sync.device_owner_id(di).await?;
        owners.insert(di.to_string(), owner.clone());
        Ok(owner)
    }
}
