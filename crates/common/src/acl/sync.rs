use std::collections::{BTreeMap, BTreeSet};

use super::ace::{merge_resources, remove_resources, Ace, AceResource, AceSpec};
use super::index::{AceFilter, AceRecord};
use crate::error::GroupError;
use crate::group::{Group, GroupResource, HrefError, Permission};
use crate::provider::{DeviceAclService, GroupStore, ProviderError};

/// Group resources keyed by the device they live on, with hrefs rewritten to
/// their device-local form.
pub(crate) fn resources_by_device(
    resources: &[GroupResource],
) -> Result<BTreeMap<String, Vec<AceResource>>, HrefError> {
    let mut by_device: BTreeMap<String, Vec<AceResource>> = BTreeMap::new();
    for resource in resources {
        let di = resource.device_id()?;
        by_device
            .entry(di.to_string())
            .or_default()
            .push(AceResource {
                href: resource.local_href()?.to_string(),
                resource_types: resource.resource_types.clone(),
                interfaces: resource.interfaces.clone(),
            });
    }
    Ok(by_device)
}

/// A device's ACL id and owner.
struct DeviceAcl {
    acl_id: String,
    owner: String,
}

/// Keeps device ACEs in line with group membership.
///
/// Every grant the synchronizer makes is recorded as an [`AceRecord`] in the
/// group store so it can later be narrowed, widened or revoked without
/// re-deriving it from the device's ACL. A device owner is never granted an
/// ACE on their own device.
#[derive(Debug, Clone)]
pub struct AclSynchronizer<S, A> {
    store: S,
    acls: A,
}

impl<S: GroupStore, A: DeviceAclService> AclSynchronizer<S, A> {
    pub fn new(store: S, acls: A) -> Self {
        Self { store, acls }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn acls(&self) -> &A {
        &self.acls
    }

    async fn group(&self, gid: &str) -> Result<Group, GroupError> {
        self.store
            .group(gid)
            .await?
            .ok_or_else(|| GroupError::GroupNotFound(gid.to_string()))
    }

    async fn acl_id(&self, di: &str) -> Result<String, GroupError> {
        self.acls
            .acl_id(di)
            .await?
            .ok_or_else(|| GroupError::Internal(format!("no acl registered for device {}", di)))
    }

    async fn device_acl(&self, di: &str) -> Result<DeviceAcl, GroupError> {
        let acl_id = self.acl_id(di).await?;
        let acl = self.acls.acl(&acl_id).await?;
        if acl.owner_id.is_empty() {
            return Err(GroupError::Internal(format!(
                "acl {} of device {} has no owner",
                acl_id, di
            )));
        }
        Ok(DeviceAcl {
            acl_id,
            owner: acl.owner_id,
        })
    }

    /// The user owning device `di`.
    pub async fn device_owner_id(&self, di: &str) -> Result<String, GroupError> {
        Ok(self.device_acl(di).await?.owner)
    }

    /// Grant every new member a wildcard ACE on each group device, then
    /// extend the group's resource-scoped grants to them.
    #[tracing::instrument(skip(self, members), fields(members = members.len()))]
    pub async fn add_ace_by_members(
        &self,
        gid: &str,
        permission: Permission,
        members: &BTreeSet<String>,
    ) -> Result<(), GroupError> {
        let group = self.group(gid).await?;

        for di in &group.devices {
            let device = self.device_acl(di).await?;
            for uid in members {
                self.grant(gid, di, &device, uid, permission, vec![AceResource::wildcard()])
                    .await?;
            }
        }

        for (di, resources) in resources_by_device(&group.resources)? {
            self.scope_device(gid, permission, &di, &resources, members)
                .await?;
        }

        Ok(())
    }

    /// Grant every group member a wildcard ACE on each new device.
    #[tracing::instrument(skip(self, devices), fields(devices = devices.len()))]
    pub async fn add_ace_by_devices(
        &self,
        gid: &str,
        permission: Permission,
        devices: &BTreeSet<String>,
    ) -> Result<(), GroupError> {
        let group = self.group(gid).await?;

        for di in devices {
            let device = self.device_acl(di).await?;
            for uid in &group.members {
                self.grant(gid, di, &device, uid, permission, vec![AceResource::wildcard()])
                    .await?;
            }
        }

        Ok(())
    }

    /// Scope grants to `resources` for `members` (the whole group when
    /// `None`), merging into existing grants on the same device.
    #[tracing::instrument(skip(self, resources, members), fields(resources = resources.len()))]
    pub async fn add_ace_by_resources(
        &self,
        gid: &str,
        permission: Permission,
        resources: &[GroupResource],
        members: Option<&BTreeSet<String>>,
    ) -> Result<(), GroupError> {
        let members = match members {
            Some(members) => members.clone(),
            None => self.group(gid).await?.members,
        };

        for (di, resources) in resources_by_device(resources)? {
            self.scope_device(gid, permission, &di, &resources, &members)
                .await?;
        }

        Ok(())
    }

    /// Revoke every grant made on behalf of a group.
    #[tracing::instrument(skip(self))]
    pub async fn remove_ace_by_group(&self, gid: &str) -> Result<(), GroupError> {
        let records = self.store.select_aces(&AceFilter::group(gid)).await?;
        self.revoke_all(records).await
    }

    /// Revoke grants held by the members, and grants on devices they own.
    #[tracing::instrument(skip(self, members), fields(members = members.len()))]
    pub async fn remove_ace_by_members(
        &self,
        members: &BTreeSet<String>,
        gid: &str,
    ) -> Result<(), GroupError> {
        let mut records = BTreeSet::new();
        for uid in members {
            records.extend(
                self.store
                    .select_aces(&AceFilter::group(gid).grantee(uid))
                    .await?,
            );
            records.extend(self.store.select_aces(&AceFilter::group(gid).owner(uid)).await?);
        }
        self.revoke_all(records).await
    }

    /// Revoke every grant the group made on the devices.
    #[tracing::instrument(skip(self, devices), fields(devices = devices.len()))]
    pub async fn remove_ace_by_devices(
        &self,
        devices: &BTreeSet<String>,
        gid: &str,
    ) -> Result<(), GroupError> {
        let mut records = Vec::new();
        for di in devices {
            records.extend(self.store.select_aces(&AceFilter::group(gid).device(di)).await?);
        }
        self.revoke_all(records).await
    }

    /// Narrow the group's grants by `resources`, revoking grants left empty.
    #[tracing::instrument(skip(self, resources), fields(resources = resources.len()))]
    pub async fn remove_ace_by_resources(
        &self,
        resources: &[GroupResource],
        gid: &str,
    ) -> Result<(), GroupError> {
        for (di, removed) in resources_by_device(resources)? {
            let records = self
                .store
                .select_aces(&AceFilter::group(gid).device(&di))
                .await?;
            if records.is_empty() {
                continue;
            }

            let acl_id = self.acl_id(&di).await?;
            let hrefs: Vec<&str> = removed.iter().map(|r| r.href.as_str()).collect();

            for record in records {
                let ace = self.recorded_ace(&acl_id, &record).await?;
                let remaining = remove_resources(&ace.spec.resources, &hrefs);
                if remaining.len() == ace.spec.resources.len() {
                    continue;
                }

                if remaining.is_empty() {
                    self.revoke(&record).await?;
                } else {
                    let spec = AceSpec {
                        resources: remaining,
                        ..ace.spec
                    };
                    self.acls.update_ace(&acl_id, &record.aceid, &spec).await?;
                    tracing::debug!(
                        gid,
                        di = %record.di,
                        uid = %record.uid,
                        aceid = %record.aceid,
                        remaining = spec.resources.len(),
                        "narrowed ace"
                    );
                }
            }
        }

        Ok(())
    }

    /// Merge-or-create resource-scoped grants on one device.
    async fn scope_device(
        &self,
        gid: &str,
        permission: Permission,
        di: &str,
        resources: &[AceResource],
        members: &BTreeSet<String>,
    ) -> Result<(), GroupError> {
        let device = self.device_acl(di).await?;

        for uid in members {
            if *uid == device.owner {
                continue;
            }

            let existing = self
                .store
                .select_aces(&AceFilter::group(gid).device(di).grantee(uid))
                .await?;

            let Some(record) = existing.first() else {
                self.grant(gid, di, &device, uid, permission, resources.to_vec())
                    .await?;
                continue;
            };

            let ace = self.recorded_ace(&device.acl_id, record).await?;
            let merged = merge_resources(&ace.spec.resources, resources);
            if merged == ace.spec.resources {
                continue;
            }

            let spec = AceSpec {
                resources: merged,
                ..ace.spec
            };
            self.acls
                .update_ace(&device.acl_id, &record.aceid, &spec)
                .await?;
            tracing::debug!(
                gid,
                di,
                uid = %uid,
                aceid = %record.aceid,
                resources = spec.resources.len(),
                "widened ace"
            );
        }

        Ok(())
    }

    /// Create an ACE for `uid` on a device and record it, unless `uid` owns
    /// the device or the group already granted it one.
    async fn grant(
        &self,
        gid: &str,
        di: &str,
        device: &DeviceAcl,
        uid: &str,
        permission: Permission,
        resources: Vec<AceResource>,
    ) -> Result<(), GroupError> {
        if uid == device.owner {
            return Ok(());
        }

        let existing = self
            .store
            .select_aces(&AceFilter::group(gid).device(di).grantee(uid))
            .await?;
        if !existing.is_empty() {
            tracing::debug!(gid, di, uid, "ace already granted");
            return Ok(());
        }

        let spec = AceSpec::for_user(uid, permission, resources);
        let aceid = self.acls.create_ace(&device.acl_id, &spec).await?;
        self.store
            .insert_ace(&AceRecord {
                aceid: aceid.clone(),
                gid: gid.to_string(),
                di: di.to_string(),
                uid: uid.to_string(),
                oid: device.owner.clone(),
            })
            .await?;

        tracing::debug!(
            gid,
            di,
            uid,
            %aceid,
            %permission,
            wildcard = spec.is_wildcard(),
            "granted ace"
        );
        Ok(())
    }

    async fn recorded_ace(
        &self,
        acl_id: &str,
        record: &AceRecord,
    ) -> Result<Ace, GroupError> {
        self.acls
            .ace(acl_id, &record.aceid)
            .await
            .map_err(|e| match e {
                ProviderError::NotFound(what) => GroupError::Internal(format!(
                    "record for group {} device {} subject {} points at missing {}",
                    record.gid, record.di, record.uid, what
                )),
                e => e.into(),
            })
    }

    async fn revoke_all(
        &self,
        records: impl IntoIterator<Item = AceRecord>,
    ) -> Result<(), GroupError> {
        for record in records {
            self.revoke(&record).await?;
        }
        Ok(())
    }

    /// Delete a recorded ACE from its device and drop the record.
    ///
    /// An ACE (or whole ACL) that is already gone on the device still has its
    /// record dropped.
    async fn revoke(&self, record: &AceRecord) -> Result<(), GroupError> {
        match self.acls.acl_id(&record.di).await? {
            Some(acl_id) => match self.acls.delete_ace(&acl_id, &record.aceid).await {
                Ok(()) => {}
                Err(ProviderError::NotFound(what)) => {
                    tracing::warn!(aceid = %record.aceid, di = %record.di, "{} already gone", what);
                }
                Err(e) => return Err(e.into()),
            },
            None => {
                tracing::warn!(di = %record.di, "device acl is gone, dropping ace record");
            }
        }

        self.store
            .delete_aces(&AceFilter::default().aceid(&record.aceid))
            .await?;

        tracing::debug!(
            gid = %record.gid,
            di = %record.di,
            uid = %record.uid,
            aceid = %record.aceid,
            "revoked ace"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{MemoryAclService, MemoryGroupStore};

    fn light(href: &str) -> GroupResource {
        GroupResource::new(href, ["core.light"], ["oic.if.baseline"])
    }

    fn set(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    async fn setup(
        group: Group,
        devices: &[(&str, &str)],
    ) -> AclSynchronizer<MemoryGroupStore, MemoryAclService> {
        let store = MemoryGroupStore::new();
        let acls = MemoryAclService::new();
        store.put_group(&group).await.unwrap();
        for (di, owner) in devices {
            acls.register_device(di, owner).unwrap();
        }
        AclSynchronizer::new(store, acls)
    }

    async fn hrefs(
        sync: &AclSynchronizer<MemoryGroupStore, MemoryAclService>,
        record: &AceRecord,
    ) -> Vec<String> {
        let acl_id = sync.acls.acl_id(&record.di).await.unwrap().unwrap();
        sync.acls
            .ace(&acl_id, &record.aceid)
            .await
            .unwrap()
            .spec
            .resources
            .into_iter()
            .map(|r| r.href)
            .collect()
    }

    #[test]
    fn test_resources_by_device() {
        let by_device = resources_by_device(&[
            light("/di/d1/a/light/1"),
            light("/di/d2/a/light/1"),
            light("/di/d1/a/light/2"),
        ])
        .unwrap();
        assert_eq!(by_device.len(), 2);
        let d1: Vec<_> = by_device["d1"].iter().map(|r| r.href.as_str()).collect();
        assert_eq!(d1, vec!["/a/light/1", "/a/light/2"]);
    }

    #[tokio::test]
    async fn test_resource_grants_skip_owner() {
        let mut group = Group::new("g1", "myhome", "u1", None, Permission::DEFAULT);
        group.members.insert("u2".to_string());
        let sync = setup(group, &[("d1", "u1")]).await;

        sync.add_ace_by_resources(
            "g1",
            Permission::DEFAULT,
            &[light("/di/d1/a/light/1"), light("/di/d1/a/light/2")],
            None,
        )
        .await
        .unwrap();

        let records = sync.store.select_aces(&AceFilter::group("g1")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].uid, "u2");
        assert_eq!(records[0].oid, "u1");
        assert_eq!(hrefs(&sync, &records[0]).await, vec!["/a/light/1", "/a/light/2"]);
    }

    #[tokio::test]
    async fn test_owner_passed_explicitly_is_skipped() {
        let group = Group::new("g1", "myhome", "u1", None, Permission::DEFAULT);
        let sync = setup(group, &[("d1", "u1")]).await;

        sync.add_ace_by_resources(
            "g1",
            Permission::DEFAULT,
            &[light("/di/d1/a/light/1")],
            Some(&set(&["u1"])),
        )
        .await
        .unwrap();
        sync.add_ace_by_devices("g1", Permission::DEFAULT, &set(&["d1"]))
            .await
            .unwrap();

        assert!(sync
            .store
            .select_aces(&AceFilter::default())
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_first_resource_converts_wildcard() {
        let mut group = Group::new("g1", "myhome", "u1", None, Permission::DEFAULT);
        group.members.insert("u2".to_string());
        group.devices.insert("d1".to_string());
        let sync = setup(group, &[("d1", "u1")]).await;

        sync.add_ace_by_devices("g1", Permission::DEFAULT, &set(&["d1"]))
            .await
            .unwrap();
        let records = sync.store.select_aces(&AceFilter::group("g1")).await.unwrap();
        assert_eq!(hrefs(&sync, &records[0]).await, vec!["*"]);

        sync.add_ace_by_resources("g1", Permission::DEFAULT, &[light("/di/d1/a/light/1")], None)
            .await
            .unwrap();
        let after = sync.store.select_aces(&AceFilter::group("g1")).await.unwrap();
        assert_eq!(after, records);
        assert_eq!(hrefs(&sync, &after[0]).await, vec!["/a/light/1"]);
    }

    #[tokio::test]
    async fn test_remove_resources_narrows_then_revokes() {
        let mut group = Group::new("g1", "myhome", "u1", None, Permission::DEFAULT);
        group.members.insert("u3".to_string());
        let sync = setup(group, &[("d2", "u1")]).await;
        let both = [light("/di/d2/a/light/1"), light("/di/d2/a/light/2")];

        sync.add_ace_by_resources("g1", Permission::DEFAULT, &both, None)
            .await
            .unwrap();

        sync.remove_ace_by_resources(&both[..1], "g1").await.unwrap();
        let records = sync.store.select_aces(&AceFilter::group("g1")).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(hrefs(&sync, &records[0]).await, vec!["/a/light/2"]);

        sync.remove_ace_by_resources(&both[1..], "g1").await.unwrap();
        assert!(sync
            .store
            .select_aces(&AceFilter::group("g1"))
            .await
            .unwrap()
            .is_empty());
        let acl_id = sync.acls.acl_id("d2").await.unwrap().unwrap();
        assert!(sync.acls.acl(&acl_id).await.unwrap().aces.is_empty());
    }

    #[tokio::test]
    async fn test_remove_by_members_covers_owned_devices() {
        let mut group = Group::new("g1", "myhome", "u1", None, Permission::DEFAULT);
        group.members.extend(["u2".to_string(), "u3".to_string()]);
        group.devices.extend(["d1".to_string(), "d2".to_string()]);
        let sync = setup(group, &[("d1", "u1"), ("d2", "u2")]).await;

        sync.add_ace_by_devices("g1", Permission::DEFAULT, &set(&["d1", "d2"]))
            .await
            .unwrap();
        // u2, u3 on d1; u1, u3 on d2
        assert_eq!(
            sync.store.select_aces(&AceFilter::group("g1")).await.unwrap().len(),
            4
        );

        sync.remove_ace_by_members(&set(&["u2"]), "g1").await.unwrap();
        let left = sync.store.select_aces(&AceFilter::group("g1")).await.unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!((left[0].di.as_str(), left[0].uid.as_str()), ("d1", "u3"));
    }

    #[tokio::test]
    async fn test_missing_owner_is_internal_error() {
        let group = Group::new("g1", "myhome", "u1", None, Permission::DEFAULT);
        let sync = setup(group, &[]).await;
        let result = sync.device_owner_id("d9").await;
        assert!(matches!(result, Err(GroupError::Internal(_))));
    }
}
