use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use uuid::Uuid;

use super::{DeviceAclService, GroupStore, ProviderError};
use crate::acl::{Ace, AceFilter, AceRecord, AceSpec, AclDocument};
use crate::group::Group;

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>, ProviderError> {
    lock.read().map_err(|e| {
        ProviderError::Internal(format!("failed to acquire read lock: {}", e))
    })
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>, ProviderError> {
    lock.write().map_err(|e| {
        ProviderError::Internal(format!("failed to acquire write lock: {}", e))
    })
}

/// In-memory group store using HashMaps
#[derive(Debug, Clone, Default)]
pub struct MemoryGroupStore {
    inner: Arc<RwLock<MemoryGroupStoreInner>>,
}

#[derive(Debug, Default)]
struct MemoryGroupStoreInner {
    /// gid -> group record
    groups: HashMap<String, Group>,
    /// aceid -> cross-reference record
    aces: BTreeMap<String, AceRecord>,
}

impl MemoryGroupStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GroupStore for MemoryGroupStore {
    async fn group(&self, gid: &str) -> Result<Option<Group>, ProviderError> {
        let inner = read(&self.inner)?;
        Ok(inner.groups.get(gid).cloned())
    }

    async fn put_group(&self, group: &Group) -> Result<(), ProviderError> {
        let mut inner = write(&self.inner)?;
        inner.groups.insert(group.gid.clone(), group.clone());
        Ok(())
    }

    async fn delete_group(&self, gid: &str) -> Result<bool, ProviderError> {
        let mut inner = write(&self.inner)?;
        Ok(inner.groups.remove(gid).is_some())
    }

    async fn groups_with_member(&self, uid: &str) -> Result<Vec<Group>, ProviderError> {
        let inner = read(&self.inner)?;
        let mut groups: Vec<Group> = inner
            .groups
            .values()
            .filter(|group| group.members.contains(uid))
            .cloned()
            .collect();
        groups.sort_by(|a, b| a.gid.cmp(&b.gid));
        Ok(groups)
    }

    async fn select_aces(&self, filter: &AceFilter) -> Result<Vec<AceRecord>, ProviderError> {
        let inner = read(&self.inner)?;
        Ok(inner
            .aces
            .values()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect())
    }

    async fn insert_ace(&self, record: &AceRecord) -> Result<(), ProviderError> {
        let mut inner = write(&self.inner)?;

        let duplicate = inner.aces.values().any(|existing| {
            existing.aceid == record.aceid
                || (existing.gid == record.gid
                    && existing.di == record.di
                    && existing.uid == record.uid)
        });
        if duplicate {
            return Err(ProviderError::Conflict(format!(
                "ace record for group {} device {} subject {}",
                record.gid, record.di, record.uid
            )));
        }

        inner.aces.insert(record.aceid.clone(), record.clone());
        Ok(())
    }

    async fn delete_aces(&self, filter: &AceFilter) -> Result<u64, ProviderError> {
        let mut inner = write(&self.inner)?;
        let before = inner.aces.len();
        inner.aces.retain(|_, record| !filter.matches(record));
        Ok((before - inner.aces.len()) as u64)
    }
}

/// In-memory device ACL service.
///
/// Devices must be registered with an owner before the engine can grant ACEs
/// on them.
#[derive(Debug, Clone, Default)]
pub struct MemoryAclService {
    inner: Arc<RwLock<MemoryAclServiceInner>>,
}

#[derive(Debug, Default)]
struct MemoryAclServiceInner {
    /// aclid -> document
    acls: HashMap<String, AclDocument>,
    /// di -> aclid
    devices: HashMap<String, String>,
}

impl MemoryAclServiceInner {
    fn acl_mut(&mut self, acl_id: &str) -> Result<&mut AclDocument, ProviderError> {
        self.acls
            .get_mut(acl_id)
            .ok_or_else(|| ProviderError::NotFound(format!("acl {}", acl_id)))
    }
}

impl MemoryAclService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty ACL for `di` owned by `owner`, returning its id.
    ///
    /// Registering an already known device returns the existing ACL id.
    pub fn register_device(&self, di: &str, owner: &str) -> Result<String, ProviderError> {
        let mut inner = write(&self.inner)?;
        if let Some(acl_id) = inner.devices.get(di) {
            return Ok(acl_id.clone());
        }

        let acl_id = Uuid::new_v4().to_string();
        inner.acls.insert(
            acl_id.clone(),
            AclDocument {
                aclid: acl_id.clone(),
                di: di.to_string(),
                owner_id: owner.to_string(),
                aces: Vec::new(),
            },
        );
        inner.devices.insert(di.to_string(), acl_id.clone());
        Ok(acl_id)
    }

    /// Drop a device's ACL entirely.
    pub fn forget_device(&self, di: &str) -> Result<bool, ProviderError> {
        let mut inner = write(&self.inner)?;
        let Some(acl_id) = inner.devices.remove(di) else {
            return Ok(false);
        };
        inner.acls.remove(&acl_id);
        Ok(true)
    }
}

#[async_trait]
impl DeviceAclService for MemoryAclService {
    async fn acl_id(&self, di: &str) -> Result<Option<String>, ProviderError> {
        let inner = read(&self.inner)?;
        Ok(inner.devices.get(di).cloned())
    }

    async fn acl(&self, acl_id: &str) -> Result<AclDocument, ProviderError> {
        let inner = read(&self.inner)?;
        inner
            .acls
            .get(acl_id)
            .cloned()
            .ok_or_else(|| ProviderError::NotFound(format!("acl {}", acl_id)))
    }

    async fn create_ace(&self, acl_id: &str, spec: &AceSpec) -> Result<String, ProviderError> {
        let mut inner = write(&self.inner)?;
        let acl = inner.acl_mut(acl_id)?;
        let aceid = Uuid::new_v4().to_string();
        acl.aces.push(Ace {
            aceid: aceid.clone(),
            spec: spec.clone(),
        });
        Ok(aceid)
    }

    async fn update_ace(
        &self,
        acl_id: &str,
        aceid: &str,
        spec: &AceSpec,
    ) -> Result<(), ProviderError> {
        let mut inner = write(&self.inner)?;
        let acl = inner.acl_mut(acl_id)?;
        let ace = acl
            .aces
            .iter_mut()
            .find(|ace| ace.aceid == aceid)
            .ok_or_else(|| ProviderError::NotFound(format!("ace {} in acl {}", aceid, acl_id)))?;
        ace.spec = spec.clone();
        Ok(())
    }

    async fn delete_ace(&self, acl_id: &str, aceid: &str) -> Result<(), ProviderError> {
        let mut inner = write(&self.inner)?;
        let acl = inner.acl_mut(acl_id)?;
        let before = acl.aces.len();
        acl.aces.retain(|ace| ace.aceid != aceid);
        if acl.aces.len() == before {
            return Err(ProviderError::NotFound(format!(
                "ace {} in acl {}",
                aceid, acl_id
            )));
        }
        Ok(())
    }
}
