//! Shared test utilities for group engine integration tests
#![allow(dead_code)]

use std::collections::BTreeSet;

use common::acl::{AceFilter, AceRecord, AclDocument};
use common::group::{Group, GroupResource};
use common::manager::GroupManager;
use common::policy::GroupPolicy;
use common::provider::{DeviceAclService, GroupStore, MemoryAclService, MemoryGroupStore};
use tracing_subscriber::EnvFilter;

pub type TestManager =
    GroupManager<MemoryGroupStore, MemoryAclService, GroupPolicy<MemoryGroupStore>>;

pub struct TestEnv {
    pub manager: TestManager,
    pub store: MemoryGroupStore,
    pub acls: MemoryAclService,
}

/// Set up a fresh engine over in-memory providers
pub fn setup_test_env() -> TestEnv {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let store = MemoryGroupStore::new();
    let acls = MemoryAclService::new();
    let manager = GroupManager::new(store.clone(), acls.clone(), GroupPolicy::new(store.clone()));

    TestEnv {
        manager,
        store,
        acls,
    }
}

impl TestEnv {
    pub fn register_device(&self, di: &str, owner: &str) {
        self.acls.register_device(di, owner).unwrap();
    }

    /// Create a group with a fixed id
    pub async fn create_group(&self, owner: &str, gid: &str, parent: Option<&str>) -> Group {
        self.manager
            .create_group(owner, gid, parent, Some(gid.to_string()))
            .await
            .unwrap()
    }

    pub async fn group(&self, gid: &str) -> Option<Group> {
        self.store.group(gid).await.unwrap()
    }

    pub async fn records(&self, filter: AceFilter) -> Vec<AceRecord> {
        self.store.select_aces(&filter).await.unwrap()
    }

    pub async fn acl(&self, di: &str) -> AclDocument {
        let acl_id = self.acls.acl_id(di).await.unwrap().unwrap();
        self.acls.acl(&acl_id).await.unwrap()
    }

    /// Resource hrefs of every ACE granted to `uid` on `di`
    pub async fn granted_hrefs(&self, di: &str, uid: &str) -> Vec<Vec<String>> {
        self.acl(di)
            .await
            .aces
            .iter()
            .filter(|ace| ace.spec.subject_id == uid)
            .map(|ace| ace.spec.resources.iter().map(|r| r.href.clone()).collect())
            .collect()
    }

    /// No ACE record ever grants a device owner access to their own device
    pub async fn assert_no_owner_grants(&self) {
        for record in self.records(AceFilter::default()).await {
            assert_ne!(record.uid, record.oid, "owner granted on own device: {:?}", record);
        }
    }
}

pub fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

pub fn light(href: &str) -> GroupResource {
    GroupResource::new(href, ["core.light"], ["oic.if.baseline"])
}
