//! The group manager running on the SQLite backend

use std::collections::BTreeSet;

use common::acl::{AceFilter, WILDCARD_HREF};
use common::group::{GroupResource, Property, PropertyUpdate};
use common::manager::GroupManager;
use common::policy::GroupPolicy;
use common::provider::{DeviceAclService, GroupStore};
use store::SqliteStore;

type Manager = GroupManager<SqliteStore, SqliteStore, GroupPolicy<SqliteStore>>;

fn ids(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn manager(store: &SqliteStore) -> Manager {
    GroupManager::new(store.clone(), store.clone(), GroupPolicy::new(store.clone()))
}

async fn hrefs_for(store: &SqliteStore, di: &str, uid: &str) -> Vec<String> {
    let aclid = store.acl_id(di).await.unwrap().unwrap();
    store
        .acl(&aclid)
        .await
        .unwrap()
        .aces
        .into_iter()
        .filter(|ace| ace.spec.subject_id == uid)
        .flat_map(|ace| ace.spec.resources.into_iter().map(|r| r.href))
        .collect()
}

#[tokio::test]
async fn test_grants_follow_membership() {
    let store = SqliteStore::in_memory().await.unwrap();
    store.register_device("d1", "u1").await.unwrap();
    let manager = manager(&store);

    manager
        .create_group("u1", "myhome", None, Some("g1".to_string()))
        .await
        .unwrap();
    manager
        .add_properties(
            "g1",
            "u1",
            &PropertyUpdate::new()
                .with(Property::Members(ids(&["u2", "u3"])))
                .with(Property::Devices(ids(&["d1"]))),
        )
        .await
        .unwrap();

    assert_eq!(hrefs_for(&store, "d1", "u2").await, vec![WILDCARD_HREF]);
    assert!(hrefs_for(&store, "d1", "u1").await.is_empty());
    assert_eq!(
        store
            .select_aces(&AceFilter::group("g1").device("d1"))
            .await
            .unwrap()
            .len(),
        2
    );

    manager
        .delete_properties(
            "g1",
            "u1",
            &PropertyUpdate::new().with(Property::Members(ids(&["u2"]))),
        )
        .await
        .unwrap();

    assert!(hrefs_for(&store, "d1", "u2").await.is_empty());
    assert_eq!(hrefs_for(&store, "d1", "u3").await, vec![WILDCARD_HREF]);
    assert!(store.groups_with_member("u2").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_subtree_delete_on_disk() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("db.sqlite");
    let store = SqliteStore::new(&path).await.unwrap();
    store.register_device("d1", "u1").await.unwrap();
    let manager = manager(&store);

    manager
        .create_group("u1", "home", None, Some("g1".to_string()))
        .await
        .unwrap();
    manager
        .create_group("u1", "kitchen", Some("g1"), Some("g2".to_string()))
        .await
        .unwrap();

    let light = GroupResource::new("/di/d1/a/light/1", ["core.light"], ["oic.if.baseline"]);
    for gid in ["g1", "g2"] {
        manager
            .add_properties(
                gid,
                "u1",
                &PropertyUpdate::new().with(Property::Members(ids(&["u2"]))),
            )
            .await
            .unwrap();
        manager
            .add_properties(
                gid,
                "u1",
                &PropertyUpdate::new().with(Property::Resources(vec![light.clone()])),
            )
            .await
            .unwrap();
    }
    assert_eq!(store.select_aces(&AceFilter::default()).await.unwrap().len(), 2);

    manager.remove_group("g1", "u1").await.unwrap();

    // state survives reopening the file
    let reopened = SqliteStore::new(&path).await.unwrap();
    assert_eq!(reopened.group("g1").await.unwrap(), None);
    assert_eq!(reopened.group("g2").await.unwrap(), None);
    assert!(reopened
        .select_aces(&AceFilter::default())
        .await
        .unwrap()
        .is_empty());
    assert!(hrefs_for(&reopened, "d1", "u2").await.is_empty());
}
