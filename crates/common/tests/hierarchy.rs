//! Integration tests for subgroup scoping and cascading deletes

mod common;

use ::common::acl::AceFilter;
use ::common::error::{ErrorKind, GroupError};
use ::common::group::{Property, PropertyUpdate};

use self::common::{ids, light, TestEnv};

fn members(values: &[&str]) -> PropertyUpdate {
    PropertyUpdate::new().with(Property::Members(ids(values)))
}

fn devices(values: &[&str]) -> PropertyUpdate {
    PropertyUpdate::new().with(Property::Devices(ids(values)))
}

/// g1 -> g2 -> g3, all sharing u2 and u1's device d1
async fn three_levels() -> TestEnv {
    let env = common::setup_test_env();
    env.register_device("d1", "u1");
    env.create_group("u1", "g1", None).await;
    env.create_group("u1", "g2", Some("g1")).await;
    env.create_group("u1", "g3", Some("g2")).await;

    for gid in ["g1", "g2", "g3"] {
        env.manager
            .add_properties(gid, "u1", &members(&["u2"]))
            .await
            .unwrap();
        env.manager
            .add_properties(gid, "u1", &devices(&["d1"]))
            .await
            .unwrap();
    }
    env
}

#[tokio::test]
async fn test_subgroup_members_must_belong_to_parent() {
    let env = common::setup_test_env();
    env.create_group("u1", "g1", None).await;
    env.manager
        .add_properties("g1", "u1", &members(&["u2"]))
        .await
        .unwrap();
    env.create_group("u1", "g2", Some("g1")).await;

    let result = env.manager.add_properties("g2", "u1", &members(&["u3"])).await;
    assert!(matches!(result, Err(GroupError::BadRequest(_))));
    assert_eq!(env.group("g2").await.unwrap().members, ids(&["u1"]));

    env.manager
        .add_properties("g2", "u1", &members(&["u2"]))
        .await
        .unwrap();
    assert_eq!(env.group("g2").await.unwrap().members, ids(&["u1", "u2"]));
}

#[tokio::test]
async fn test_subgroup_devices_must_be_shared_with_parent() {
    let env = common::setup_test_env();
    env.register_device("d1", "u1");
    env.create_group("u1", "g1", None).await;
    env.create_group("u1", "g2", Some("g1")).await;

    let result = env.manager.add_properties("g2", "u1", &devices(&["d1"])).await;
    assert!(matches!(result, Err(GroupError::BadRequest(_))));

    env.manager
        .add_properties("g1", "u1", &devices(&["d1"]))
        .await
        .unwrap();
    env.manager
        .add_properties("g2", "u1", &devices(&["d1"]))
        .await
        .unwrap();
    assert!(env.group("g2").await.unwrap().devices.contains("d1"));
}

#[tokio::test]
async fn test_subgroup_resources_need_parent_device_or_resource() {
    let env = common::setup_test_env();
    env.register_device("d1", "u1");
    env.create_group("u1", "g1", None).await;
    env.create_group("u1", "g2", Some("g1")).await;
    env.manager
        .add_properties(
            "g1",
            "u1",
            &PropertyUpdate::new().with(Property::Resources(vec![light("/di/d1/a/light/1")])),
        )
        .await
        .unwrap();

    let shared = PropertyUpdate::new().with(Property::Resources(vec![light("/di/d1/a/light/1")]));
    env.manager.add_properties("g2", "u1", &shared).await.unwrap();

    let unshared = PropertyUpdate::new().with(Property::Resources(vec![light("/di/d1/a/light/2")]));
    let result = env.manager.add_properties("g2", "u1", &unshared).await;
    assert!(matches!(result, Err(GroupError::BadRequest(_))));
}

#[tokio::test]
async fn test_member_removal_cascades_to_descendants() {
    let env = three_levels().await;
    assert_eq!(env.records(AceFilter::default().grantee("u2")).await.len(), 3);

    env.manager
        .delete_properties("g1", "u1", &members(&["u2"]))
        .await
        .unwrap();

    for gid in ["g1", "g2", "g3"] {
        assert_eq!(env.group(gid).await.unwrap().members, ids(&["u1"]));
    }
    assert!(env.records(AceFilter::default()).await.is_empty());
    assert!(env.acl("d1").await.aces.is_empty());
}

#[tokio::test]
async fn test_device_removal_cascades_to_descendants() {
    let env = three_levels().await;

    env.manager
        .delete_properties("g2", "u1", &devices(&["d1"]))
        .await
        .unwrap();

    assert!(env.group("g1").await.unwrap().devices.contains("d1"));
    assert!(env.group("g2").await.unwrap().devices.is_empty());
    assert!(env.group("g3").await.unwrap().devices.is_empty());

    let records = env.records(AceFilter::default()).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].gid, "g1");
    assert_eq!(env.acl("d1").await.aces.len(), 1);
}

#[tokio::test]
async fn test_resource_removal_cascades_to_descendants() {
    let env = common::setup_test_env();
    env.register_device("d1", "u1");
    env.create_group("u1", "g1", None).await;
    env.create_group("u1", "g2", Some("g1")).await;
    let resource = PropertyUpdate::new().with(Property::Resources(vec![light("/di/d1/a/light/1")]));
    for gid in ["g1", "g2"] {
        env.manager
            .add_properties(gid, "u1", &members(&["u2"]))
            .await
            .unwrap();
        env.manager.add_properties(gid, "u1", &resource).await.unwrap();
    }
    assert_eq!(env.acl("d1").await.aces.len(), 2);

    env.manager
        .delete_properties("g1", "u1", &resource)
        .await
        .unwrap();

    assert!(env.group("g2").await.unwrap().resources.is_empty());
    assert!(env.acl("d1").await.aces.is_empty());
    assert!(env.records(AceFilter::default()).await.is_empty());
}

#[tokio::test]
async fn test_noop_delete_leaves_subgroups_alone() {
    let env = three_levels().await;

    // u3 was never a member anywhere
    env.manager
        .delete_members("g1", &ids(&["u3"]))
        .await
        .unwrap();

    assert_eq!(env.records(AceFilter::default()).await.len(), 3);
}

#[tokio::test]
async fn test_delete_group_removes_subtree() {
    let env = three_levels().await;

    let result = env.manager.remove_group("g2", "u2").await;
    assert_eq!(result.unwrap_err().kind(), ErrorKind::Unauthorized);

    env.manager.remove_group("g2", "u1").await.unwrap();

    assert!(env.group("g2").await.is_none());
    assert!(env.group("g3").await.is_none());
    assert!(env.group("g1").await.unwrap().subgroups.is_empty());

    let records = env.records(AceFilter::default()).await;
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].gid, "g1");
}

#[tokio::test]
async fn test_delete_device_from_all_groups() {
    let env = three_levels().await;
    env.create_group("u1", "g4", None).await;
    env.manager
        .add_properties("g4", "u1", &members(&["u3"]))
        .await
        .unwrap();
    env.manager
        .add_properties("g4", "u1", &devices(&["d1"]))
        .await
        .unwrap();

    env.manager.delete_devices_from_all_groups("d1").await.unwrap();

    for gid in ["g1", "g2", "g3", "g4"] {
        assert!(env.group(gid).await.unwrap().devices.is_empty());
    }
    assert!(env.acl("d1").await.aces.is_empty());
    assert!(env.records(AceFilter::default()).await.is_empty());
}

#[tokio::test]
async fn test_owner_cannot_be_removed() {
    let env = three_levels().await;

    let result = env
        .manager
        .delete_properties("g2", "u1", &members(&["u1"]))
        .await;
    assert!(matches!(result, Err(GroupError::BadRequest(_))));
    assert!(env.group("g2").await.unwrap().members.contains("u1"));
}

fn masters(values: &[&str]) -> PropertyUpdate {
    PropertyUpdate::new().with(Property::Masters(ids(values)))
}

/// g1 -> g2, u2 a member and master of both
async fn mastered_pair() -> TestEnv {
    let env = common::setup_test_env();
    env.create_group("u1", "g1", None).await;
    env.create_group("u1", "g2", Some("g1")).await;
    for gid in ["g1", "g2"] {
        env.manager
            .add_properties(gid, "u1", &members(&["u2"]))
            .await
            .unwrap();
        env.manager
            .add_properties(gid, "u1", &masters(&["u2"]))
            .await
            .unwrap();
        assert_eq!(env.group(gid).await.unwrap().masters, ids(&["u2"]));
    }
    env
}

#[tokio::test]
async fn test_master_removal_cascades_to_descendants() {
    let env = mastered_pair().await;

    env.manager
        .delete_properties("g1", "u1", &masters(&["u2"]))
        .await
        .unwrap();

    for gid in ["g1", "g2"] {
        let group = env.group(gid).await.unwrap();
        assert!(group.masters.is_empty());
        assert_eq!(group.members, ids(&["u1", "u2"]));
    }
}

#[tokio::test]
async fn test_member_removal_drops_mastership() {
    let env = mastered_pair().await;

    env.manager
        .delete_properties("g1", "u1", &members(&["u2"]))
        .await
        .unwrap();

    for gid in ["g1", "g2"] {
        let group = env.group(gid).await.unwrap();
        assert!(group.masters.is_empty());
        assert_eq!(group.members, ids(&["u1"]));
    }
}
