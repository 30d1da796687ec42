use async_trait::async_trait;
use common::acl::{Ace, AceSpec, AclDocument};
use common::provider::{DeviceAclService, ProviderError};
use sqlx::Row;
use uuid::Uuid;

use crate::database::{now, SqliteStore};
use crate::error::{Result, StoreError};

/// A registered device and the id of its ACL document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceEntry {
    pub di: String,
    pub owner: String,
    pub aclid: String,
}

impl SqliteStore {
    /// Create an empty ACL for `di` owned by `owner`, returning its id.
    ///
    /// Registering an already known device returns the existing ACL id and
    /// leaves its owner untouched.
    pub async fn register_device(&self, di: &str, owner: &str) -> Result<String> {
        if let Some(aclid) = self.device_acl_id(di).await? {
            return Ok(aclid);
        }

        let aclid = Uuid::new_v4().to_string();
        sqlx::query(
            r#"
            INSERT INTO device_acls (aclid, di, owner, created_at)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(&aclid)
        .bind(di)
        .bind(owner)
        .bind(now())
        .execute(&self.pool)
        .await?;

        tracing::debug!(di, owner, aclid = %aclid, "registered device");
        Ok(aclid)
    }

    /// Drop a device's ACL and every ACE in it.
    pub async fn forget_device(&self, di: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM device_acls WHERE di = ?
            "#,
        )
        .bind(di)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn devices(&self) -> Result<Vec<DeviceEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT di, owner, aclid FROM device_acls ORDER BY di
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| DeviceEntry {
                di: row.get("di"),
                owner: row.get("owner"),
                aclid: row.get("aclid"),
            })
            .collect())
    }

    pub async fn device_acl_id(&self, di: &str) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT aclid FROM device_acls WHERE di = ?
            "#,
        )
        .bind(di)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(|row| row.get("aclid")))
    }

    pub async fn acl_document(&self, aclid: &str) -> Result<AclDocument> {
        let acl = sqlx::query(
            r#"
            SELECT di, owner FROM device_acls WHERE aclid = ?
            "#,
        )
        .bind(aclid)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| StoreError::NotFound(format!("acl {}", aclid)))?;

        let rows = sqlx::query(
            r#"
            SELECT aceid, body FROM device_aces WHERE aclid = ? ORDER BY position
            "#,
        )
        .bind(aclid)
        .fetch_all(&self.pool)
        .await?;

        let mut aces = Vec::with_capacity(rows.len());
        for row in rows {
            let body: String = row.get("body");
            aces.push(Ace {
                aceid: row.get("aceid"),
                spec: serde_json::from_str(&body)?,
            });
        }

        Ok(AclDocument {
            aclid: aclid.to_string(),
            di: acl.get("di"),
            owner_id: acl.get("owner"),
            aces,
        })
    }

    async fn ensure_acl(&self, aclid: &str) -> Result<()> {
        let exists = sqlx::query(
            r#"
            SELECT 1 FROM device_acls WHERE aclid = ?
            "#,
        )
        .bind(aclid)
        .fetch_optional(&self.pool)
        .await?
        .is_some();

        if !exists {
            return Err(StoreError::NotFound(format!("acl {}", aclid)));
        }
        Ok(())
    }

    pub async fn insert_device_ace(&self, aclid: &str, spec: &AceSpec) -> Result<String> {
        self.ensure_acl(aclid).await?;

        let aceid = Uuid::new_v4().to_string();
        let body = serde_json::to_string(spec)?;
        sqlx::query(
            r#"
            INSERT INTO device_aces (aceid, aclid, position, body, updated_at)
            VALUES (
                ?, ?,
                (SELECT COALESCE(MAX(position), 0) + 1 FROM device_aces WHERE aclid = ?),
                ?, ?
            )
            "#,
        )
        .bind(&aceid)
        .bind(aclid)
        .bind(aclid)
        .bind(&body)
        .bind(now())
        .execute(&self.pool)
        .await?;

        Ok(aceid)
    }

    pub async fn update_device_ace(&self, aclid: &str, aceid: &str, spec: &AceSpec) -> Result<()> {
        let body = serde_json::to_string(spec)?;
        let result = sqlx::query(
            r#"
            UPDATE device_aces SET body = ?, updated_at = ?
            WHERE aclid = ? AND aceid = ?
            "#,
        )
        .bind(&body)
        .bind(now())
        .bind(aclid)
        .bind(aceid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("ace {} in acl {}", aceid, aclid)));
        }
        Ok(())
    }

    pub async fn delete_device_ace(&self, aclid: &str, aceid: &str) -> Result<()> {
        let result = sqlx::query(
            r#"
            DELETE FROM device_aces WHERE aclid = ? AND aceid = ?
            "#,
        )
        .bind(aclid)
        .bind(aceid)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("ace {} in acl {}", aceid, aclid)));
        }
        Ok(())
    }
}

#[async_trait]
impl DeviceAclService for SqliteStore {
    async fn acl_id(&self, di: &str) -> std::result::Result<Option<String>, ProviderError> {
        Ok(self.device_acl_id(di).await?)
    }

    async fn acl(&self, acl_id: &str) -> std::result::Result<AclDocument, ProviderError> {
        Ok(self.acl_document(acl_id).await?)
    }

    async fn create_ace(
        &self,
        acl_id: &str,
        spec: &AceSpec,
    ) -> std::result::Result<String, ProviderError> {
        Ok(self.insert_device_ace(acl_id, spec).await?)
    }

    async fn update_ace(
        &self,
        acl_id: &str,
        aceid: &str,
        spec: &AceSpec,
    ) -> std::result::Result<(), ProviderError> {
        Ok(self.update_device_ace(acl_id, aceid, spec).await?)
    }

    async fn delete_ace(&self, acl_id: &str, aceid: &str) -> std::result::Result<(), ProviderError> {
        Ok(self.delete_device_ace(acl_id, aceid).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::acl::AceResource;
    use common::group::Permission;

    #[tokio::test]
    async fn test_register_is_idempotent() {
        let store = SqliteStore::in_memory().await.unwrap();
        let aclid = store.register_device("d1", "u1").await.unwrap();
        assert_eq!(store.register_device("d1", "u2").await.unwrap(), aclid);

        let devices = store.devices().await.unwrap();
        assert_eq!(
            devices,
            vec![DeviceEntry {
                di: "d1".to_string(),
                owner: "u1".to_string(),
                aclid: aclid.clone(),
            }]
        );

        let acl = store.acl(&aclid).await.unwrap();
        assert_eq!(acl.di, "d1");
        assert_eq!(acl.owner_id, "u1");
        assert!(acl.aces.is_empty());
    }

    #[tokio::test]
    async fn test_ace_lifecycle() {
        let store = SqliteStore::in_memory().await.unwrap();
        let aclid = store.register_device("d1", "u1").await.unwrap();

        let first = AceSpec::for_user("u2", Permission::DEFAULT, vec![AceResource::wildcard()]);
        let second = AceSpec::for_user("u3", Permission::READ, vec![AceResource::wildcard()]);
        let a = store.create_ace(&aclid, &first).await.unwrap();
        let b = store.create_ace(&aclid, &second).await.unwrap();

        // creation order is kept
        let acl = store.acl(&aclid).await.unwrap();
        let ids: Vec<_> = acl.aces.iter().map(|ace| ace.aceid.clone()).collect();
        assert_eq!(ids, vec![a.clone(), b.clone()]);
        assert_eq!(store.ace(&aclid, &b).await.unwrap().spec, second);

        let narrowed = AceSpec::for_user(
            "u2",
            Permission::DEFAULT,
            vec![AceResource {
                href: "/a/light/1".to_string(),
                resource_types: vec!["core.light".to_string()],
                interfaces: vec!["oic.if.baseline".to_string()],
            }],
        );
        store.update_ace(&aclid, &a, &narrowed).await.unwrap();
        assert_eq!(store.ace(&aclid, &a).await.unwrap().spec, narrowed);

        store.delete_ace(&aclid, &a).await.unwrap();
        assert!(matches!(
            store.delete_ace(&aclid, &a).await,
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            store.update_ace(&aclid, &a, &first).await,
            Err(ProviderError::NotFound(_))
        ));
        assert_eq!(store.acl(&aclid).await.unwrap().aces.len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_acl() {
        let store = SqliteStore::in_memory().await.unwrap();
        let spec = AceSpec::for_user("u2", Permission::DEFAULT, vec![AceResource::wildcard()]);

        assert_eq!(store.acl_id("d1").await.unwrap(), None);
        assert!(matches!(
            store.acl("missing").await,
            Err(ProviderError::NotFound(_))
        ));
        assert!(matches!(
            store.create_ace("missing", &spec).await,
            Err(ProviderError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_forget_device_drops_aces() {
        let store = SqliteStore::in_memory().await.unwrap();
        let aclid = store.register_device("d1", "u1").await.unwrap();
        let spec = AceSpec::for_user("u2", Permission::DEFAULT, vec![AceResource::wildcard()]);
        store.create_ace(&aclid, &spec).await.unwrap();

        assert!(store.forget_device("d1").await.unwrap());
        assert!(!store.forget_device("d1").await.unwrap());
        assert!(store.devices().await.unwrap().is_empty());

        let left: i64 = sqlx::query("SELECT COUNT(*) AS n FROM device_aces")
            .fetch_one(&store.pool)
            .await
            .unwrap()
            .get("n");
        assert_eq!(left, 0);
    }
}
