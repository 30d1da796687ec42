use async_trait::async_trait;
use common::acl::{AceFilter, AceRecord};
use common::group::Group;
use common::provider::{GroupStore, ProviderError};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::database::{now, where_clause, SqliteStore};
use crate::error::{Result, StoreError};

fn ace_record(row: &SqliteRow) -> AceRecord {
    AceRecord {
        aceid: row.get("aceid"),
        gid: row.get("gid"),
        di: row.get("di"),
        uid: row.get("uid"),
        oid: row.get("oid"),
    }
}

fn group_body(row: &SqliteRow) -> Result<Group> {
    let body: String = row.get("body");
    Ok(serde_json::from_str(&body)?)
}

impl SqliteStore {
    pub async fn get_group(&self, gid: &str) -> Result<Option<Group>> {
        let row = sqlx::query(
            r#"
            SELECT body FROM groups WHERE gid = ?
            "#,
        )
        .bind(gid)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(group_body).transpose()
    }

    /// Insert or replace a group along with its membership index.
    pub async fn upsert_group(&self, group: &Group) -> Result<()> {
        let body = serde_json::to_string(group)?;
        let now = now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO groups (gid, owner, parent, body, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(gid) DO UPDATE SET
                owner = excluded.owner,
                parent = excluded.parent,
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&group.gid)
        .bind(&group.owner)
        .bind(&group.parent)
        .bind(&body)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            DELETE FROM group_members WHERE gid = ?
            "#,
        )
        .bind(&group.gid)
        .execute(&mut *tx)
        .await?;

        for uid in &group.members {
            sqlx::query(
                r#"
                INSERT INTO group_members (gid, uid) VALUES (?, ?)
                "#,
            )
            .bind(&group.gid)
            .bind(uid)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn remove_group(&self, gid: &str) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM groups WHERE gid = ?
            "#,
        )
        .bind(gid)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn list_groups_with_member(&self, uid: &str) -> Result<Vec<Group>> {
        let rows = sqlx::query(
            r#"
            SELECT g.body FROM groups g
            JOIN group_members m ON m.gid = g.gid
            WHERE m.uid = ?
            ORDER BY g.gid
            "#,
        )
        .bind(uid)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(group_body).collect()
    }

    pub async fn list_ace_records(&self, filter: &AceFilter) -> Result<Vec<AceRecord>> {
        let (clause, values) = where_clause(filter);
        let sql = format!(
            "SELECT aceid, gid, di, uid, oid FROM ace_records{} ORDER BY aceid",
            clause
        );

        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value);
        }
        let rows = query.fetch_all(&self.pool).await?;

        Ok(rows.iter().map(ace_record).collect())
    }

    pub async fn insert_ace_record(&self, record: &AceRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO ace_records (aceid, gid, di, uid, oid, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.aceid)
        .bind(&record.gid)
        .bind(&record.di)
        .bind(&record.uid)
        .bind(&record.oid)
        .bind(now())
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(StoreError::Conflict(format!(
                    "ace record for group {} device {} subject {}",
                    record.gid, record.di, record.uid
                )))
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn delete_ace_records(&self, filter: &AceFilter) -> Result<u64> {
        let (clause, values) = where_clause(filter);
        let sql = format!("DELETE FROM ace_records{}", clause);

        let mut query = sqlx::query(&sql);
        for value in values {
            query = query.bind(value);
        }
        let result = query.execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl GroupStore for SqliteStore {
    async fn group(&self, gid: &str) -> std::result::Result<Option<Group>, ProviderError> {
        Ok(self.get_group(gid).await?)
    }

    async fn put_group(&self, group: &Group) -> std::result::Result<(), ProviderError> {
        Ok(self.upsert_group(group).await?)
    }

    async fn delete_group(&self, gid: &str) -> std::result::Result<bool, ProviderError> {
        Ok(self.remove_group(gid).await?)
    }

    async fn groups_with_member(
        &self,
        uid: &str,
    ) -> std::result::Result<Vec<Group>, ProviderError> {
        Ok(self.list_groups_with_member(uid).await?)
    }

    async fn select_aces(
        &self,
        filter: &AceFilter,
    ) -> std::result::Result<Vec<AceRecord>, ProviderError> {
        Ok(self.list_ace_records(filter).await?)
    }

    async fn insert_ace(&self, record: &AceRecord) -> std::result::Result<(), ProviderError> {
        Ok(self.insert_ace_record(record).await?)
    }

    async fn delete_aces(&self, filter: &AceFilter) -> std::result::Result<u64, ProviderError> {
        Ok(self.delete_ace_records(filter).await?)
    }
}
