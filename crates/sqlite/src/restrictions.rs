//! View restriction rows.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use common::access::{GroupId, RestrictionEntry, RestrictionId, RestrictionKind, RestrictionStore};
use common::collection::NodeId;

use crate::database::{parse_uuid, push_ids, Database};
use crate::error::{DatabaseError, Result};

fn kind_str(kind: RestrictionKind) -> &'static str {
    match kind {
        RestrictionKind::Password => "password",
        RestrictionKind::Login => "login",
        RestrictionKind::Groups => "groups",
    }
}

fn parse_kind(kind: &str) -> Result<RestrictionKind> {
    match kind {
        "password" => Ok(RestrictionKind::Password),
        "login" => Ok(RestrictionKind::Login),
        "groups" => Ok(RestrictionKind::Groups),
        other => Err(DatabaseError::CorruptRow(format!(
            "restrictions.kind {:?}",
            other
        ))),
    }
}

/// Restriction store over the `restrictions` and `restriction_groups`
///  tables
#[derive(Debug, Clone)]
pub struct SqliteRestrictionStore {
    db: Database,
}

impl SqliteRestrictionStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn add(&self, entry: &RestrictionEntry) -> Result<()> {
        let mut tx = self.db.pool().begin().await?;
        sqlx::query(
            r#"
            INSERT INTO restrictions (id, node_id, kind, secret)
            VALUES (?, ?, ?, ?)
            "#,
        )
        .bind(entry.id.to_string())
        .bind(entry.node.to_string())
        .bind(kind_str(entry.kind))
        .bind(entry.secret.as_deref())
        .execute(&mut *tx)
        .await?;

        for group in &entry.groups {
            sqlx::query("INSERT INTO restriction_groups (restriction_id, group_id) VALUES (?, ?)")
                .bind(entry.id.to_string())
                .bind(group.to_string())
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Remove a restriction; its group list goes with it.
    pub async fn remove(&self, id: RestrictionId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM restrictions WHERE id = ?")
            .bind(id.to_string())
            .execute(self.db.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every restriction on `nodes`; call with the ids of a deleted
    ///  subtree.
    pub async fn forget_nodes(&self, nodes: &[NodeId]) -> Result<u64> {
        if nodes.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM restrictions WHERE node_id IN (");
        push_ids(&mut builder, nodes);
        let result = builder.build().execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl RestrictionStore for SqliteRestrictionStore {
    type Error = DatabaseError;

    async fn lookup(&self, nodes: &[NodeId]) -> Result<BTreeSet<RestrictionEntry>> {
        if nodes.is_empty() {
            return Ok(BTreeSet::new());
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, node_id, kind, secret FROM restrictions WHERE node_id IN (");
        push_ids(&mut builder, nodes);
        // both reads come from one snapshot
        let mut tx = self.db.pool().begin().await?;
        let rows = builder.build().fetch_all(&mut *tx).await?;

        let mut entries = BTreeMap::new();
        for row in &rows {
            let id: String = row.try_get("id")?;
            let node: String = row.try_get("node_id")?;
            let kind: String = row.try_get("kind")?;
            let id = RestrictionId::from(parse_uuid("restrictions.id", &id)?);
            entries.insert(
                id,
                RestrictionEntry {
                    id,
                    node: NodeId::from(parse_uuid("restrictions.node_id", &node)?),
                    kind: parse_kind(&kind)?,
                    secret: row.try_get("secret")?,
                    groups: BTreeSet::new(),
                },
            );
        }
        if entries.is_empty() {
            return Ok(BTreeSet::new());
        }

        let ids: Vec<RestrictionId> = entries.keys().copied().collect();
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "SELECT restriction_id, group_id FROM restriction_groups WHERE restriction_id IN (",
        );
        push_ids(&mut builder, &ids);
        let rows = builder.build().fetch_all(&mut *tx).await?;
        tx.commit().await?;
        for row in rows {
            let restriction: String = row.try_get("restriction_id")?;
            let group: String = row.try_get("group_id")?;
            let restriction =
                RestrictionId::from(parse_uuid("restriction_groups.restriction_id", &restriction)?);
            if let Some(entry) = entries.get_mut(&restriction) {
                entry
                    .groups
                    .insert(GroupId::from(parse_uuid("restriction_groups.group_id", &group)?));
            }
        }

        Ok(entries.into_values().collect())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[tokio::test]
    async fn test_restriction_round_trip() {
        let store = SqliteRestrictionStore::new(Database::in_memory().await.unwrap());
        let pies = NodeId::generate();
        let bakers = GroupId::generate();
        let password = RestrictionEntry::password(pies, "crust");
        let groups = RestrictionEntry::groups(NodeId::ROOT, [bakers, GroupId::generate()]);
        store.add(&password).await.unwrap();
        store.add(&groups).await.unwrap();

        let found = store.lookup(&[NodeId::ROOT, pies]).await.unwrap();
        assert_eq!(found, BTreeSet::from([password.clone(), groups.clone()]));

        let found = store.lookup(&[pies]).await.unwrap();
        assert_eq!(found, BTreeSet::from([password.clone()]));

        assert!(store.remove(groups.id).await.unwrap());
        assert!(!store.remove(groups.id).await.unwrap());
        assert_eq!(store.forget_nodes(&[pies]).await.unwrap(), 1);
        assert!(store
            .lookup(&[NodeId::ROOT, pies])
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_lookup_never_sees_partial_group_set() {
        let temp_dir = TempDir::new().unwrap();
        let db = Database::new(&temp_dir.path().join("restrictions.db"))
            .await
            .unwrap();
        let store = SqliteRestrictionStore::new(db);
        let groups: Vec<GroupId> = (0..8).map(|_| GroupId::generate()).collect();

        let writer = {
            let store = store.clone();
            let groups = groups.clone();
            tokio::spawn(async move {
                for _ in 0..25 {
                    let entry = RestrictionEntry::groups(NodeId::ROOT, groups.iter().copied());
                    store.add(&entry).await.unwrap();
                    store.remove(entry.id).await.unwrap();
                }
            })
        };

        while !writer.is_finished() {
            for entry in store.lookup(&[NodeId::ROOT]).await.unwrap() {
                assert_eq!(entry.groups.len(), groups.len());
            }
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
    }
}
