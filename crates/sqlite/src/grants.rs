//! Group permission rows.

use std::collections::BTreeSet;

use async_trait::async_trait;
use sqlx::{QueryBuilder, Row, Sqlite};

use common::access::{Action, GrantEntry, GrantRegistry, GroupId};
use common::collection::NodeId;

use crate::database::{parse_uuid, push_ids, Database};
use crate::error::{DatabaseError, Result};

/// Grant registry over the `grants` table
#[derive(Debug, Clone)]
pub struct SqliteGrantRegistry {
    db: Database,
}

impl SqliteGrantRegistry {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Record a grant. Returns false if the exact grant already existed.
    pub async fn grant(&self, entry: &GrantEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO grants (group_id, node_id, action)
            VALUES (?, ?, ?)
            ON CONFLICT(group_id, node_id, action) DO NOTHING
            "#,
        )
        .bind(entry.group.to_string())
        .bind(entry.node.to_string())
        .bind(entry.action.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn revoke(&self, entry: &GrantEntry) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM grants WHERE group_id = ? AND node_id = ? AND action = ?
            "#,
        )
        .bind(entry.group.to_string())
        .bind(entry.node.to_string())
        .bind(entry.action.as_str())
        .execute(self.db.pool())
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Drop every grant on `nodes`; call with the ids of a deleted subtree.
    pub async fn forget_nodes(&self, nodes: &[NodeId]) -> Result<u64> {
        if nodes.is_empty() {
            return Ok(0);
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("DELETE FROM grants WHERE node_id IN (");
        push_ids(&mut builder, nodes);
        let result = builder.build().execute(self.db.pool()).await?;
        Ok(result.rows_affected())
    }

    async fn matching(
        &self,
        groups: &[GroupId],
        action: &Action,
        nodes: Option<&[NodeId]>,
    ) -> Result<BTreeSet<NodeId>> {
        if groups.is_empty() || nodes.is_some_and(|nodes| nodes.is_empty()) {
            return Ok(BTreeSet::new());
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT DISTINCT node_id FROM grants WHERE action = ");
        builder.push_bind(action.as_str());
        builder.push(" AND group_id IN (");
        push_ids(&mut builder, groups);
        if let Some(nodes) = nodes {
            builder.push(" AND node_id IN (");
            push_ids(&mut builder, nodes);
        }

        let rows = builder.build().fetch_all(self.db.pool()).await?;
        rows.iter()
            .map(|row| -> Result<NodeId> {
                let id: String = row.try_get("node_id")?;
                Ok(NodeId::from(parse_uuid("grants.node_id", &id)?))
            })
            .collect()
    }
}

#[async_trait]
impl GrantRegistry for SqliteGrantRegistry {
    type Error = DatabaseError;

    async fn lookup(
        &self,
        groups: &[GroupId],
        action: &Action,
        nodes: &[NodeId],
    ) -> Result<BTreeSet<NodeId>> {
        self.matching(groups, action, Some(nodes)).await
    }

    async fn granted_nodes(&self, groups: &[GroupId], action: &Action) -> Result<BTreeSet<NodeId>> {
        self.matching(groups, action, None).await
    }
}
