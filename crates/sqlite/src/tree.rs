//! Collection tree rows.

use async_trait::async_trait;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, Transaction};
use tokio::sync::Mutex;

use common::collection::{Node, NodeId};
use common::path::{PathCodec, TreePath};
use common::store::{Change, ChangeSet, ChildState, Scan, StoreError, TreeBackend, TreeSnapshot};

use crate::database::{parse_uuid, Database};
use crate::error::DatabaseError;

/// Lock contention and unique violations mean another writer got there
///  first; the tree engine re-plans on [`StoreError::Conflict`].
pub(crate) fn store_error(e: sqlx::Error) -> StoreError<DatabaseError> {
    if let sqlx::Error::Database(db) = &e {
        // SQLITE_BUSY, SQLITE_LOCKED, SQLITE_LOCKED_SHAREDCACHE, SQLITE_BUSY_SNAPSHOT
        let contended = matches!(db.code().as_deref(), Some("5" | "6" | "262" | "517"));
        if contended || db.is_unique_violation() {
            return StoreError::Conflict(db.message().to_string());
        }
    }
    StoreError::Provider(DatabaseError::Database(e))
}

// Subtree and children reads are bounded path ranges so they stay on the
//  path indexes: `[path, path.subtree_end())` holds exactly the subtree.
const SELECT_TOP_LEVEL: &str = r#"
    SELECT id, name, path, numchild FROM collections
    WHERE depth = 1
    ORDER BY path
"#;

const SELECT_CHILDREN: &str = r#"
    SELECT id, name, path, numchild FROM collections
    WHERE depth = ? AND path > ? AND path < ?
    ORDER BY path
"#;

const SELECT_SUBTREE: &str = r#"
    SELECT id, name, path, numchild FROM collections
    WHERE path >= ? AND path < ?
    ORDER BY path
"#;

const REBASE_SUBTREE: &str = r#"
    UPDATE collections
    SET path = ? || substr(path, ?), depth = depth + ?
    WHERE path >= ? AND path < ?
"#;

const DELETE_SUBTREE: &str = r#"
    DELETE FROM collections WHERE path >= ? AND path < ?
"#;

type SqliteQuery<'q> = Query<'q, Sqlite, SqliteArguments<'q>>;

fn children_query<'q>(codec: &PathCodec, parent: Option<&'q TreePath>) -> SqliteQuery<'q> {
    match parent {
        None => sqlx::query(SELECT_TOP_LEVEL),
        Some(parent) => sqlx::query(SELECT_CHILDREN)
            .bind(codec.depth(parent) as i64 + 1)
            .bind(parent.as_str())
            .bind(parent.subtree_end()),
    }
}

fn conflict<T>(message: impl Into<String>) -> Result<T, StoreError<DatabaseError>> {
    Err(StoreError::Conflict(message.into()))
}

fn node_from_row(codec: &PathCodec, row: &SqliteRow) -> Result<Node, StoreError<DatabaseError>> {
    let id: String = row.try_get("id").map_err(store_error)?;
    let name: String = row.try_get("name").map_err(store_error)?;
    let path: String = row.try_get("path").map_err(store_error)?;
    let numchild: i64 = row.try_get("numchild").map_err(store_error)?;

    let id = NodeId::from(parse_uuid("collections.id", &id)?);
    let numchild = u64::try_from(numchild).map_err(|_| {
        DatabaseError::CorruptRow(format!("collections.numchild {} for {}", numchild, id))
    })?;
    Node::from_parts(id, name, &path, numchild, codec).map_err(StoreError::Path)
}

/// Tree backend over the `collections` table.
///
/// Snapshots are read transactions; with WAL they see the database as of
///  their first read no matter what commits afterwards. Commits run every
///  change of a set inside one write transaction.
#[derive(Debug, Clone)]
pub struct SqliteTreeBackend {
    db: Database,
    codec: PathCodec,
}

impl SqliteTreeBackend {
    /// The codec must match the one the tree engine is configured with;
    ///  it is used to validate stored paths as they are read back.
    pub fn new(db: Database, codec: PathCodec) -> Self {
        Self { db, codec }
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Read transaction over the `collections` table
pub struct SqliteSnapshot {
    tx: Mutex<Transaction<'static, Sqlite>>,
    codec: PathCodec,
}

impl SqliteSnapshot {
    async fn fetch(&self, query: SqliteQuery<'_>) -> Result<Vec<Node>, StoreError<DatabaseError>> {
        let mut tx = self.tx.lock().await;
        let rows = query.fetch_all(&mut **tx).await.map_err(store_error)?;
        rows.iter()
            .map(|row| node_from_row(&self.codec, row))
            .collect()
    }
}

#[async_trait]
impl TreeSnapshot for SqliteSnapshot {
    type Error = DatabaseError;

    async fn node(&self, id: NodeId) -> Result<Option<Node>, StoreError<Self::Error>> {
        let query = sqlx::query(
            r#"
            SELECT id, name, path, numchild FROM collections WHERE id = ?
            "#,
        )
        .bind(id.to_string());
        Ok(self.fetch(query).await?.into_iter().next())
    }

    async fn node_at(&self, path: &TreePath) -> Result<Option<Node>, StoreError<Self::Error>> {
        let query = sqlx::query(
            r#"
            SELECT id, name, path, numchild FROM collections WHERE path = ?
            "#,
        )
        .bind(path.as_str());
        Ok(self.fetch(query).await?.into_iter().next())
    }

    async fn nodes_at(&self, paths: &[TreePath]) -> Result<Vec<Node>, StoreError<Self::Error>> {
        if paths.is_empty() {
            return Ok(Vec::new());
        }
        let mut builder: QueryBuilder<Sqlite> =
            QueryBuilder::new("SELECT id, name, path, numchild FROM collections WHERE path IN (");
        let mut separated = builder.separated(", ");
        for path in paths {
            separated.push_bind(path.as_str());
        }
        separated.push_unseparated(") ORDER BY path");
        self.fetch(builder.build()).await
    }

    async fn scan(&self, scan: Scan<'_>) -> Result<Vec<Node>, StoreError<Self::Error>> {
        let query = match scan {
            Scan::All => sqlx::query(
                r#"
                SELECT id, name, path, numchild FROM collections ORDER BY path
                "#,
            ),
            Scan::Children(parent) => children_query(&self.codec, parent),
            Scan::Subtree(root) => sqlx::query(SELECT_SUBTREE)
                .bind(root.as_str())
                .bind(root.subtree_end()),
        };
        self.fetch(query).await
    }
}

async fn occupied(
    tx: &mut Transaction<'static, Sqlite>,
    path: &TreePath,
) -> Result<bool, StoreError<DatabaseError>> {
    let row = sqlx::query("SELECT 1 FROM collections WHERE path = ?")
        .bind(path.as_str())
        .fetch_optional(&mut **tx)
        .await
        .map_err(store_error)?;
    Ok(row.is_some())
}

/// Whether the children of `parent` are still exactly `expected`.
async fn children_unchanged(
    tx: &mut Transaction<'static, Sqlite>,
    codec: &PathCodec,
    parent: Option<&TreePath>,
    expected: &[ChildState],
) -> Result<bool, StoreError<DatabaseError>> {
    let rows = children_query(codec, parent)
        .fetch_all(&mut **tx)
        .await
        .map_err(store_error)?;
    if rows.len() != expected.len() {
        return Ok(false);
    }
    for (row, child) in rows.iter().zip(expected) {
        let id: String = row.try_get("id").map_err(store_error)?;
        let path: String = row.try_get("path").map_err(store_error)?;
        let name: String = row.try_get("name").map_err(store_error)?;
        if id != child.id.to_string() || path != child.path.as_str() || name != child.name {
            return Ok(false);
        }
    }
    Ok(true)
}

async fn apply(
    tx: &mut Transaction<'static, Sqlite>,
    codec: &PathCodec,
    change: Change,
) -> Result<(), StoreError<DatabaseError>> {
    match change {
        Change::Expect { id, path, numchild } => {
            let row = sqlx::query("SELECT path, numchild FROM collections WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&mut **tx)
                .await
                .map_err(store_error)?;
            let Some(row) = row else {
                return conflict(format!("node {} no longer exists", id));
            };
            let current_path: String = row.try_get("path").map_err(store_error)?;
            let current_numchild: i64 = row.try_get("numchild").map_err(store_error)?;
            if current_path != path.as_str() || current_numchild != numchild as i64 {
                return conflict(format!(
                    "node {} moved to {} with {} children, expected {} with {}",
                    id, current_path, current_numchild, path, numchild
                ));
            }
        }
        Change::ExpectChildren { parent, children } => {
            if let Some(parent) = &parent {
                if !occupied(tx, parent).await? {
                    return conflict(format!("parent {} no longer exists", parent));
                }
            }
            if !children_unchanged(tx, codec, parent.as_ref(), &children).await? {
                return conflict(format!(
                    "children of {} changed since planning",
                    parent.as_ref().map_or("the forest".to_string(), ToString::to_string)
                ));
            }
        }
        Change::Insert(node) => {
            let taken = sqlx::query("SELECT 1 FROM collections WHERE id = ? OR path = ?")
                .bind(node.id().to_string())
                .bind(node.path().as_str())
                .fetch_optional(&mut **tx)
                .await
                .map_err(store_error)?;
            if taken.is_some() {
                return conflict(format!("node {} or path {} is taken", node.id(), node.path()));
            }
            sqlx::query(
                r#"
                INSERT INTO collections (id, name, path, depth, numchild)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(node.id().to_string())
            .bind(node.name())
            .bind(node.path().as_str())
            .bind(node.depth() as i64)
            .bind(node.numchild() as i64)
            .execute(&mut **tx)
            .await
            .map_err(store_error)?;
        }
        Change::Rebase {
            from,
            to,
            depth_delta,
        } => {
            if !occupied(tx, &from).await? {
                return conflict(format!("nothing to rebase at {}", from));
            }
            if occupied(tx, &to).await? {
                return conflict(format!("rebase target {} is occupied", to));
            }
            sqlx::query(REBASE_SUBTREE)
                .bind(to.as_str())
                .bind(from.len() as i64 + 1)
                .bind(depth_delta)
                .bind(from.as_str())
                .bind(from.subtree_end())
                .execute(&mut **tx)
                .await
                .map_err(store_error)?;
        }
        Change::Rename { id, name } => {
            let result = sqlx::query("UPDATE collections SET name = ? WHERE id = ?")
                .bind(&name)
                .bind(id.to_string())
                .execute(&mut **tx)
                .await
                .map_err(store_error)?;
            if result.rows_affected() == 0 {
                return conflict(format!("node {} no longer exists", id));
            }
        }
        Change::AdjustChildren { id, delta } => {
            let result = sqlx::query(
                r#"
                UPDATE collections SET numchild = numchild + ?
                WHERE id = ? AND numchild + ? >= 0
                "#,
            )
            .bind(delta)
            .bind(id.to_string())
            .bind(delta)
            .execute(&mut **tx)
            .await
            .map_err(store_error)?;
            if result.rows_affected() == 0 {
                return conflict(format!("cannot adjust numchild of {} by {}", id, delta));
            }
        }
        Change::RemoveSubtree { root } => {
            let result = sqlx::query(DELETE_SUBTREE)
                .bind(root.as_str())
                .bind(root.subtree_end())
                .execute(&mut **tx)
                .await
                .map_err(store_error)?;
            if result.rows_affected() == 0 {
                return conflict(format!("nothing to remove at {}", root));
            }
        }
    }
    Ok(())
}

#[async_trait]
impl TreeBackend for SqliteTreeBackend {
    type Error = DatabaseError;
    type Snapshot = SqliteSnapshot;

    async fn snapshot(&self) -> Result<Self::Snapshot, StoreError<Self::Error>> {
        let tx = self.db.pool().begin().await.map_err(store_error)?;
        Ok(SqliteSnapshot {
            tx: Mutex::new(tx),
            codec: self.codec.clone(),
        })
    }

    async fn commit(&self, changes: ChangeSet) -> Result<(), StoreError<Self::Error>> {
        let count = changes.len();
        // dropping the transaction on error rolls every change back
        let mut tx = self.db.pool().begin().await.map_err(store_error)?;
        for change in changes {
            apply(&mut tx, &self.codec, change).await?;
        }
        tx.commit().await.map_err(store_error)?;
        tracing::debug!(changes = count, "committed tree change set");
        Ok(())
    }
}
