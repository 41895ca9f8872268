// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-table granular storage over the shared connection.
//!
//! A table is a two-column keyed store: primary key `id`, opaque JSON
//! payload. It is created lazily on first access. Each table caches the
//! connection it prepared its statements against, stamped with the
//! generation observed at build time; every operation compares that stamp
//! to the engine's current generation and rebuilds on mismatch. This is
//! what makes restore transparent to call sites.
//!
//! Mutations are funneled through the database's [`WriteQueue`]; `read` and
//! `find_by_id` execute directly against the cached connection and may
//! observe state concurrent with an in-flight queued write -- always a
//! committed state, never a half-applied one.
//!
//! [`WriteQueue`]: crate::queue::WriteQueue

use std::sync::Arc;

use async_trait::async_trait;
use rusqlite::params;
use tokio_rusqlite::Connection;
use tracing::debug;

use declarest_core::descriptor::validate_identifier;
use declarest_core::{Entity, Error, GranularStore, Patch, Store};

use crate::database::map_tr_err;
use crate::hub::StorageHub;
use crate::queue::WriteQueue;

/// SQLite-backed store for one named table.
#[derive(Clone)]
pub struct SqliteTable {
    inner: Arc<TableInner>,
}

struct TableInner {
    hub: Arc<StorageHub>,
    table: String,
    sql: TableSql,
    access: tokio::sync::Mutex<Option<TableAccess>>,
}

/// Cached prepared access, valid for exactly one generation.
struct TableAccess {
    conn: Arc<Connection>,
    generation: u64,
}

/// Statement text is fixed at construction; the table name is validated,
/// never parameterized.
struct TableSql {
    create: String,
    select_all: String,
    select_one: String,
    insert: String,
    upsert: String,
    delete: String,
    clear: String,
}

impl TableSql {
    fn new(table: &str) -> Self {
        TableSql {
            create: format!(
                "CREATE TABLE IF NOT EXISTS {table} (id TEXT PRIMARY KEY, data TEXT NOT NULL)"
            ),
            select_all: format!("SELECT data FROM {table}"),
            select_one: format!("SELECT data FROM {table} WHERE id = ?1"),
            insert: format!("INSERT INTO {table} (id, data) VALUES (?1, ?2)"),
            upsert: format!(
                "INSERT INTO {table} (id, data) VALUES (?1, ?2)
                 ON CONFLICT(id) DO UPDATE SET data = excluded.data"
            ),
            delete: format!("DELETE FROM {table} WHERE id = ?1"),
            clear: format!("DELETE FROM {table}"),
        }
    }
}

impl SqliteTable {
    /// Create a handle for `table` resolved through `hub`.
    ///
    /// The identifier is validated here, fail-fast; the database itself is
    /// resolved on first real use, so handles may exist before bootstrap
    /// opens the file.
    pub fn new(hub: Arc<StorageHub>, table: &str) -> Result<Self, Error> {
        validate_identifier("table name", table)?;
        Ok(SqliteTable {
            inner: Arc::new(TableInner {
                hub,
                sql: TableSql::new(table),
                table: table.to_string(),
                access: tokio::sync::Mutex::new(None),
            }),
        })
    }

    pub fn table_name(&self) -> &str {
        &self.inner.table
    }

    fn queue(&self) -> Result<WriteQueue, Error> {
        Ok(self.inner.hub.database()?.queue().clone())
    }
}

impl TableInner {
    /// Resolve the connection to run against, rebuilding the cached access
    /// when the observed generation differs from the engine's current one.
    async fn access(&self) -> Result<Arc<Connection>, Error> {
        let db = self.hub.database()?;
        let current = db.generation();

        let mut cached = self.access.lock().await;
        if let Some(access) = &*cached {
            if access.generation == current {
                return Ok(Arc::clone(&access.conn));
            }
        }

        let conn = db.connection();
        let create = self.sql.create.clone();
        conn.call(move |conn| -> Result<(), rusqlite::Error> {
            conn.execute_batch(&create)?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)?;
        debug!(table = %self.table, generation = current, "table access rebuilt");

        *cached = Some(TableAccess {
            conn: Arc::clone(&conn),
            generation: current,
        });
        Ok(conn)
    }

    async fn fetch(&self, id: String) -> Result<Option<String>, Error> {
        let conn = self.access().await?;
        let sql = self.sql.select_one.clone();
        conn.call(move |conn| -> Result<Option<String>, rusqlite::Error> {
            let mut stmt = conn.prepare_cached(&sql)?;
            match stmt.query_row(params![id], |row| row.get::<_, String>(0)) {
                Ok(data) => Ok(Some(data)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e),
            }
        })
        .await
        .map_err(map_tr_err)
    }
}

fn encode(item: &Entity) -> Result<(String, String), Error> {
    let id = item
        .id()
        .ok_or_else(|| Error::Internal("entity has no id".into()))?
        .to_string();
    let data = serde_json::to_string(item).map_err(Error::storage)?;
    Ok((id, data))
}

fn decode(table: &str, payload: &str) -> Result<Entity, Error> {
    serde_json::from_str(payload).map_err(|e| Error::Internal(
        format!("table `{table}` holds an undecodable payload: {e}"),
    ))
}

fn is_constraint(e: &tokio_rusqlite::Error) -> bool {
    matches!(
        e,
        tokio_rusqlite::Error::Error(rusqlite::Error::SqliteFailure(f, _))
            if f.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[async_trait]
impl Store for SqliteTable {
    async fn read(&self) -> Result<Vec<Entity>, Error> {
        let conn = self.inner.access().await?;
        let sql = self.inner.sql.select_all.clone();
        let rows = conn
            .call(move |conn| -> Result<Vec<String>, rusqlite::Error> {
                let mut stmt = conn.prepare_cached(&sql)?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut out = Vec::new();
                for row in rows {
                    out.push(row?);
                }
                Ok(out)
            })
            .await
            .map_err(map_tr_err)?;
        rows.iter()
            .map(|payload| decode(&self.inner.table, payload))
            .collect()
    }

    async fn write(&self, items: Vec<Entity>) -> Result<(), Error> {
        let encoded = items
            .iter()
            .map(encode)
            .collect::<Result<Vec<_>, _>>()?;
        let inner = Arc::clone(&self.inner);
        self.queue()?
            .enqueue(async move {
                let conn = inner.access().await?;
                let clear = inner.sql.clear.clone();
                let upsert = inner.sql.upsert.clone();
                conn.call(move |conn| -> Result<(), rusqlite::Error> {
                    let tx = conn.transaction()?;
                    tx.execute(&clear, [])?;
                    for (id, data) in &encoded {
                        tx.execute(&upsert, params![id, data])?;
                    }
                    tx.commit()
                })
                .await
                .map_err(map_tr_err)
            })
            .await
    }
}

#[async_trait]
impl GranularStore for SqliteTable {
    async fn insert(&self, item: &Entity) -> Result<(), Error> {
        let (id, data) = encode(item)?;
        let inner = Arc::clone(&self.inner);
        self.queue()?
            .enqueue(async move {
                let conn = inner.access().await?;
                let sql = inner.sql.insert.clone();
                let key = id.clone();
                let result = conn
                    .call(move |conn| -> Result<(), rusqlite::Error> {
                        let mut stmt = conn.prepare_cached(&sql)?;
                        stmt.execute(params![key, data])?;
                        Ok(())
                    })
                    .await;
                match result {
                    Ok(()) => Ok(()),
                    Err(e) if is_constraint(&e) => Err(Error::Constraint {
                        table: inner.table.clone(),
                        id,
                    }),
                    Err(e) => Err(map_tr_err(e)),
                }
            })
            .await
    }

    async fn update(&self, id: &str, patch: Patch) -> Result<Option<Entity>, Error> {
        let id = id.to_string();
        let inner = Arc::clone(&self.inner);
        self.queue()?
            .enqueue(async move {
                let Some(payload) = inner.fetch(id.clone()).await? else {
                    return Ok(None);
                };
                let mut entity = decode(&inner.table, &payload)?;
                entity.apply(&patch);
                entity.set_id(id.clone());

                let conn = inner.access().await?;
                let sql = inner.sql.upsert.clone();
                let data = serde_json::to_string(&entity).map_err(Error::storage)?;
                conn.call(move |conn| -> Result<(), rusqlite::Error> {
                    let mut stmt = conn.prepare_cached(&sql)?;
                    stmt.execute(params![id, data])?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;
                Ok(Some(entity))
            })
            .await
    }

    async fn remove(&self, id: &str) -> Result<bool, Error> {
        let id = id.to_string();
        let inner = Arc::clone(&self.inner);
        self.queue()?
            .enqueue(async move {
                let conn = inner.access().await?;
                let sql = inner.sql.delete.clone();
                let affected = conn
                    .call(move |conn| -> Result<usize, rusqlite::Error> {
                        let mut stmt = conn.prepare_cached(&sql)?;
                        stmt.execute(params![id])
                    })
                    .await
                    .map_err(map_tr_err)?;
                Ok(affected > 0)
            })
            .await
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Entity>, Error> {
        match self.inner.fetch(id.to_string()).await? {
            Some(payload) => Ok(Some(decode(&self.inner.table, &payload)?)),
            None => Ok(None),
        }
    }
}
