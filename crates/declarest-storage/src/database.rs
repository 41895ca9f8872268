// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management: one tokio-rusqlite connection per file,
//! WAL mode, a generation counter, and the queued backup/restore protocol.
//!
//! All writes are serialized through the [`WriteQueue`]; the connection's
//! single background thread does the actual SQLite work. Do NOT create
//! additional Connection instances for writes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use arc_swap::ArcSwap;
use tokio_rusqlite::Connection;
use tracing::{debug, warn};

use declarest_core::Error;

use crate::queue::WriteQueue;

/// Shared handle to one database file.
///
/// Cloning is cheap; all clones share the connection, the generation
/// counter, and the write queue. The connection is swappable because
/// [`restore`] replaces the file underneath it.
///
/// [`restore`]: Database::restore
#[derive(Clone)]
pub struct Database {
    inner: Arc<DbInner>,
}

struct DbInner {
    path: PathBuf,
    conn: ArcSwap<Connection>,
    generation: AtomicU64,
    queue: WriteQueue,
}

impl Database {
    /// Open (or create) the database file and apply the durability pragmas:
    /// WAL journaling so readers proceed during writes, and a bounded
    /// lock-wait timeout.
    pub async fn open(path: impl AsRef<Path>) -> Result<Database, Error> {
        let path = path.as_ref().to_path_buf();
        let conn = open_connection(&path).await?;
        debug!(path = %path.display(), "database opened");
        Ok(Database {
            inner: Arc::new(DbInner {
                path,
                conn: ArcSwap::from_pointee(conn),
                generation: AtomicU64::new(0),
                queue: WriteQueue::new(),
            }),
        })
    }

    /// The current live connection. Holders must not cache this across a
    /// generation change.
    pub fn connection(&self) -> Arc<Connection> {
        self.inner.conn.load_full()
    }

    /// Current generation. Advances only on [`restore`](Database::restore).
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// The write queue serializing all mutations against this connection.
    pub fn queue(&self) -> &WriteQueue {
        &self.inner.queue
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Flush pending WAL frames back into the main database file.
    pub async fn checkpoint(&self) -> Result<(), Error> {
        self.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        debug!("WAL checkpoint complete");
        Ok(())
    }

    /// Serialize the live database to bytes.
    ///
    /// Queued, so the snapshot reflects every write enqueued before this
    /// call -- it is never older than its own enqueue time.
    pub async fn backup(&self) -> Result<Vec<u8>, Error> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(async move {
                let tmp = inner.path.with_extension("backup-tmp");
                remove_if_present(&tmp).await?;

                let conn = inner.conn.load_full();
                let dst = tmp.clone();
                conn.call(move |conn| -> Result<(), rusqlite::Error> {
                    let mut out = rusqlite::Connection::open(&dst)?;
                    let backup = rusqlite::backup::Backup::new(conn, &mut out)?;
                    backup.run_to_completion(100, Duration::from_millis(10), None)?;
                    Ok(())
                })
                .await
                .map_err(map_tr_err)?;

                let bytes = tokio::fs::read(&tmp).await.map_err(Error::storage)?;
                let _ = tokio::fs::remove_file(&tmp).await;
                debug!(bytes = bytes.len(), "backup snapshot taken");
                Ok(bytes)
            })
            .await
    }

    /// Replace the database contents from backup bytes.
    ///
    /// Queued. Step order is mandatory: validate the incoming bytes, close
    /// the current connection, delete the WAL side files, rename the
    /// temporary file onto the database path (atomic replace producing a
    /// fresh inode), reopen with the same pragmas, swap the shared
    /// connection, and only then advance the generation -- so no table ever
    /// observes the new connection under a stale stamp.
    ///
    /// Corrupt payloads are rejected before the live connection is touched;
    /// the request fails and the current database keeps serving.
    pub async fn restore(&self, bytes: Vec<u8>) -> Result<(), Error> {
        let inner = Arc::clone(&self.inner);
        self.inner
            .queue
            .enqueue(async move {
                let tmp = inner.path.with_extension("restore-tmp");
                tokio::fs::write(&tmp, &bytes).await.map_err(Error::storage)?;

                if let Err(e) = verify_snapshot(tmp.clone()).await {
                    let _ = tokio::fs::remove_file(&tmp).await;
                    return Err(e);
                }

                // Close before replacing the file underneath the connection.
                // The rename produces a fresh inode either way, so a close
                // failure (including an already-closed connection) is not
                // fatal to the restore.
                let old = inner.conn.load_full();
                if let Err(e) = Connection::clone(&old).close().await {
                    warn!("closing connection before restore failed: {e}");
                }

                for suffix in ["-wal", "-shm"] {
                    let _ = tokio::fs::remove_file(side_file(&inner.path, suffix)).await;
                }

                let replaced = async {
                    tokio::fs::rename(&tmp, &inner.path)
                        .await
                        .map_err(Error::storage)?;
                    open_connection(&inner.path).await
                }
                .await;

                let conn = match replaced {
                    Ok(conn) => conn,
                    Err(e) => {
                        // The old connection is gone; put a live one back so
                        // the engine keeps serving whatever file is at the
                        // path. The bump invalidates cached table access
                        // still stamped against the closed connection.
                        match open_connection(&inner.path).await {
                            Ok(conn) => {
                                inner.conn.store(Arc::new(conn));
                                inner.generation.fetch_add(1, Ordering::SeqCst);
                                warn!("restore failed after close, reopened previous database: {e}");
                            }
                            Err(reopen) => {
                                warn!("reopen after failed restore also failed: {reopen}");
                            }
                        }
                        return Err(e);
                    }
                };

                inner.conn.store(Arc::new(conn));
                let generation = inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
                debug!(generation, "database restored");
                Ok(())
            })
            .await
    }
}

/// Open a connection and apply the standing pragmas.
async fn open_connection(path: &Path) -> Result<Connection, Error> {
    let conn = Connection::open(path).await.map_err(Error::storage)?;
    conn.call(|conn| -> Result<(), rusqlite::Error> {
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA synchronous=NORMAL;
             PRAGMA busy_timeout=5000;",
        )?;
        Ok(())
    })
    .await
    .map_err(map_tr_err)?;
    Ok(conn)
}

/// Run `PRAGMA integrity_check` against a candidate snapshot file.
async fn verify_snapshot(path: PathBuf) -> Result<(), Error> {
    let report = tokio::task::spawn_blocking(move || -> Result<String, rusqlite::Error> {
        let conn = rusqlite::Connection::open_with_flags(
            &path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_ONLY,
        )?;
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))
    })
    .await
    .map_err(|e| Error::Internal(format!("restore validation task failed: {e}")))?
    .map_err(Error::storage)?;

    if report == "ok" {
        Ok(())
    } else {
        Err(Error::Storage {
            source: format!("restore rejected, integrity check reported: {report}").into(),
        })
    }
}

fn side_file(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

async fn remove_if_present(path: &Path) -> Result<(), Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::storage(e)),
    }
}

/// Convert tokio-rusqlite errors into the workspace error type.
pub(crate) fn map_tr_err(e: tokio_rusqlite::Error) -> Error {
    Error::Storage {
        source: Box::new(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_creates_the_database_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("engine.db");
        let _db = Database::open(&path).await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn generation_starts_at_zero_and_is_stable_across_writes() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("gen.db")).await.unwrap();
        assert_eq!(db.generation(), 0);
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("CREATE TABLE t (id TEXT PRIMARY KEY);")?;
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(db.generation(), 0);
    }

    #[tokio::test]
    async fn backup_yields_a_sqlite_image() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("bk.db")).await.unwrap();
        let bytes = db.backup().await.unwrap();
        assert!(bytes.starts_with(b"SQLite format 3\0"));
    }

    #[tokio::test]
    async fn restore_with_corrupt_bytes_fails_and_keeps_serving() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("corrupt.db")).await.unwrap();

        let err = db.restore(b"this is not a database".to_vec()).await;
        assert!(err.is_err());
        assert_eq!(db.generation(), 0, "generation must not advance");

        // The live connection is untouched and still usable.
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("CREATE TABLE survived (id TEXT PRIMARY KEY);")?;
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn restore_advances_the_generation() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("adv.db")).await.unwrap();
        let snapshot = db.backup().await.unwrap();
        db.restore(snapshot).await.unwrap();
        assert_eq!(db.generation(), 1);
    }

    #[tokio::test]
    async fn checkpoint_succeeds_on_a_fresh_database() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("cp.db")).await.unwrap();
        db.checkpoint().await.unwrap();
    }
}
