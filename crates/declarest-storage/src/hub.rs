// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared lookup decoupling declaration order from bootstrap order.
//!
//! Table handles are constructed at declarative-setup time, possibly before
//! the database file has been opened. A [`StorageHub`] lets them resolve the
//! actual [`Database`] on first real use instead of at construction.

use tokio::sync::OnceCell;

use declarest_core::Error;

use crate::database::Database;

/// Lazily-filled slot for the shared [`Database`].
#[derive(Default)]
pub struct StorageHub {
    cell: OnceCell<Database>,
}

impl StorageHub {
    pub fn new() -> Self {
        StorageHub {
            cell: OnceCell::new(),
        }
    }

    /// Install the opened database. Fails if one is already installed.
    pub fn install(&self, db: Database) -> Result<(), Error> {
        self.cell.set(db).map_err(|_| {
            Error::Config("storage hub already has a database installed".into())
        })
    }

    /// Resolve the database, or fail if bootstrap has not installed one yet.
    pub fn database(&self) -> Result<&Database, Error> {
        self.cell.get().ok_or_else(|| Error::Storage {
            source: "storage not initialized -- install a database first".into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn database_before_install_is_an_error() {
        let hub = StorageHub::new();
        assert!(hub.database().is_err());
    }

    #[tokio::test]
    async fn install_twice_is_an_error() {
        let dir = tempdir().unwrap();
        let hub = StorageHub::new();
        let db = Database::open(dir.path().join("a.db")).await.unwrap();
        hub.install(db.clone()).unwrap();
        assert!(hub.install(db).is_err());
    }
}
