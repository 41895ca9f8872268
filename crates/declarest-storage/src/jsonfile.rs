// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Whole-file JSON backend.
//!
//! Demo-grade alternative to the SQLite engine: the entire collection lives
//! in one JSON array file, rewritten on every write. There is no concurrency
//! protection at all -- concurrent writers can interleave destructively.
//! Useful for fixtures and local experiments, not production.

use std::path::PathBuf;

use async_trait::async_trait;

use declarest_core::{Entity, Error, Store};

/// One JSON array file holding a whole collection.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStore { path: path.into() }
    }
}

#[async_trait]
impl Store for JsonFileStore {
    async fn read(&self) -> Result<Vec<Entity>, Error> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(Error::storage),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(Error::storage(e)),
        }
    }

    async fn write(&self, items: Vec<Entity>) -> Result<(), Error> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(Error::storage)?;
        }
        let data = serde_json::to_vec_pretty(&items).map_err(Error::storage)?;
        tokio::fs::write(&self.path, data).await.map_err(Error::storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::tempdir;

    fn entity(v: serde_json::Value) -> Entity {
        match v {
            serde_json::Value::Object(map) => Entity::new(map),
            _ => panic!("not an object"),
        }
    }

    #[tokio::test]
    async fn missing_file_reads_as_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("none.json"));
        assert!(store.read().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data.json"));
        let items = vec![
            entity(json!({"id": "a", "title": "x"})),
            entity(json!({"id": "b", "title": "y"})),
        ];
        store.write(items.clone()).await.unwrap();
        assert_eq!(store.read().await.unwrap(), items);
    }

    #[tokio::test]
    async fn write_replaces_previous_contents() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("data.json"));
        store
            .write(vec![entity(json!({"id": "a"}))])
            .await
            .unwrap();
        store
            .write(vec![entity(json!({"id": "b"}))])
            .await
            .unwrap();
        let items = store.read().await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id(), Some("b"));
    }
}
