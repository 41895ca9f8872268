// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Storage contracts every backend satisfies.
//!
//! [`Store`] is the minimal whole-collection contract; [`GranularStore`]
//! extends it with point operations. Consumers hold a [`StoreHandle`], which
//! prefers point operations when the backend exposes them and otherwise
//! falls back to read-modify-write over the minimal contract.

use std::sync::Arc;

use async_trait::async_trait;

use crate::entity::{Entity, Patch};
use crate::error::Error;

/// Minimal whole-collection storage contract.
#[async_trait]
pub trait Store: Send + Sync {
    /// Return a full, independent snapshot of the collection. Mutating the
    /// result must not affect internal state.
    async fn read(&self) -> Result<Vec<Entity>, Error>;

    /// Atomically replace the collection's entire contents.
    async fn write(&self, items: Vec<Entity>) -> Result<(), Error>;
}

/// Point-operation storage contract.
///
/// Backends that can address single entities implement this in addition to
/// [`Store`]; higher layers then avoid O(n) whole-collection round trips.
#[async_trait]
pub trait GranularStore: Store {
    /// Insert a new entity. A duplicate id fails with [`Error::Constraint`]
    /// rather than silently overwriting.
    async fn insert(&self, item: &Entity) -> Result<(), Error>;

    /// Merge `patch` over the stored entity, re-assert its id, and return the
    /// merged result. `None` if the id does not exist.
    async fn update(&self, id: &str, patch: Patch) -> Result<Option<Entity>, Error>;

    /// Remove an entity. `false`, not an error, if the id does not exist.
    async fn remove(&self, id: &str) -> Result<bool, Error>;

    /// Look up a single entity by id.
    async fn find_by_id(&self, id: &str) -> Result<Option<Entity>, Error>;
}

/// A resolved storage handle, granular when the backend allows it.
#[derive(Clone)]
pub enum StoreHandle {
    /// Backend with point operations; preferred.
    Granular(Arc<dyn GranularStore>),
    /// Whole-collection backend; point operations emulated over `read`/`write`.
    /// Carries the collection name so emulated constraint errors can name it.
    Whole {
        name: String,
        store: Arc<dyn Store>,
    },
}

impl StoreHandle {
    /// Wrap a whole-collection backend under the given collection name.
    pub fn whole(name: impl Into<String>, store: Arc<dyn Store>) -> Self {
        StoreHandle::Whole {
            name: name.into(),
            store,
        }
    }

    pub async fn read(&self) -> Result<Vec<Entity>, Error> {
        match self {
            StoreHandle::Granular(s) => s.read().await,
            StoreHandle::Whole { store, .. } => store.read().await,
        }
    }

    pub async fn insert(&self, item: &Entity) -> Result<(), Error> {
        match self {
            StoreHandle::Granular(s) => s.insert(item).await,
            StoreHandle::Whole { name, store } => {
                let id = require_id(item)?;
                let mut items = store.read().await?;
                if items.iter().any(|e| e.id() == Some(id)) {
                    return Err(Error::Constraint {
                        table: name.clone(),
                        id: id.to_string(),
                    });
                }
                items.push(item.clone());
                store.write(items).await
            }
        }
    }

    pub async fn update(&self, id: &str, patch: Patch) -> Result<Option<Entity>, Error> {
        match self {
            StoreHandle::Granular(s) => s.update(id, patch).await,
            StoreHandle::Whole { store: s, .. } => {
                let mut items = s.read().await?;
                let Some(slot) = items.iter_mut().find(|e| e.id() == Some(id)) else {
                    return Ok(None);
                };
                slot.apply(&patch);
                slot.set_id(id);
                let merged = slot.clone();
                s.write(items).await?;
                Ok(Some(merged))
            }
        }
    }

    pub async fn remove(&self, id: &str) -> Result<bool, Error> {
        match self {
            StoreHandle::Granular(s) => s.remove(id).await,
            StoreHandle::Whole { store: s, .. } => {
                let mut items = s.read().await?;
                let before = items.len();
                items.retain(|e| e.id() != Some(id));
                if items.len() == before {
                    return Ok(false);
                }
                s.write(items).await?;
                Ok(true)
            }
        }
    }

    pub async fn find_by_id(&self, id: &str) -> Result<Option<Entity>, Error> {
        match self {
            StoreHandle::Granular(s) => s.find_by_id(id).await,
            StoreHandle::Whole { store: s, .. } => {
                let items = s.read().await?;
                Ok(items.into_iter().find(|e| e.id() == Some(id)))
            }
        }
    }
}

fn require_id(item: &Entity) -> Result<&str, Error> {
    item.id()
        .ok_or_else(|| Error::Internal("entity has no id".into()))
}
