// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Declarest resource engine.
//!
//! This crate provides the storage contracts, the entity data model, the
//! resource descriptor types, and the notification fan-out used throughout
//! the Declarest workspace. Backends implement the contracts defined here;
//! the gateway crate consumes them.

pub mod descriptor;
pub mod entity;
pub mod error;
pub mod notify;
pub mod store;

// Re-export key items at crate root for ergonomic imports.
pub use descriptor::{AuthPolicy, DescriptorBuilder, FieldSpec, ResourceDescriptor};
pub use entity::{Entity, Fields, Patch};
pub use error::Error;
pub use notify::{Change, Notifier, NotifyEvent, NotifySink};
pub use store::{GranularStore, Store, StoreHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contracts_are_object_safe() {
        // The synthesizer holds stores and sinks as trait objects; this
        // won't compile if a contract loses object safety.
        fn _store(_: std::sync::Arc<dyn Store>) {}
        fn _granular(_: std::sync::Arc<dyn GranularStore>) {}
        fn _sink(_: std::sync::Arc<dyn NotifySink>) {}
    }

    #[test]
    fn error_variants_cover_the_taxonomy() {
        let _ = Error::Config("bad".into());
        let _ = Error::Validation { field: "f".into() };
        let _ = Error::NotFound("x".into());
        let _ = Error::Constraint {
            table: "t".into(),
            id: "i".into(),
        };
        let _ = Error::storage(std::io::Error::other("io"));
        let _ = Error::Unauthenticated;
        let _ = Error::Forbidden { role: "admin".into() };
        let _ = Error::Gateway {
            message: "bind".into(),
            source: None,
        };
        let _ = Error::Internal("boom".into());
    }
}
