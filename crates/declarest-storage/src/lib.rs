// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence engine for the Declarest resource engine.
//!
//! Provides WAL-mode SQLite storage with a single-writer concurrency model
//! (all mutations funnel through one FIFO [`WriteQueue`]), per-table
//! granular stores with generation-based cache invalidation, a queued
//! backup/restore protocol, and a demo-grade whole-file JSON backend.

pub mod database;
pub mod hub;
pub mod jsonfile;
pub mod queue;
pub mod table;

pub use database::Database;
pub use hub::StorageHub;
pub use jsonfile::JsonFileStore;
pub use queue::WriteQueue;
pub use table::SqliteTable;
