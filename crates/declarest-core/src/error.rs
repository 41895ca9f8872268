// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Declarest resource engine.

use thiserror::Error;

/// The primary error type used across all Declarest contracts and operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (invalid identifier, malformed base path, bad config values).
    /// Raised at construction time, before any request is served.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required field was missing or empty on entity creation.
    #[error("missing required field: {field}")]
    Validation { field: String },

    /// The requested entity does not exist.
    ///
    /// Storage contracts report missing ids with `None`/`false` sentinels;
    /// this variant exists for callers that need an error value to propagate.
    #[error("not found: {0}")]
    NotFound(String),

    /// An insert collided with an existing id. Propagated by the storage
    /// engine uncaught; translation is the caller's concern.
    #[error("duplicate id `{id}` in table `{table}`")]
    Constraint { table: String, id: String },

    /// Storage backend errors (connection, query failure, serialization, file I/O).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// No identity could be resolved from the request.
    #[error("authentication required")]
    Unauthenticated,

    /// An identity was present but does not carry the required role.
    #[error("role `{role}` required")]
    Forbidden { role: String },

    /// Gateway errors (bind failure, server shutdown).
    #[error("gateway error: {message}")]
    Gateway {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Wrap any error as a storage error.
    pub fn storage<E>(source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Storage {
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_names_the_field() {
        let err = Error::Validation {
            field: "title".into(),
        };
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn constraint_error_names_table_and_id() {
        let err = Error::Constraint {
            table: "todos".into(),
            id: "t-1".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("todos"));
        assert!(msg.contains("t-1"));
    }

    #[test]
    fn storage_wraps_arbitrary_sources() {
        let err = Error::storage(std::io::Error::other("disk gone"));
        assert!(err.to_string().contains("disk gone"));
    }
}
