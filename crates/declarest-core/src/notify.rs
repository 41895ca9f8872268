// SPDX-FileCopyrightText: 2026 Declarest Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Notification fan-out: topic whitelist plus publish-on-mutation.
//!
//! Delivery is decoupled from transport. The [`Notifier`] holds an injected,
//! optional [`NotifySink`]; publishing is fire-and-forget and must never fail
//! the write it is attached to, so an absent sink or an un-whitelisted topic
//! is a silent no-op.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entity::{Entity, Patch};

/// A structured message describing one committed mutation.
///
/// Serializes to the wire shapes
/// `{"resource", "action": "create", "item"}`,
/// `{"resource", "action": "update", "id", "fields"}`, and
/// `{"resource", "action": "delete", "id"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotifyEvent {
    pub resource: String,
    #[serde(flatten)]
    pub change: Change,
}

/// The mutation a [`NotifyEvent`] describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum Change {
    Create { item: Entity },
    Update { id: String, fields: Patch },
    Delete { id: String },
}

impl NotifyEvent {
    pub fn create(resource: impl Into<String>, item: Entity) -> Self {
        NotifyEvent {
            resource: resource.into(),
            change: Change::Create { item },
        }
    }

    pub fn update(resource: impl Into<String>, id: impl Into<String>, fields: Patch) -> Self {
        NotifyEvent {
            resource: resource.into(),
            change: Change::Update {
                id: id.into(),
                fields,
            },
        }
    }

    pub fn delete(resource: impl Into<String>, id: impl Into<String>) -> Self {
        NotifyEvent {
            resource: resource.into(),
            change: Change::Delete { id: id.into() },
        }
    }
}

/// Transport capability for delivering events to subscribers.
///
/// Implementations are best-effort; `publish` has no failure channel by
/// design.
#[async_trait]
pub trait NotifySink: Send + Sync {
    async fn publish(&self, event: &NotifyEvent);
}

/// Topic whitelist plus optional transport.
///
/// Built once at synthesis time from the declared resource topics; read-only
/// thereafter.
#[derive(Clone)]
pub struct Notifier {
    topics: Arc<HashSet<String>>,
    sink: Option<Arc<dyn NotifySink>>,
}

impl Notifier {
    pub fn new(topics: impl IntoIterator<Item = String>, sink: Option<Arc<dyn NotifySink>>) -> Self {
        Notifier {
            topics: Arc::new(topics.into_iter().collect()),
            sink,
        }
    }

    /// A notifier with no topics and no transport; publishes are dropped.
    pub fn disabled() -> Self {
        Notifier {
            topics: Arc::new(HashSet::new()),
            sink: None,
        }
    }

    /// Whether a topic is declared by any resource.
    pub fn allows(&self, topic: &str) -> bool {
        self.topics.contains(topic)
    }

    /// The declared topics, for transports that filter subscriptions.
    pub fn topics(&self) -> Arc<HashSet<String>> {
        Arc::clone(&self.topics)
    }

    /// Publish an event. No sink, or a topic outside the whitelist, drops
    /// the event silently.
    pub async fn publish(&self, event: NotifyEvent) {
        let Some(sink) = &self.sink else {
            debug!(resource = %event.resource, "no notify sink registered, dropping event");
            return;
        };
        if !self.topics.contains(&event.resource) {
            debug!(resource = %event.resource, "topic not whitelisted, dropping event");
            return;
        }
        sink.publish(&event).await;
    }
}
