//! Transport collaborator for fanning out engine events.
//!
//! The core never talks to a network itself; a host hands in a
//! [`Broadcaster`] and receives already-computed messages, fire-and-forget.
//! There is no acknowledgement contract.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// A message handed to the transport collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastMessage {
    /// Event name, e.g. `version_created` or `operation_applied`.
    pub event: String,
    /// Event payload.
    pub payload: serde_json::Value,
}

impl BroadcastMessage {
    pub fn new(event: &str, payload: serde_json::Value) -> Self {
        Self {
            event: event.to_string(),
            payload,
        }
    }
}

/// Fire-and-forget transport seam.
pub trait Broadcaster: Send + Sync {
    /// Deliver `message`, optionally excluding one user (typically the
    /// author) from the fan-out.
    fn broadcast(&self, message: &BroadcastMessage, exclude_user: Option<&str>);
}

/// Broadcaster that drops every message.
#[derive(Debug, Default)]
pub struct NullBroadcaster;

impl Broadcaster for NullBroadcaster {
    fn broadcast(&self, message: &BroadcastMessage, _exclude_user: Option<&str>) {
        debug!(event = %message.event, "dropping broadcast (null transport)");
    }
}

/// Broadcaster that records every message, for tests.
#[derive(Debug, Default)]
pub struct RecordingBroadcaster {
    messages: std::sync::Mutex<Vec<(BroadcastMessage, Option<String>)>>,
}

impl RecordingBroadcaster {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded `(message, excluded_user)` pairs.
    pub fn recorded(&self) -> Vec<(BroadcastMessage, Option<String>)> {
        self.messages
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

impl Broadcaster for RecordingBroadcaster {
    fn broadcast(&self, message: &BroadcastMessage, exclude_user: Option<&str>) {
        if let Ok(mut guard) = self.messages.lock() {
            guard.push((message.clone(), exclude_user.map(str::to_string)));
        }
    }
}
