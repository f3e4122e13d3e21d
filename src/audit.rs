//! Audit sink boundary.
//!
//! Every migration batch, backup create/delete, rollback attempt, and
//! conflict resolution produces at least one audit event. Payloads
//! carry entity types, identifiers, and counts; decrypted sensitive
//! values never enter the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

/// One audit trail entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: String,
    pub subject_id: String,
    pub details: serde_json::Value,
    pub at: DateTime<Utc>,
}

/// Injected audit collaborator.
pub trait AuditSink: Send + Sync {
    fn log_event(&self, event_type: &str, subject_id: &str, details: serde_json::Value);
}

/// Sink that retains events in memory; used by tests and as a default
/// when no external trail is wired.
#[derive(Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    pub fn events_of_type(&self, event_type: &str) -> Vec<AuditEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn count(&self) -> usize {
        self.events.lock().map(|e| e.len()).unwrap_or(0)
    }
}

impl AuditSink for MemoryAuditSink {
    fn log_event(&self, event_type: &str, subject_id: &str, details: serde_json::Value) {
        tracing::debug!(event_type, subject_id, "audit event");
        let event = AuditEvent {
            event_type: event_type.to_string(),
            subject_id: subject_id.to_string(),
            details,
            at: Utc::now(),
        };
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Sink that forwards events to the `tracing` subscriber only.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn log_event(&self, event_type: &str, subject_id: &str, details: serde_json::Value) {
        tracing::info!(event_type, subject_id, %details, "audit event");
    }
}
