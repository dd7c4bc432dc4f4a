// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Audit logging for security-sensitive operations.
//!
//! Sign-in attempts, policy transitions, settlements and administrative
//! actions are appended to the `audit_events` table. Keys are time-ordered so
//! listing newest-first is a reverse range scan.

use chrono::{DateTime, Utc};
use redb::{ReadableDatabase, ReadableTable};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::database::{decode, CoverDatabase, StorageResult, AUDIT_EVENTS};

/// Types of auditable events.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum AuditEventType {
    // Auth events
    NonceIssued,
    LoginSucceeded,
    LoginFailed,

    // Policy events
    PolicyCreated,
    ContractSigned,
    PolicyApproved,
    PolicyRejected,
    PolicyExpired,

    // Settlement events
    PaymentConfirmed,
    PaymentRejected,

    // Admin events
    AdminAccess,
}

/// An audit log entry.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuditEvent {
    /// Unique event ID.
    pub event_id: String,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Type of event.
    pub event_type: AuditEventType,
    /// Wallet that triggered the event (if known).
    pub actor: Option<String>,
    /// Resource affected (policy id, wallet address, ...).
    pub resource_id: Option<String>,
    /// Resource type (policy, identity, settlement).
    pub resource_type: Option<String>,
    /// Additional details as JSON.
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
    /// Whether the operation succeeded.
    pub success: bool,
    /// Error message if operation failed.
    pub error: Option<String>,
}

impl AuditEvent {
    /// Create a new audit event.
    pub fn new(event_type: AuditEventType) -> Self {
        Self {
            event_id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type,
            actor: None,
            resource_id: None,
            resource_type: None,
            details: None,
            success: true,
            error: None,
        }
    }

    /// Set the acting wallet.
    pub fn with_actor(mut self, actor: impl Into<String>) -> Self {
        self.actor = Some(actor.into());
        self
    }

    /// Set the resource.
    pub fn with_resource(
        mut self,
        resource_type: impl Into<String>,
        resource_id: impl Into<String>,
    ) -> Self {
        self.resource_type = Some(resource_type.into());
        self.resource_id = Some(resource_id.into());
        self
    }

    /// Add details.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Mark as failed with error message.
    pub fn failed(mut self, error: impl Into<String>) -> Self {
        self.success = false;
        self.error = Some(error.into());
        self
    }

    fn key(&self) -> String {
        let micros = self.timestamp.timestamp_micros().max(0);
        format!("{:020}|{}", micros, self.event_id)
    }
}

/// Repository for audit events.
pub struct AuditRepository<'a> {
    db: &'a CoverDatabase,
}

impl<'a> AuditRepository<'a> {
    /// Create a new audit repository.
    pub fn new(db: &'a CoverDatabase) -> Self {
        Self { db }
    }

    /// Append an audit event.
    pub fn log(&self, event: &AuditEvent) -> StorageResult<()> {
        let key = event.key();
        let json = serde_json::to_vec(event)?;

        let write_txn = self.db.inner().begin_write()?;
        {
            let mut table = write_txn.open_table(AUDIT_EVENTS)?;
            table.insert(key.as_str(), json.as_slice())?;
        }
        write_txn.commit()?;
        Ok(())
    }

    /// Most recent events first, optionally restricted to one resource.
    pub fn list_recent(
        &self,
        limit: usize,
        resource_id: Option<&str>,
    ) -> StorageResult<Vec<AuditEvent>> {
        let read_txn = self.db.inner().begin_read()?;
        let table = read_txn.open_table(AUDIT_EVENTS)?;

        let mut events = Vec::new();
        for entry in table.iter()?.rev() {
            if events.len() >= limit {
                break;
            }
            let (_, value) = entry?;
            let event: AuditEvent = decode(value.value())?;
            if resource_id.is_none_or(|id| event.resource_id.as_deref() == Some(id)) {
                events.push(event);
            }
        }
        Ok(events)
    }
}

/// Helper macro for logging audit events.
///
/// Audit failures never fail the request; they are logged and dropped.
#[macro_export]
macro_rules! audit_log {
    ($db:expr, $event:expr) => {{
        let repo = $crate::storage::AuditRepository::new($db);
        if let Err(e) = repo.log(&$event) {
            tracing::error!(error = %e, "Failed to write audit event");
        }
    }};
    ($db:expr, $event_type:expr, $actor:expr, $resource_type:expr, $resource_id:expr) => {{
        let event = $crate::storage::AuditEvent::new($event_type)
            .with_actor($actor)
            .with_resource($resource_type, $resource_id);
        $crate::audit_log!($db, event)
    }};
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn setup() -> (tempfile::TempDir, CoverDatabase) {
        let temp = tempfile::TempDir::new().unwrap();
        let db = CoverDatabase::open(&temp.path().join("audit.redb")).unwrap();
        (temp, db)
    }

    #[test]
    fn create_audit_event() {
        let event = AuditEvent::new(AuditEventType::PolicyCreated)
            .with_actor("0xabc")
            .with_resource("policy", "pol_1");

        assert_eq!(event.event_type, AuditEventType::PolicyCreated);
        assert_eq!(event.actor, Some("0xabc".to_string()));
        assert_eq!(event.resource_type, Some("policy".to_string()));
        assert_eq!(event.resource_id, Some("pol_1".to_string()));
        assert!(event.success);
    }

    #[test]
    fn failed_event() {
        let event = AuditEvent::new(AuditEventType::LoginFailed)
            .with_actor("0xabc")
            .failed("nonce mismatch");

        assert!(!event.success);
        assert_eq!(event.error, Some("nonce mismatch".to_string()));
    }

    #[test]
    fn list_recent_is_newest_first_and_filters() {
        let (_temp, db) = setup();
        let repo = AuditRepository::new(&db);

        let base = Utc::now();
        for (i, resource) in ["pol_a", "pol_b", "pol_a"].iter().enumerate() {
            let mut event = AuditEvent::new(AuditEventType::PolicyCreated)
                .with_resource("policy", *resource)
                .with_details(serde_json::json!({ "seq": i }));
            event.timestamp = base + Duration::seconds(i as i64);
            repo.log(&event).unwrap();
        }

        let all = repo.list_recent(10, None).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].details, Some(serde_json::json!({ "seq": 2 })));

        let only_a = repo.list_recent(10, Some("pol_a")).unwrap();
        assert_eq!(only_a.len(), 2);

        assert_eq!(repo.list_recent(1, None).unwrap().len(), 1);
    }

    #[test]
    fn macro_logs_event() {
        let (_temp, db) = setup();
        crate::audit_log!(&db, AuditEventType::AdminAccess, "0xadmin", "policy", "pol_1");
        let events = AuditRepository::new(&db).list_recent(5, None).unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].actor.as_deref(), Some("0xadmin"));
    }
}
