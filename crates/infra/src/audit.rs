//! Audit trail of catalog writes.
//!
//! Audit is best effort: a failure to record an entry is logged and never
//! fails the write it describes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use mfgplan_core::{AuditLogId, Entity, UserId};

use crate::catalog::Catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    Create,
    Update,
    Delete,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Create => "CREATE",
            AuditAction::Update => "UPDATE",
            AuditAction::Delete => "DELETE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CREATE" => Some(AuditAction::Create),
            "UPDATE" => Some(AuditAction::Update),
            "DELETE" => Some(AuditAction::Delete),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: AuditLogId,
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: String,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
    pub timestamp: DateTime<Utc>,
}

impl Entity for AuditEntry {
    type Id = AuditLogId;

    fn id(&self) -> Self::Id {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewAuditEntry {
    pub user_id: Option<UserId>,
    pub action: AuditAction,
    pub table_name: String,
    pub record_id: String,
    pub before: Option<JsonValue>,
    pub after: Option<JsonValue>,
}

impl NewAuditEntry {
    pub fn new(
        action: AuditAction,
        table_name: impl Into<String>,
        record_id: impl ToString,
    ) -> Self {
        Self {
            user_id: None,
            action,
            table_name: table_name.into(),
            record_id: record_id.to_string(),
            before: None,
            after: None,
        }
    }

    pub fn by(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    /// Snapshot the record state before the change. Unserializable values are skipped.
    pub fn before(mut self, value: &impl Serialize) -> Self {
        self.before = serde_json::to_value(value).ok();
        self
    }

    pub fn after(mut self, value: &impl Serialize) -> Self {
        self.after = serde_json::to_value(value).ok();
        self
    }

    pub fn stamped(self, id: AuditLogId, timestamp: DateTime<Utc>) -> AuditEntry {
        AuditEntry {
            id,
            user_id: self.user_id,
            action: self.action,
            table_name: self.table_name,
            record_id: self.record_id,
            before: self.before,
            after: self.after,
            timestamp,
        }
    }
}

/// Append an audit entry, logging instead of propagating failures.
pub async fn record_action(catalog: &dyn Catalog, entry: NewAuditEntry) {
    let table = entry.table_name.clone();
    let record = entry.record_id.clone();
    if let Err(err) = catalog.append_audit(entry).await {
        tracing::warn!(
            error = %err,
            table = %table,
            record_id = %record,
            "failed to record audit entry"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn action_names_round_trip() {
        for action in [AuditAction::Create, AuditAction::Update, AuditAction::Delete] {
            assert_eq!(AuditAction::parse(action.as_str()), Some(action));
        }
        assert_eq!(AuditAction::parse("create"), None);
    }

    #[test]
    fn builder_captures_snapshots() {
        let entry = NewAuditEntry::new(AuditAction::Update, "roles", 7)
            .by(UserId::new(1))
            .before(&serde_json::json!({"name": "Old"}))
            .after(&serde_json::json!({"name": "New"}));

        assert_eq!(entry.record_id, "7");
        assert_eq!(entry.user_id, Some(UserId::new(1)));
        assert_eq!(entry.before.unwrap()["name"], "Old");
        assert_eq!(entry.after.unwrap()["name"], "New");
    }
}
