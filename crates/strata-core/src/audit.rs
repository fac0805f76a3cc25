//! Audit entries — immutable before/after records of every mutation.
//!
//! Entries are append-only: this layer never updates or deletes them.
//! Retention and purge are an external policy concern.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// The kind of mutation an audit entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditAction {
  Create,
  Update,
  Delete,
  Restore,
}

/// One append-only audit row.
///
/// `old_values` is `None` for `Create`; `new_values` is `None` for
/// `Delete`; both are populated for `Update` and `Restore`. Snapshots are
/// captured in the same transaction as the mutation they describe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
  pub id:          Uuid,
  pub actor_id:    Uuid,
  pub action:      AuditAction,
  pub entity_kind: String,
  pub record_id:   Uuid,
  pub old_values:  Option<Value>,
  pub new_values:  Option<Value>,
  pub created_at:  DateTime<Utc>,
}
