//! Record — the generic tenant-scoped entity row.
//!
//! Records are mutable in place (unlike audit entries); every mutation is
//! captured by the audit recorder before and after. Deletion is a state
//! transition on `deleted_at`, never a physical removal.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::Result;

/// Named attribute values for one record, keyed by field name.
pub type FieldMap = serde_json::Map<String, Value>;

/// A persisted entity row.
///
/// `tenant_id` is stamped exactly once at creation from the creating
/// actor's context and is never accepted as client input afterwards.
/// `created_at` and `updated_at` are maintained by the layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
  pub id:         Uuid,
  pub kind:       String,
  pub tenant_id:  Uuid,
  /// The actor that created the record; quota rules count by this column.
  pub created_by: Uuid,
  pub fields:     FieldMap,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  /// `None` means live; `Some` means soft-deleted and hidden from default
  /// reads until restored.
  pub deleted_at: Option<DateTime<Utc>>,
}

impl Record {
  pub fn is_deleted(&self) -> bool { self.deleted_at.is_some() }

  /// Full-state snapshot used for audit `old_values`/`new_values`.
  pub fn snapshot(&self) -> Result<Value> { Ok(serde_json::to_value(self)?) }
}

// ─── Resolved relations ──────────────────────────────────────────────────────

/// Relationship data attached to a record by the relationship loader.
///
/// A related record that does not exist, is soft-deleted, or belongs to
/// another tenant is an absent marker (`One(None)` / missing from `Many`),
/// not a lookup error.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RelatedRecords {
  One(Option<Box<Record>>),
  Many(Vec<Record>),
}

/// A record annotated with the relations the caller asked for.
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecord {
  pub record:    Record,
  pub relations: BTreeMap<String, RelatedRecords>,
}
