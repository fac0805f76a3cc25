//! Encoding and decoding helpers between core domain types and the
//! plain-text representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings. Field maps and audit
//! snapshots are stored as compact JSON. UUIDs are stored as hyphenated
//! lowercase strings.

use chrono::{DateTime, Utc};
use strata_core::{
  audit::{AuditAction, AuditEntry},
  record::Record,
  Error, Result,
};
use uuid::Uuid;

/// Wrap any backend-level failure as a retryable store error.
pub fn store_err<E>(e: E) -> Error
where
  E: std::error::Error + Send + Sync + 'static,
{
  Error::Store(Box::new(e))
}

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> {
  Uuid::parse_str(s).map_err(store_err)
}

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(store_err)
}

// ─── AuditAction ─────────────────────────────────────────────────────────────

pub fn encode_action(action: AuditAction) -> &'static str {
  match action {
    AuditAction::Create => "create",
    AuditAction::Update => "update",
    AuditAction::Delete => "delete",
    AuditAction::Restore => "restore",
  }
}

pub fn decode_action(s: &str) -> Result<AuditAction> {
  match s {
    "create" => Ok(AuditAction::Create),
    "update" => Ok(AuditAction::Update),
    "delete" => Ok(AuditAction::Delete),
    "restore" => Ok(AuditAction::Restore),
    other => Err(Error::Store(format!("unknown audit action: {other:?}").into())),
  }
}

// ─── JSON parameters ─────────────────────────────────────────────────────────

/// Convert a JSON field value into a SQLite parameter comparable against
/// `json_extract` output.
pub fn bind_value(v: &serde_json::Value) -> rusqlite::types::Value {
  use rusqlite::types::Value as Sql;
  match v {
    serde_json::Value::Null => Sql::Null,
    serde_json::Value::Bool(b) => Sql::Integer(i64::from(*b)),
    serde_json::Value::Number(n) => {
      if let Some(i) = n.as_i64() {
        Sql::Integer(i)
      } else {
        Sql::Real(n.as_f64().unwrap_or(f64::NAN))
      }
    }
    serde_json::Value::String(s) => Sql::Text(s.clone()),
    other => Sql::Text(other.to_string()),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an entity-table row.
pub struct RawRecord {
  pub id:         String,
  pub tenant_id:  String,
  pub created_by: String,
  pub fields:     String,
  pub created_at: String,
  pub updated_at: String,
  pub deleted_at: Option<String>,
}

impl RawRecord {
  pub fn into_record(self, kind: &str) -> Result<Record> {
    Ok(Record {
      id:         decode_uuid(&self.id)?,
      kind:       kind.to_owned(),
      tenant_id:  decode_uuid(&self.tenant_id)?,
      created_by: decode_uuid(&self.created_by)?,
      fields:     serde_json::from_str(&self.fields)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      deleted_at: self.deleted_at.as_deref().map(decode_dt).transpose()?,
    })
  }
}

/// Raw strings read directly from an `audit_log` row.
pub struct RawAudit {
  pub id:          String,
  pub actor_id:    String,
  pub action:      String,
  pub entity_kind: String,
  pub record_id:   String,
  pub old_values:  Option<String>,
  pub new_values:  Option<String>,
  pub created_at:  String,
}

impl RawAudit {
  pub fn into_entry(self) -> Result<AuditEntry> {
    let old_values =
      self.old_values.as_deref().map(serde_json::from_str).transpose()?;
    let new_values =
      self.new_values.as_deref().map(serde_json::from_str).transpose()?;
    Ok(AuditEntry {
      id: decode_uuid(&self.id)?,
      actor_id: decode_uuid(&self.actor_id)?,
      action: decode_action(&self.action)?,
      entity_kind: self.entity_kind,
      record_id: decode_uuid(&self.record_id)?,
      old_values,
      new_values,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
