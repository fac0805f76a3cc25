//! Standalone field validation, run before any transaction is opened.
//!
//! Malformed input never reaches the store: validation failures are
//! surfaced with zero side effects, before tenant checks, quota counts or
//! audit writes happen.

use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

use crate::{
  entity::{EntityDef, FieldDef, FieldType},
  record::FieldMap,
  Error, Result,
};

/// Column names maintained by the layer itself; never accepted as fields.
pub const RESERVED_FIELDS: &[&str] =
  &["id", "tenant_id", "created_by", "created_at", "updated_at", "deleted_at"];

/// One rejected field with a human-readable reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldViolation {
  pub field:   String,
  pub message: String,
}

impl FieldViolation {
  fn new(field: &str, message: impl Into<String>) -> Self {
    Self { field: field.to_owned(), message: message.into() }
  }
}

/// Validate input for a create. All `required` fields must be present and
/// non-null.
pub fn validate_create(def: &EntityDef, fields: &FieldMap) -> Result<()> {
  finish(check(def, fields, true))
}

/// Validate a partial update. Only the supplied fields are checked; a
/// `null` value is allowed on optional fields and means "clear".
pub fn validate_update(def: &EntityDef, fields: &FieldMap) -> Result<()> {
  finish(check(def, fields, false))
}

fn finish(violations: Vec<FieldViolation>) -> Result<()> {
  if violations.is_empty() {
    Ok(())
  } else {
    Err(Error::Validation { violations })
  }
}

fn check(def: &EntityDef, fields: &FieldMap, require_all: bool) -> Vec<FieldViolation> {
  let mut violations = Vec::new();

  for (name, value) in fields {
    if RESERVED_FIELDS.contains(&name.as_str()) {
      violations.push(FieldViolation::new(name, "read-only column"));
      continue;
    }
    let Some(field) = def.field_def(name) else {
      violations.push(FieldViolation::new(name, "unknown field"));
      continue;
    };
    if value.is_null() {
      if field.required {
        violations.push(FieldViolation::new(name, "required field cannot be null"));
      }
      continue;
    }
    if let Some(message) = type_violation(field, value) {
      violations.push(FieldViolation::new(name, message));
    }
  }

  if require_all {
    for field in def.fields.iter().filter(|f| f.required) {
      if !fields.contains_key(&field.name) {
        violations.push(FieldViolation::new(&field.name, "required"));
      }
    }
  }

  violations
}

fn type_violation(field: &FieldDef, value: &Value) -> Option<String> {
  match field.ty {
    FieldType::Text => {
      let Some(s) = value.as_str() else {
        return Some("expected a string".to_owned());
      };
      if let Some(max) = field.max_len
        && s.chars().count() > max
      {
        return Some(format!("longer than {max} characters"));
      }
      None
    }
    FieldType::Integer => {
      (!(value.is_i64() || value.is_u64())).then(|| "expected an integer".to_owned())
    }
    FieldType::Float => (!value.is_number()).then(|| "expected a number".to_owned()),
    FieldType::Boolean => (!value.is_boolean()).then(|| "expected a boolean".to_owned()),
    FieldType::Uuid => match value.as_str() {
      Some(s) if Uuid::parse_str(s).is_ok() => None,
      _ => Some("expected a UUID string".to_owned()),
    },
  }
}
