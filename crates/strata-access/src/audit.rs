//! Audit recording — one entry per successful mutation, written through
//! the same session (and therefore the same transaction) as the mutation
//! itself.

use chrono::Utc;
use serde_json::Value;
use uuid::Uuid;

use strata_core::{
  actor::ActorContext,
  audit::{AuditAction, AuditEntry},
  store::StoreSession,
  Result,
};

/// Append one audit entry. `old_values` must be captured before the
/// mutation is applied, never reconstructed afterwards.
pub(crate) fn append(
  s: &mut dyn StoreSession,
  actor: &ActorContext,
  action: AuditAction,
  entity_kind: &str,
  record_id: Uuid,
  old_values: Option<Value>,
  new_values: Option<Value>,
) -> Result<()> {
  let entry = AuditEntry {
    id: Uuid::new_v4(),
    actor_id: actor.actor_id,
    action,
    entity_kind: entity_kind.to_owned(),
    record_id,
    old_values,
    new_values,
    created_at: Utc::now(),
  };
  s.insert_audit(&entry)
}
