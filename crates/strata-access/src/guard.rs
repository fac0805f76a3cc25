//! Tenant guard — the single entry point for loading records on behalf of
//! an actor.
//!
//! Read paths collapse "absent", "soft-deleted" and "owned by another
//! tenant" into `NotFound`, so cross-tenant existence is never observable.
//! Write paths compare the *persisted* tenant against the actor and fail
//! with `CrossTenantViolation` on mismatch; client input never
//! participates in that decision.

use tracing::warn;
use uuid::Uuid;

use strata_core::{
  actor::ActorContext,
  record::{FieldMap, Record},
  store::StoreSession,
  Error, Result,
};

/// Remove a client-supplied `tenant_id` before validation runs. Stamping
/// from the actor context is an invariant, not a client error.
pub(crate) fn strip_client_tenant(actor: &ActorContext, fields: &mut FieldMap) {
  if let Some(supplied) = fields.remove("tenant_id") {
    warn!(
      actor = %actor.actor_id,
      tenant = %actor.tenant_id,
      %supplied,
      "ignoring client-supplied tenant_id"
    );
  }
}

/// Load a record for a read. Absent, cross-tenant and (unless requested)
/// soft-deleted records are all `NotFound`.
pub(crate) fn load_visible(
  s: &mut dyn StoreSession,
  kind: &str,
  id: Uuid,
  actor: &ActorContext,
  include_deleted: bool,
) -> Result<Record> {
  let not_found = || Error::NotFound { kind: kind.to_owned(), id };
  let record = s.get(kind, id)?.ok_or_else(not_found)?;
  if record.tenant_id != actor.tenant_id {
    return Err(not_found());
  }
  if record.is_deleted() && !include_deleted {
    return Err(not_found());
  }
  Ok(record)
}

/// Load a record as a write target. The authoritative tenant is the
/// persisted one; a mismatch is fatal to the call. Soft-deleted records
/// are returned — delete and restore decide what deletion means.
pub(crate) fn load_owned(
  s: &mut dyn StoreSession,
  kind: &str,
  id: Uuid,
  actor: &ActorContext,
) -> Result<Record> {
  let record = s
    .get(kind, id)?
    .ok_or_else(|| Error::NotFound { kind: kind.to_owned(), id })?;
  if record.tenant_id != actor.tenant_id {
    return Err(Error::CrossTenantViolation { id });
  }
  Ok(record)
}
