//! Quota enforcement on create paths.
//!
//! The count and the subsequent insert share one write transaction, so
//! two concurrent creates cannot both pass the check: the store serialises
//! writers and the later transaction observes the earlier insert.

use chrono::{DateTime, Utc};
use tracing::debug;
use uuid::Uuid;

use strata_core::{entity::QuotaRule, store::StoreSession, Error, Result};

/// Admit or reject a create under `rule`. Only live records count, so a
/// soft-deleted record frees its slot.
pub(crate) fn admit(
  s: &mut dyn StoreSession,
  kind: &str,
  actor_id: Uuid,
  rule: &QuotaRule,
  now: DateTime<Utc>,
) -> Result<()> {
  let since = now - rule.window;
  let used = s.count_created_since(kind, actor_id, since)?;
  if used >= u64::from(rule.max_per_actor) {
    debug!(%actor_id, kind, used, limit = rule.max_per_actor, "quota exhausted");
    return Err(Error::QuotaExceeded {
      kind:  kind.to_owned(),
      limit: rule.max_per_actor,
    });
  }
  Ok(())
}
