//! Actor context — the per-request identity supplied by the external auth
//! collaborator.

use uuid::Uuid;

/// Coarse role attached to an actor by the auth layer.
///
/// `Admin` unlocks the audit-history surface within the actor's own
/// tenant; it grants nothing across tenants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
  #[default]
  Member,
  Admin,
}

/// The verified identity under which an operation executes.
///
/// Constructed per request, read-only, discarded at request end, and never
/// persisted. The `tenant_id` here is the single source of truth for
/// tenant stamping and isolation checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActorContext {
  pub actor_id:  Uuid,
  pub tenant_id: Uuid,
  pub role:      Role,
}

impl ActorContext {
  pub fn member(actor_id: Uuid, tenant_id: Uuid) -> Self {
    Self { actor_id, tenant_id, role: Role::Member }
  }

  pub fn admin(actor_id: Uuid, tenant_id: Uuid) -> Self {
    Self { actor_id, tenant_id, role: Role::Admin }
  }

  pub fn is_admin(&self) -> bool { matches!(self.role, Role::Admin) }
}
