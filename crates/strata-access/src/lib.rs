//! The Strata data access layer.
//!
//! Composes the tenant guard, soft-delete controller, audit recorder,
//! relationship loader and quota enforcer over any
//! [`RecordStore`](strata_core::store::RecordStore) backend, exposing the
//! operation surface an API layer calls into. Every mutating operation
//! runs its ownership check, the target mutation and the audit write
//! inside one transaction; all three commit or roll back together. The
//! layer holds no mutable process-wide state — identity arrives as an
//! explicit [`ActorContext`] on every call.

pub mod config;

mod audit;
mod guard;
mod quota;
mod relations;


use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, instrument};
use uuid::Uuid;

use strata_core::{
  actor::ActorContext,
  audit::{AuditAction, AuditEntry},
  entity::Registry,
  record::{FieldMap, Record, ResolvedRecord},
  store::{RecordFilter, RecordStore},
  validate::{self, FieldViolation},
  Error, Result,
};

pub use config::AccessConfig;

// ─── List parameters ─────────────────────────────────────────────────────────

/// Caller-supplied parameters for [`AccessLayer::list`].
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
  /// Equality constraints on declared fields.
  pub field_eq: Vec<(String, Value)>,
  /// Also return soft-deleted records.
  pub include_deleted: bool,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

// ─── Access layer ────────────────────────────────────────────────────────────

/// The composed data access layer.
///
/// Cloning is as cheap as cloning the backend store; the registry is
/// shared.
#[derive(Clone)]
pub struct AccessLayer<S> {
  store:    S,
  registry: Arc<Registry>,
}

impl<S: RecordStore> AccessLayer<S> {
  pub fn new(store: S, registry: Registry) -> Self {
    Self { store, registry: Arc::new(registry) }
  }

  pub fn registry(&self) -> &Registry { &self.registry }

  pub fn store(&self) -> &S { &self.store }

  // ── Create ────────────────────────────────────────────────────────────

  /// Create a record of `kind` owned by the actor's tenant.
  ///
  /// The record's `tenant_id` comes from the actor context; a
  /// client-supplied value is overwritten, not an error. Quota rules for
  /// the kind are checked inside the same transaction as the insert.
  #[instrument(level = "debug", skip_all, fields(kind = %kind, actor = %actor.actor_id))]
  pub async fn create(
    &self,
    actor: &ActorContext,
    kind: &str,
    mut fields: FieldMap,
  ) -> Result<Record> {
    let def = self.registry.entity(kind)?;
    guard::strip_client_tenant(actor, &mut fields);
    validate::validate_create(def, &fields)?;
    drop_null_fields(&mut fields);

    let now = Utc::now();
    let record = Record {
      id: Uuid::new_v4(),
      kind: def.kind.clone(),
      tenant_id: actor.tenant_id,
      created_by: actor.actor_id,
      fields,
      created_at: now,
      updated_at: now,
      deleted_at: None,
    };
    let quota_rule = def.quota;
    let actor = *actor;

    self
      .store
      .write(move |s| {
        if let Some(rule) = quota_rule {
          quota::admit(s, &record.kind, actor.actor_id, &rule, now)?;
        }
        s.insert(&record)?;
        let after = record.snapshot()?;
        audit::append(
          s,
          &actor,
          AuditAction::Create,
          &record.kind,
          record.id,
          None,
          Some(after),
        )?;
        Ok(record)
      })
      .await
  }

  // ── Read ──────────────────────────────────────────────────────────────

  /// Fetch one record visible to the actor. Cross-tenant existence is not
  /// observable: absent, soft-deleted and foreign-tenant records all
  /// return [`Error::NotFound`].
  #[instrument(level = "debug", skip_all, fields(kind = %kind, id = %id))]
  pub async fn get(
    &self,
    actor: &ActorContext,
    kind: &str,
    id: Uuid,
    include_deleted: bool,
  ) -> Result<Record> {
    self.registry.entity(kind)?;
    let kind = kind.to_owned();
    let actor = *actor;
    self
      .store
      .read(move |s| guard::load_visible(s, &kind, id, &actor, include_deleted))
      .await
  }

  /// List records of `kind` in the actor's tenant, optionally annotated
  /// with resolved relations.
  ///
  /// Each requested relation costs exactly one additional store query,
  /// independent of the page size. All reads in one call observe a single
  /// snapshot.
  #[instrument(level = "debug", skip_all, fields(kind = %kind, actor = %actor.actor_id))]
  pub async fn list(
    &self,
    actor: &ActorContext,
    kind: &str,
    query: ListQuery,
    with_relations: &[&str],
  ) -> Result<Vec<ResolvedRecord>> {
    let def = self.registry.entity(kind)?;
    for (name, _) in &query.field_eq {
      if def.field_def(name).is_none() {
        return Err(Error::Validation {
          violations: vec![FieldViolation {
            field:   name.clone(),
            message: "unknown filter field".to_owned(),
          }],
        });
      }
    }
    let relations = relations::select(def, with_relations)?;
    let kind = kind.to_owned();
    let actor = *actor;

    self
      .store
      .read(move |s| {
        let mut filter = RecordFilter::new(actor.tenant_id);
        filter.include_deleted = query.include_deleted;
        filter.field_eq = query.field_eq;
        filter.limit = query.limit;
        filter.offset = query.offset;
        let records = s.query(&kind, &filter)?;
        relations::resolve(s, actor.tenant_id, records, &relations)
      })
      .await
  }

  // ── Update ────────────────────────────────────────────────────────────

  /// Apply a partial field update. Reserved columns are rejected, a
  /// client-supplied `tenant_id` is discarded, and a `null` value clears
  /// an optional field. Soft-deleted records cannot be updated; restore
  /// them first.
  #[instrument(level = "debug", skip_all, fields(kind = %kind, id = %id, actor = %actor.actor_id))]
  pub async fn update(
    &self,
    actor: &ActorContext,
    kind: &str,
    id: Uuid,
    mut fields: FieldMap,
  ) -> Result<Record> {
    let def = self.registry.entity(kind)?;
    guard::strip_client_tenant(actor, &mut fields);
    validate::validate_update(def, &fields)?;
    let kind = kind.to_owned();
    let actor = *actor;

    self
      .store
      .write(move |s| {
        let mut record = guard::load_owned(s, &kind, id, &actor)?;
        if record.is_deleted() {
          return Err(Error::NotFound { kind, id });
        }
        let before = record.snapshot()?;

        for (name, value) in fields {
          if value.is_null() {
            record.fields.remove(&name);
          } else {
            record.fields.insert(name, value);
          }
        }
        record.updated_at = Utc::now();
        s.update(&record)?;

        let after = record.snapshot()?;
        audit::append(
          s,
          &actor,
          AuditAction::Update,
          &record.kind,
          record.id,
          Some(before),
          Some(after),
        )?;
        Ok(record)
      })
      .await
  }

  // ── Soft delete ───────────────────────────────────────────────────────

  /// Soft-delete a record. Deleting an already-deleted record succeeds
  /// without writing a second audit entry, so callers need not track
  /// delete state.
  #[instrument(level = "debug", skip_all, fields(kind = %kind, id = %id, actor = %actor.actor_id))]
  pub async fn delete(&self, actor: &ActorContext, kind: &str, id: Uuid) -> Result<()> {
    self.registry.entity(kind)?;
    let kind = kind.to_owned();
    let actor = *actor;

    self
      .store
      .write(move |s| {
        let mut record = guard::load_owned(s, &kind, id, &actor)?;
        if record.is_deleted() {
          debug!(%id, "already soft-deleted");
          return Ok(());
        }
        let before = record.snapshot()?;

        let now = Utc::now();
        record.deleted_at = Some(now);
        record.updated_at = now;
        s.update(&record)?;

        audit::append(
          s,
          &actor,
          AuditAction::Delete,
          &record.kind,
          record.id,
          Some(before),
          None,
        )?;
        Ok(())
      })
      .await
  }

  /// Restore a soft-deleted record. `created_at` is untouched; only
  /// `deleted_at` clears and `updated_at` advances.
  #[instrument(level = "debug", skip_all, fields(kind = %kind, id = %id, actor = %actor.actor_id))]
  pub async fn restore(
    &self,
    actor: &ActorContext,
    kind: &str,
    id: Uuid,
  ) -> Result<Record> {
    self.registry.entity(kind)?;
    let kind = kind.to_owned();
    let actor = *actor;

    self
      .store
      .write(move |s| {
        let mut record = guard::load_owned(s, &kind, id, &actor)?;
        // The guard has already checked ownership; re-check so a restore
        // can never resurrect a record across the tenant boundary.
        if record.tenant_id != actor.tenant_id {
          return Err(Error::CrossTenantViolation { id });
        }
        if !record.is_deleted() {
          return Err(Error::NotDeleted { id });
        }
        let before = record.snapshot()?;

        record.deleted_at = None;
        record.updated_at = Utc::now();
        s.update(&record)?;

        let after = record.snapshot()?;
        audit::append(
          s,
          &actor,
          AuditAction::Restore,
          &record.kind,
          record.id,
          Some(before),
          Some(after),
        )?;
        Ok(record)
      })
      .await
  }

  // ── Audit history ─────────────────────────────────────────────────────

  /// Full audit trail for one record, oldest first. Admin-scoped; the
  /// target record must belong to the actor's tenant, and a foreign
  /// tenant's record is indistinguishable from an absent one.
  #[instrument(level = "debug", skip_all, fields(kind = %kind, id = %id, actor = %actor.actor_id))]
  pub async fn audit_history(
    &self,
    actor: &ActorContext,
    kind: &str,
    id: Uuid,
  ) -> Result<Vec<AuditEntry>> {
    if !actor.is_admin() {
      return Err(Error::AdminRequired);
    }
    self.registry.entity(kind)?;
    let kind = kind.to_owned();
    let actor = *actor;

    self
      .store
      .read(move |s| {
        guard::load_visible(s, &kind, id, &actor, true)?;
        s.audit_for_record(&kind, id)
      })
      .await
  }
}

/// Drop explicit nulls before insert so snapshots only carry real values.
fn drop_null_fields(fields: &mut FieldMap) {
  fields.retain(|_, value| !value.is_null());
}
