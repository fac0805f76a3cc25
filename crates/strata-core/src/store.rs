//! The `RecordStore` / `StoreSession` abstraction over the underlying
//! transactional store.
//!
//! A backend executes caller-supplied closures against a [`StoreSession`]:
//! [`RecordStore::write`] scopes the closure in a single transaction that
//! commits only when the closure returns `Ok`, and [`RecordStore::read`]
//! runs it against one consistent snapshot. The access layer composes its
//! ownership checks, mutations and audit writes inside one closure, so
//! they commit or roll back together; it never touches a connection
//! directly.

use std::future::Future;

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::{audit::AuditEntry, record::Record, Result};

// ─── Filter ──────────────────────────────────────────────────────────────────

/// Tenant-scoped query parameters for [`StoreSession::query`].
///
/// The tenant id is required at construction and not writable afterwards,
/// so every collection query that reaches a backend is tenant-filtered by
/// construction.
#[derive(Debug, Clone)]
pub struct RecordFilter {
  tenant_id: Uuid,
  /// Include soft-deleted rows. Default reads leave this off.
  pub include_deleted: bool,
  /// Equality constraints on named fields.
  pub field_eq: Vec<(String, Value)>,
  /// Restrict to rows whose named field is one of the given values; used
  /// by the relationship loader to batch one-to-many lookups.
  pub field_in: Option<(String, Vec<Value>)>,
  /// Restrict to an explicit id set; used to batch many-to-one lookups.
  pub ids: Option<Vec<Uuid>>,
  pub created_by: Option<Uuid>,
  pub limit:  Option<usize>,
  pub offset: Option<usize>,
}

impl RecordFilter {
  pub fn new(tenant_id: Uuid) -> Self {
    Self {
      tenant_id,
      include_deleted: false,
      field_eq: Vec::new(),
      field_in: None,
      ids: None,
      created_by: None,
      limit: None,
      offset: None,
    }
  }

  pub fn tenant_id(&self) -> Uuid { self.tenant_id }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// Synchronous record primitives executed inside one transaction scope.
///
/// [`StoreSession::get`] is deliberately tenant-unaware: write paths load
/// the persisted record first and derive the authoritative tenant from it,
/// not from client input. Only the tenant guard calls it.
pub trait StoreSession {
  fn insert(&mut self, record: &Record) -> Result<()>;

  /// Rewrite `fields`, `updated_at` and `deleted_at` for an existing row.
  /// `id`, `tenant_id`, `created_by` and `created_at` never change.
  fn update(&mut self, record: &Record) -> Result<()>;

  fn get(&mut self, kind: &str, id: Uuid) -> Result<Option<Record>>;

  fn query(&mut self, kind: &str, filter: &RecordFilter) -> Result<Vec<Record>>;

  /// Count live (non-deleted) records created by `created_by` at or after
  /// `since`. Runs in the same transaction as a subsequent insert, which
  /// is what makes quota checks race-free.
  fn count_created_since(
    &mut self,
    kind: &str,
    created_by: Uuid,
    since: DateTime<Utc>,
  ) -> Result<u64>;

  fn insert_audit(&mut self, entry: &AuditEntry) -> Result<()>;

  /// Audit entries for one record, oldest first.
  fn audit_for_record(&mut self, kind: &str, record_id: Uuid) -> Result<Vec<AuditEntry>>;
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// A transactional record store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes.
pub trait RecordStore: Send + Sync {
  /// Run `f` inside a single write transaction. The transaction commits
  /// only if `f` returns `Ok`; any error rolls back every write made
  /// through the session, audit entries included.
  fn write<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn StoreSession) -> Result<T> + Send + 'static;

  /// Run `f` against one consistent snapshot.
  fn read<T, F>(&self, f: F) -> impl Future<Output = Result<T>> + Send
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn StoreSession) -> Result<T> + Send + 'static;
}
