//! Error taxonomy for the Strata data access layer.

use thiserror::Error;
use uuid::Uuid;

use crate::validate::FieldViolation;

/// Errors returned by the access layer and its storage backends.
///
/// Domain errors are expected outcomes and are returned to callers as
/// values. Only [`Error::Store`] represents a backend fault; it is the one
/// class a caller may retry transparently.
#[derive(Debug, Error)]
pub enum Error {
  /// The record is absent, soft-deleted, or owned by another tenant.
  /// Reads never distinguish those cases.
  #[error("{kind} {id} not found")]
  NotFound { kind: String, id: Uuid },

  /// A write targeted a record whose persisted tenant differs from the
  /// actor's. Always fatal to the call.
  #[error("record {id} belongs to another tenant")]
  CrossTenantViolation { id: Uuid },

  #[error("quota exceeded for {kind}: at most {limit} per actor")]
  QuotaExceeded { kind: String, limit: u32 },

  /// Restore was requested on a record that is not soft-deleted.
  #[error("record {id} is not deleted")]
  NotDeleted { id: Uuid },

  #[error("validation failed: {}", describe(.violations))]
  Validation { violations: Vec<FieldViolation> },

  #[error("unknown entity kind: {0:?}")]
  UnknownEntityKind(String),

  #[error("unknown relation {relation:?} on {kind}")]
  UnknownRelation { kind: String, relation: String },

  /// A relation declared mandatory resolved to no record.
  #[error("mandatory relation {relation:?} missing on record {record_id}")]
  MandatoryRelationMissing { relation: String, record_id: Uuid },

  /// The operation is restricted to administrators.
  #[error("administrator role required")]
  AdminRequired,

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// The underlying store failed. The operation was rolled back with no
  /// side effects; callers may retry a bounded number of times.
  #[error("store unavailable: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl Error {
  /// Whether the calling layer may transparently retry the operation.
  pub fn is_retryable(&self) -> bool { matches!(self, Self::Store(_)) }
}

fn describe(violations: &[FieldViolation]) -> String {
  violations
    .iter()
    .map(|v| format!("{}: {}", v.field, v.message))
    .collect::<Vec<_>>()
    .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
