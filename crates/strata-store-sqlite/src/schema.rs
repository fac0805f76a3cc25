//! SQL schema for the Strata SQLite store.
//!
//! Entity tables are generated from the registry, one table per kind.
//! Every entity table carries the tenant and soft-delete columns with a
//! composite `(tenant_id, deleted_at)` index so isolation filtering stays
//! cheap at scale.

use strata_core::entity::Registry;

/// Pragmas and the append-only audit table.
const SCHEMA_PREFIX: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- The audit log is strictly append-only.
-- No UPDATE or DELETE is ever issued against this table.
CREATE TABLE IF NOT EXISTS audit_log (
    id          TEXT PRIMARY KEY,
    actor_id    TEXT NOT NULL,
    action      TEXT NOT NULL,   -- 'create' | 'update' | 'delete' | 'restore'
    entity_kind TEXT NOT NULL,
    record_id   TEXT NOT NULL,
    old_values  TEXT,            -- JSON snapshot; NULL for 'create'
    new_values  TEXT,            -- JSON snapshot; NULL for 'delete'
    created_at  TEXT NOT NULL    -- ISO 8601 UTC; server-assigned
);

CREATE INDEX IF NOT EXISTS audit_entity_record_idx ON audit_log(entity_kind, record_id);
CREATE INDEX IF NOT EXISTS audit_actor_idx         ON audit_log(actor_id);
";

const SCHEMA_SUFFIX: &str = "PRAGMA user_version = 1;
";

/// Table name for an entity kind. Kind identifiers are validated by the
/// registry, so interpolating them into DDL and queries is safe.
pub fn table_name(kind: &str) -> String { format!("records_{kind}") }

/// Full idempotent DDL for every kind in `registry`.
pub fn schema_for(registry: &Registry) -> String {
  let mut ddl = String::from(SCHEMA_PREFIX);
  for def in registry.entities() {
    let table = table_name(&def.kind);
    ddl.push_str(&format!(
      "
CREATE TABLE IF NOT EXISTS {table} (
    id         TEXT PRIMARY KEY,
    tenant_id  TEXT NOT NULL,
    created_by TEXT NOT NULL,
    fields     TEXT NOT NULL,    -- JSON attribute map
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    deleted_at TEXT              -- NULL = live
);

CREATE INDEX IF NOT EXISTS {table}_tenant_idx  ON {table}(tenant_id, deleted_at);
CREATE INDEX IF NOT EXISTS {table}_creator_idx ON {table}(created_by, created_at);
"
    ));
  }
  ddl.push_str(SCHEMA_SUFFIX);
  ddl
}
