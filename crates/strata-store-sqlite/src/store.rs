//! [`SqliteStore`] — the SQLite implementation of [`RecordStore`].

use std::{
  path::Path,
  sync::{
    atomic::{AtomicU64, Ordering},
    Arc,
  },
};

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, TransactionBehavior};
use uuid::Uuid;

use strata_core::{
  audit::AuditEntry,
  entity::Registry,
  record::Record,
  store::{RecordFilter, RecordStore, StoreSession},
  Error, Result,
};

use crate::{
  encode::{
    bind_value, encode_action, encode_dt, encode_uuid, store_err, RawAudit, RawRecord,
  },
  schema::{schema_for, table_name},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Strata record store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted. Write
/// transactions open with `BEGIN IMMEDIATE`, so concurrent writers
/// serialise at the store: a quota count and its subsequent insert can
/// never interleave with another writer's.
#[derive(Clone)]
pub struct SqliteStore {
  conn:       tokio_rusqlite::Connection,
  statements: Arc<AtomicU64>,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and create tables for every kind
  /// in `registry`.
  pub async fn open(path: impl AsRef<Path>, registry: &Registry) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path)
      .await
      .map_err(store_err)?;
    let store = Self { conn, statements: Arc::new(AtomicU64::new(0)) };
    store.init_schema(schema_for(registry)).await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory(registry: &Registry) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory()
      .await
      .map_err(store_err)?;
    let store = Self { conn, statements: Arc::new(AtomicU64::new(0)) };
    store.init_schema(schema_for(registry)).await?;
    Ok(store)
  }

  async fn init_schema(&self, ddl: String) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(&ddl)?;
        Ok(())
      })
      .await
      .map_err(store_err)
  }

  /// Total SQL statements executed through sessions so far. Used by tests
  /// to assert the relationship loader's bounded-query property.
  pub fn statements_executed(&self) -> u64 { self.statements.load(Ordering::Relaxed) }

  async fn run<T, F>(&self, behavior: TransactionBehavior, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn StoreSession) -> Result<T> + Send + 'static,
  {
    let statements = Arc::clone(&self.statements);
    let outcome = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction_with_behavior(behavior)?;
        let mut session = SqliteSession { tx, statements };
        match f(&mut session) {
          Ok(value) => {
            session.tx.commit()?;
            Ok(Ok(value))
          }
          // Dropping the transaction rolls it back; the domain error
          // passes through untouched.
          Err(e) => Ok(Err(e)),
        }
      })
      .await;

    match outcome {
      Ok(inner) => inner,
      Err(e) => Err(store_err(e)),
    }
  }
}

impl RecordStore for SqliteStore {
  async fn write<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn StoreSession) -> Result<T> + Send + 'static,
  {
    self.run(TransactionBehavior::Immediate, f).await
  }

  async fn read<T, F>(&self, f: F) -> Result<T>
  where
    T: Send + 'static,
    F: FnOnce(&mut dyn StoreSession) -> Result<T> + Send + 'static,
  {
    self.run(TransactionBehavior::Deferred, f).await
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

const RECORD_COLUMNS: &str =
  "id, tenant_id, created_by, fields, created_at, updated_at, deleted_at";

struct SqliteSession<'c> {
  tx:         rusqlite::Transaction<'c>,
  statements: Arc<AtomicU64>,
}

impl SqliteSession<'_> {
  fn bump(&self) { self.statements.fetch_add(1, Ordering::Relaxed); }
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawRecord> {
  Ok(RawRecord {
    id:         row.get(0)?,
    tenant_id:  row.get(1)?,
    created_by: row.get(2)?,
    fields:     row.get(3)?,
    created_at: row.get(4)?,
    updated_at: row.get(5)?,
    deleted_at: row.get(6)?,
  })
}

impl StoreSession for SqliteSession<'_> {
  fn insert(&mut self, record: &Record) -> Result<()> {
    self.bump();
    let table = table_name(&record.kind);
    let fields_json = serde_json::to_string(&record.fields)?;
    self
      .tx
      .execute(
        &format!(
          "INSERT INTO {table} ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"
        ),
        rusqlite::params![
          encode_uuid(record.id),
          encode_uuid(record.tenant_id),
          encode_uuid(record.created_by),
          fields_json,
          encode_dt(record.created_at),
          encode_dt(record.updated_at),
          record.deleted_at.map(encode_dt),
        ],
      )
      .map_err(store_err)?;
    Ok(())
  }

  fn update(&mut self, record: &Record) -> Result<()> {
    self.bump();
    let table = table_name(&record.kind);
    let fields_json = serde_json::to_string(&record.fields)?;
    let changed = self
      .tx
      .execute(
        &format!(
          "UPDATE {table} SET fields = ?2, updated_at = ?3, deleted_at = ?4 WHERE id = ?1"
        ),
        rusqlite::params![
          encode_uuid(record.id),
          fields_json,
          encode_dt(record.updated_at),
          record.deleted_at.map(encode_dt),
        ],
      )
      .map_err(store_err)?;
    if changed == 0 {
      return Err(Error::Store(
        format!("update matched no row for {} {}", record.kind, record.id).into(),
      ));
    }
    Ok(())
  }

  fn get(&mut self, kind: &str, id: Uuid) -> Result<Option<Record>> {
    self.bump();
    let table = table_name(kind);
    let raw: Option<RawRecord> = self
      .tx
      .query_row(
        &format!("SELECT {RECORD_COLUMNS} FROM {table} WHERE id = ?1"),
        rusqlite::params![encode_uuid(id)],
        record_from_row,
      )
      .optional()
      .map_err(store_err)?;
    raw.map(|r| r.into_record(kind)).transpose()
  }

  fn query(&mut self, kind: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
    // An explicit empty candidate set can only produce an empty page.
    if filter.ids.as_ref().is_some_and(Vec::is_empty)
      || filter.field_in.as_ref().is_some_and(|(_, vs)| vs.is_empty())
    {
      return Ok(Vec::new());
    }

    self.bump();
    let table = table_name(kind);
    let mut sql =
      format!("SELECT {RECORD_COLUMNS} FROM {table} WHERE tenant_id = ?");
    let mut params: Vec<rusqlite::types::Value> =
      vec![encode_uuid(filter.tenant_id()).into()];

    if !filter.include_deleted {
      sql.push_str(" AND deleted_at IS NULL");
    }
    if let Some(creator) = filter.created_by {
      sql.push_str(" AND created_by = ?");
      params.push(encode_uuid(creator).into());
    }
    for (name, value) in &filter.field_eq {
      sql.push_str(&format!(" AND json_extract(fields, '$.{name}') = ?"));
      params.push(bind_value(value));
    }
    if let Some((name, values)) = &filter.field_in {
      let marks = vec!["?"; values.len()].join(", ");
      sql.push_str(&format!(" AND json_extract(fields, '$.{name}') IN ({marks})"));
      params.extend(values.iter().map(bind_value));
    }
    if let Some(ids) = &filter.ids {
      let marks = vec!["?"; ids.len()].join(", ");
      sql.push_str(&format!(" AND id IN ({marks})"));
      params.extend(ids.iter().map(|id| encode_uuid(*id).into()));
    }

    sql.push_str(" ORDER BY created_at ASC, id ASC");
    match (filter.limit, filter.offset) {
      (Some(limit), Some(offset)) => {
        sql.push_str(&format!(" LIMIT {limit} OFFSET {offset}"));
      }
      (Some(limit), None) => sql.push_str(&format!(" LIMIT {limit}")),
      (None, Some(offset)) => sql.push_str(&format!(" LIMIT -1 OFFSET {offset}")),
      (None, None) => {}
    }

    let mut stmt = self.tx.prepare(&sql).map_err(store_err)?;
    let raws = stmt
      .query_map(rusqlite::params_from_iter(params), record_from_row)
      .map_err(store_err)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(store_err)?;

    raws.into_iter().map(|raw| raw.into_record(kind)).collect()
  }

  fn count_created_since(
    &mut self,
    kind: &str,
    created_by: Uuid,
    since: DateTime<Utc>,
  ) -> Result<u64> {
    self.bump();
    let table = table_name(kind);
    let count: i64 = self
      .tx
      .query_row(
        &format!(
          "SELECT COUNT(*) FROM {table}
           WHERE created_by = ?1 AND created_at >= ?2 AND deleted_at IS NULL"
        ),
        rusqlite::params![encode_uuid(created_by), encode_dt(since)],
        |row| row.get(0),
      )
      .map_err(store_err)?;
    Ok(count as u64)
  }

  fn insert_audit(&mut self, entry: &AuditEntry) -> Result<()> {
    self.bump();
    let old_json = entry.old_values.as_ref().map(serde_json::Value::to_string);
    let new_json = entry.new_values.as_ref().map(serde_json::Value::to_string);
    self
      .tx
      .execute(
        "INSERT INTO audit_log (
           id, actor_id, action, entity_kind, record_id,
           old_values, new_values, created_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        rusqlite::params![
          encode_uuid(entry.id),
          encode_uuid(entry.actor_id),
          encode_action(entry.action),
          entry.entity_kind,
          encode_uuid(entry.record_id),
          old_json,
          new_json,
          encode_dt(entry.created_at),
        ],
      )
      .map_err(store_err)?;
    Ok(())
  }

  fn audit_for_record(&mut self, kind: &str, record_id: Uuid) -> Result<Vec<AuditEntry>> {
    self.bump();
    // rowid preserves append order even when timestamps collide.
    let mut stmt = self
      .tx
      .prepare(
        "SELECT id, actor_id, action, entity_kind, record_id,
                old_values, new_values, created_at
         FROM audit_log
         WHERE entity_kind = ?1 AND record_id = ?2
         ORDER BY rowid ASC",
      )
      .map_err(store_err)?;
    let raws = stmt
      .query_map(rusqlite::params![kind, encode_uuid(record_id)], |row| {
        Ok(RawAudit {
          id:          row.get(0)?,
          actor_id:    row.get(1)?,
          action:      row.get(2)?,
          entity_kind: row.get(3)?,
          record_id:   row.get(4)?,
          old_values:  row.get(5)?,
          new_values:  row.get(6)?,
          created_at:  row.get(7)?,
        })
      })
      .map_err(store_err)?
      .collect::<rusqlite::Result<Vec<_>>>()
      .map_err(store_err)?;

    raws.into_iter().map(RawAudit::into_entry).collect()
  }
}
