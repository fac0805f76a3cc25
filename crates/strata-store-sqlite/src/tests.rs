//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, Utc};
use serde_json::json;
use uuid::Uuid;

use strata_core::{
  audit::{AuditAction, AuditEntry},
  entity::{EntityDef, FieldDef, FieldType, Registry},
  record::{FieldMap, Record},
  store::{RecordFilter, RecordStore},
  Error,
};

use crate::SqliteStore;

fn registry() -> Registry {
  Registry::builder()
    .entity(
      EntityDef::new("note")
        .field(FieldDef::required("title", FieldType::Text))
        .field(FieldDef::optional("rank", FieldType::Integer)),
    )
    .build()
    .unwrap()
}

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory(&registry())
    .await
    .expect("in-memory store")
}

fn note(tenant_id: Uuid, created_by: Uuid, title: &str) -> Record {
  let now = Utc::now();
  let mut fields = FieldMap::new();
  fields.insert("title".to_owned(), json!(title));
  Record {
    id: Uuid::new_v4(),
    kind: "note".to_owned(),
    tenant_id,
    created_by,
    fields,
    created_at: now,
    updated_at: now,
    deleted_at: None,
  }
}

fn audit_entry(record: &Record, action: AuditAction) -> AuditEntry {
  AuditEntry {
    id: Uuid::new_v4(),
    actor_id: record.created_by,
    action,
    entity_kind: record.kind.clone(),
    record_id: record.id,
    old_values: None,
    new_values: Some(json!({"title": "x"})),
    created_at: Utc::now(),
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn insert_and_get_roundtrip() {
  let s = store().await;
  let rec = note(Uuid::new_v4(), Uuid::new_v4(), "hello");
  let expected = rec.clone();

  s.write(move |session| session.insert(&rec)).await.unwrap();

  let fetched = s
    .read(move |session| session.get("note", expected.id))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.fields["title"], json!("hello"));
  assert!(fetched.deleted_at.is_none());
}

#[tokio::test]
async fn get_missing_returns_none() {
  let s = store().await;
  let id = Uuid::new_v4();
  let fetched = s.read(move |session| session.get("note", id)).await.unwrap();
  assert!(fetched.is_none());
}

#[tokio::test]
async fn query_is_tenant_scoped_and_hides_deleted() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let actor = Uuid::new_v4();

  let live = note(tenant, actor, "live");
  let mut gone = note(tenant, actor, "gone");
  gone.deleted_at = Some(Utc::now());
  let foreign = note(Uuid::new_v4(), actor, "foreign");

  s.write(move |session| {
    session.insert(&live)?;
    session.insert(&gone)?;
    session.insert(&foreign)?;
    Ok(())
  })
  .await
  .unwrap();

  let visible = s
    .read(move |session| session.query("note", &RecordFilter::new(tenant)))
    .await
    .unwrap();
  assert_eq!(visible.len(), 1);
  assert_eq!(visible[0].fields["title"], json!("live"));

  let all = s
    .read(move |session| {
      let mut filter = RecordFilter::new(tenant);
      filter.include_deleted = true;
      session.query("note", &filter)
    })
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn update_rewrites_fields_and_deletion_state() {
  let s = store().await;
  let mut rec = note(Uuid::new_v4(), Uuid::new_v4(), "before");
  let id = rec.id;

  s.write({
    let rec = rec.clone();
    move |session| session.insert(&rec)
  })
  .await
  .unwrap();

  rec.fields.insert("title".to_owned(), json!("after"));
  rec.deleted_at = Some(Utc::now());
  s.write(move |session| session.update(&rec)).await.unwrap();

  let fetched = s
    .read(move |session| session.get("note", id))
    .await
    .unwrap()
    .unwrap();
  assert_eq!(fetched.fields["title"], json!("after"));
  assert!(fetched.deleted_at.is_some());
}

#[tokio::test]
async fn domain_error_rolls_back_every_write() {
  let s = store().await;
  let rec = note(Uuid::new_v4(), Uuid::new_v4(), "doomed");
  let id = rec.id;

  let err = s
    .write(move |session| {
      session.insert(&rec)?;
      Err::<(), Error>(Error::NotDeleted { id: rec.id })
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotDeleted { .. }));

  let fetched = s.read(move |session| session.get("note", id)).await.unwrap();
  assert!(fetched.is_none());
}

// ─── Audit log ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn audit_entries_append_in_order() {
  let s = store().await;
  let rec = note(Uuid::new_v4(), Uuid::new_v4(), "x");
  let record_id = rec.id;

  let first = audit_entry(&rec, AuditAction::Create);
  let mut second = audit_entry(&rec, AuditAction::Delete);
  second.old_values = Some(json!({"title": "x"}));
  second.new_values = None;

  s.write(move |session| {
    session.insert_audit(&first)?;
    session.insert_audit(&second)?;
    Ok(())
  })
  .await
  .unwrap();

  let history = s
    .read(move |session| session.audit_for_record("note", record_id))
    .await
    .unwrap();
  assert_eq!(history.len(), 2);
  assert_eq!(history[0].action, AuditAction::Create);
  assert_eq!(history[1].action, AuditAction::Delete);
  assert!(history[1].new_values.is_none());
}

// ─── Quota counting ──────────────────────────────────────────────────────────

#[tokio::test]
async fn count_created_since_respects_window_and_deletion() {
  let s = store().await;
  let tenant = Uuid::new_v4();
  let actor = Uuid::new_v4();

  let fresh = note(tenant, actor, "fresh");
  let mut stale = note(tenant, actor, "stale");
  stale.created_at = Utc::now() - Duration::hours(48);
  let mut deleted = note(tenant, actor, "deleted");
  deleted.deleted_at = Some(Utc::now());
  let other_actor = note(tenant, Uuid::new_v4(), "other");

  s.write(move |session| {
    session.insert(&fresh)?;
    session.insert(&stale)?;
    session.insert(&deleted)?;
    session.insert(&other_actor)?;
    Ok(())
  })
  .await
  .unwrap();

  let day_window = s
    .read(move |session| {
      session.count_created_since("note", actor, Utc::now() - Duration::hours(24))
    })
    .await
    .unwrap();
  assert_eq!(day_window, 1);

  let week_window = s
    .read(move |session| {
      session.count_created_since("note", actor, Utc::now() - Duration::days(7))
    })
    .await
    .unwrap();
  assert_eq!(week_window, 2);
}

// ─── Statement counter ───────────────────────────────────────────────────────

#[tokio::test]
async fn statement_counter_advances_per_primitive() {
  let s = store().await;
  let rec = note(Uuid::new_v4(), Uuid::new_v4(), "counted");
  let id = rec.id;

  let before = s.statements_executed();
  s.write(move |session| session.insert(&rec)).await.unwrap();
  assert_eq!(s.statements_executed() - before, 1);

  let before = s.statements_executed();
  s.read(move |session| session.get("note", id)).await.unwrap();
  assert_eq!(s.statements_executed() - before, 1);
}
