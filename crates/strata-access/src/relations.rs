//! Relationship loading in a bounded number of queries.
//!
//! One batched query per requested relation, regardless of how many
//! records are on the page. Batch queries go through the same
//! tenant-filtered path as every other read, so a foreign key pointing at
//! another tenant's record (a data integrity anomaly) resolves to the
//! absent marker instead of crossing the boundary.

use std::collections::{BTreeMap, BTreeSet};

use serde_json::Value;
use uuid::Uuid;

use strata_core::{
  entity::{EntityDef, RelationDef, RelationKind},
  record::{Record, RelatedRecords, ResolvedRecord},
  store::{RecordFilter, StoreSession},
  Error, Result,
};

/// Resolve the relation names a caller asked for against the entity
/// definition. Unknown names are rejected before any transaction opens.
pub(crate) fn select(def: &EntityDef, names: &[&str]) -> Result<Vec<RelationDef>> {
  names
    .iter()
    .map(|name| {
      def.relation_def(name).cloned().ok_or_else(|| Error::UnknownRelation {
        kind:     def.kind.clone(),
        relation: (*name).to_owned(),
      })
    })
    .collect()
}

/// Attach resolved relationship data to `records`, issuing one query per
/// relation.
pub(crate) fn resolve(
  s: &mut dyn StoreSession,
  tenant_id: Uuid,
  records: Vec<Record>,
  relations: &[RelationDef],
) -> Result<Vec<ResolvedRecord>> {
  let mut resolved: Vec<ResolvedRecord> = records
    .into_iter()
    .map(|record| ResolvedRecord { record, relations: BTreeMap::new() })
    .collect();

  for rel in relations {
    match rel.kind {
      RelationKind::ManyToOne => resolve_many_to_one(s, tenant_id, &mut resolved, rel)?,
      RelationKind::OneToMany => resolve_one_to_many(s, tenant_id, &mut resolved, rel)?,
    }
  }

  Ok(resolved)
}

/// Read a foreign-key field as a UUID. Anything unparsable counts as
/// absent; write-side validation keeps declared `Uuid` fields well-formed.
fn fk_value(record: &Record, field: &str) -> Option<Uuid> {
  record
    .fields
    .get(field)
    .and_then(Value::as_str)
    .and_then(|s| Uuid::parse_str(s).ok())
}

fn resolve_many_to_one(
  s: &mut dyn StoreSession,
  tenant_id: Uuid,
  resolved: &mut [ResolvedRecord],
  rel: &RelationDef,
) -> Result<()> {
  let wanted: BTreeSet<Uuid> = resolved
    .iter()
    .filter_map(|item| fk_value(&item.record, &rel.foreign_key))
    .collect();

  let by_id: BTreeMap<Uuid, Record> = if wanted.is_empty() {
    BTreeMap::new()
  } else {
    let mut filter = RecordFilter::new(tenant_id);
    filter.ids = Some(wanted.into_iter().collect());
    s.query(&rel.target, &filter)?
      .into_iter()
      .map(|r| (r.id, r))
      .collect()
  };

  for item in resolved.iter_mut() {
    let hit = fk_value(&item.record, &rel.foreign_key).and_then(|id| by_id.get(&id).cloned());
    if rel.mandatory && hit.is_none() {
      return Err(Error::MandatoryRelationMissing {
        relation:  rel.name.clone(),
        record_id: item.record.id,
      });
    }
    item
      .relations
      .insert(rel.name.clone(), RelatedRecords::One(hit.map(Box::new)));
  }

  Ok(())
}

fn resolve_one_to_many(
  s: &mut dyn StoreSession,
  tenant_id: Uuid,
  resolved: &mut [ResolvedRecord],
  rel: &RelationDef,
) -> Result<()> {
  let children = if resolved.is_empty() {
    Vec::new()
  } else {
    let parent_ids: Vec<Value> = resolved
      .iter()
      .map(|item| Value::String(item.record.id.hyphenated().to_string()))
      .collect();
    let mut filter = RecordFilter::new(tenant_id);
    filter.field_in = Some((rel.foreign_key.clone(), parent_ids));
    s.query(&rel.target, &filter)?
  };

  let mut by_parent: BTreeMap<Uuid, Vec<Record>> = BTreeMap::new();
  for child in children {
    if let Some(parent_id) = fk_value(&child, &rel.foreign_key) {
      by_parent.entry(parent_id).or_default().push(child);
    }
  }

  for item in resolved.iter_mut() {
    let group = by_parent.remove(&item.record.id).unwrap_or_default();
    item.relations.insert(rel.name.clone(), RelatedRecords::Many(group));
  }

  Ok(())
}
