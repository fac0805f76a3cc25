//! Entity definitions — typed field descriptors, relations and quota rules.
//!
//! The registry replaces annotation-style dynamic schemas with explicit
//! per-kind descriptor tables. All names and cross-references are checked
//! once, at construction; query code may interpolate validated identifiers
//! without further escaping.

use std::collections::{BTreeMap, BTreeSet};

use chrono::Duration;
use thiserror::Error;

use crate::validate::RESERVED_FIELDS;

// ─── Fields ──────────────────────────────────────────────────────────────────

/// The value type a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
  Text,
  Integer,
  Float,
  Boolean,
  /// A hyphenated UUID string; the only type usable as a foreign key.
  Uuid,
}

/// Descriptor for one named attribute of an entity kind.
#[derive(Debug, Clone)]
pub struct FieldDef {
  pub name:     String,
  pub ty:       FieldType,
  pub required: bool,
  /// Maximum length in characters for `Text` fields; ignored otherwise.
  pub max_len:  Option<usize>,
}

impl FieldDef {
  pub fn required(name: &str, ty: FieldType) -> Self {
    Self { name: name.to_owned(), ty, required: true, max_len: None }
  }

  pub fn optional(name: &str, ty: FieldType) -> Self {
    Self { name: name.to_owned(), ty, required: false, max_len: None }
  }

  pub fn with_max_len(mut self, max_len: usize) -> Self {
    self.max_len = Some(max_len);
    self
  }
}

// ─── Relations ───────────────────────────────────────────────────────────────

/// Direction of a declared association.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationKind {
  /// The foreign key lives on the declaring kind.
  ManyToOne,
  /// The foreign key lives on the target kind.
  OneToMany,
}

/// A declared association between two entity kinds, resolved at read time
/// by the relationship loader. Relations have no independent lifecycle.
#[derive(Debug, Clone)]
pub struct RelationDef {
  pub name:        String,
  pub kind:        RelationKind,
  /// Entity kind on the other side.
  pub target:      String,
  /// The `Uuid` field holding the key; see [`RelationKind`] for which side
  /// owns it.
  pub foreign_key: String,
  /// A mandatory relation that resolves to nothing is a lookup error
  /// instead of an absent marker. Many-to-one only.
  pub mandatory:   bool,
}

impl RelationDef {
  pub fn many_to_one(name: &str, target: &str, foreign_key: &str) -> Self {
    Self {
      name:        name.to_owned(),
      kind:        RelationKind::ManyToOne,
      target:      target.to_owned(),
      foreign_key: foreign_key.to_owned(),
      mandatory:   false,
    }
  }

  pub fn one_to_many(name: &str, target: &str, foreign_key: &str) -> Self {
    Self {
      name:        name.to_owned(),
      kind:        RelationKind::OneToMany,
      target:      target.to_owned(),
      foreign_key: foreign_key.to_owned(),
      mandatory:   false,
    }
  }

  pub fn mandatory(mut self) -> Self {
    self.mandatory = true;
    self
  }
}

// ─── Quota ───────────────────────────────────────────────────────────────────

/// A per-actor creation limit over a rolling window, enforced inside the
/// same transaction as the insert it admits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuotaRule {
  pub max_per_actor: u32,
  pub window:        Duration,
}

impl QuotaRule {
  pub fn new(max_per_actor: u32, window: Duration) -> Self {
    Self { max_per_actor, window }
  }

  /// Limit over a rolling 24-hour window.
  pub fn per_day(max_per_actor: u32) -> Self {
    Self::new(max_per_actor, Duration::hours(24))
  }
}

// ─── Entity definition ───────────────────────────────────────────────────────

/// The full descriptor for one entity kind.
#[derive(Debug, Clone)]
pub struct EntityDef {
  pub kind:      String,
  pub fields:    Vec<FieldDef>,
  pub relations: Vec<RelationDef>,
  pub quota:     Option<QuotaRule>,
}

impl EntityDef {
  pub fn new(kind: &str) -> Self {
    Self { kind: kind.to_owned(), fields: Vec::new(), relations: Vec::new(), quota: None }
  }

  pub fn field(mut self, field: FieldDef) -> Self {
    self.fields.push(field);
    self
  }

  pub fn relation(mut self, relation: RelationDef) -> Self {
    self.relations.push(relation);
    self
  }

  pub fn quota(mut self, rule: QuotaRule) -> Self {
    self.quota = Some(rule);
    self
  }

  pub fn field_def(&self, name: &str) -> Option<&FieldDef> {
    self.fields.iter().find(|f| f.name == name)
  }

  pub fn relation_def(&self, name: &str) -> Option<&RelationDef> {
    self.relations.iter().find(|r| r.name == name)
  }
}

// ─── Registry ────────────────────────────────────────────────────────────────

/// Errors raised while building or amending a [`Registry`]. These are
/// configuration mistakes surfaced at startup, not request-path errors.
#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("invalid identifier {0:?}: expected [a-z][a-z0-9_]*")]
  InvalidIdentifier(String),

  #[error("duplicate entity kind {0:?}")]
  DuplicateKind(String),

  #[error("field {field:?} on {kind} shadows a reserved column")]
  ReservedField { kind: String, field: String },

  #[error("duplicate field {field:?} on {kind}")]
  DuplicateField { kind: String, field: String },

  #[error("duplicate relation {relation:?} on {kind}")]
  DuplicateRelation { kind: String, relation: String },

  #[error("relation {relation:?} on {kind} targets unknown kind {target:?}")]
  UnknownTarget { kind: String, relation: String, target: String },

  #[error(
    "relation {relation:?} on {kind}: foreign key {field:?} is not a uuid field of {owner}"
  )]
  BadForeignKey { kind: String, relation: String, field: String, owner: String },

  #[error("relation {relation:?} on {kind}: only many-to-one relations can be mandatory")]
  MandatoryOneToMany { kind: String, relation: String },

  #[error("unknown entity kind {0:?}")]
  UnknownKind(String),
}

/// The validated set of entity definitions the layer operates on.
#[derive(Debug, Clone)]
pub struct Registry {
  entities: BTreeMap<String, EntityDef>,
}

impl Registry {
  pub fn builder() -> RegistryBuilder { RegistryBuilder { entities: Vec::new() } }

  /// Look up a kind; unknown kinds are a request-path error.
  pub fn entity(&self, kind: &str) -> crate::Result<&EntityDef> {
    self
      .entities
      .get(kind)
      .ok_or_else(|| crate::Error::UnknownEntityKind(kind.to_owned()))
  }

  pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
    self.entities.values()
  }

  /// Replace the quota rule for `kind`; used by configuration overrides.
  pub fn set_quota(
    &mut self,
    kind: &str,
    quota: Option<QuotaRule>,
  ) -> Result<(), RegistryError> {
    match self.entities.get_mut(kind) {
      Some(def) => {
        def.quota = quota;
        Ok(())
      }
      None => Err(RegistryError::UnknownKind(kind.to_owned())),
    }
  }
}

#[derive(Debug)]
pub struct RegistryBuilder {
  entities: Vec<EntityDef>,
}

impl RegistryBuilder {
  pub fn entity(mut self, def: EntityDef) -> Self {
    self.entities.push(def);
    self
  }

  pub fn build(self) -> Result<Registry, RegistryError> {
    let mut entities: BTreeMap<String, EntityDef> = BTreeMap::new();

    for def in self.entities {
      if !is_identifier(&def.kind) {
        return Err(RegistryError::InvalidIdentifier(def.kind));
      }
      if entities.contains_key(&def.kind) {
        return Err(RegistryError::DuplicateKind(def.kind));
      }

      let mut seen = BTreeSet::new();
      for field in &def.fields {
        if !is_identifier(&field.name) {
          return Err(RegistryError::InvalidIdentifier(field.name.clone()));
        }
        if RESERVED_FIELDS.contains(&field.name.as_str()) {
          return Err(RegistryError::ReservedField {
            kind:  def.kind.clone(),
            field: field.name.clone(),
          });
        }
        if !seen.insert(field.name.clone()) {
          return Err(RegistryError::DuplicateField {
            kind:  def.kind.clone(),
            field: field.name.clone(),
          });
        }
      }

      entities.insert(def.kind.clone(), def);
    }

    // Relations can only be checked once every kind is known.
    for def in entities.values() {
      let mut seen = BTreeSet::new();
      for rel in &def.relations {
        if !is_identifier(&rel.name) {
          return Err(RegistryError::InvalidIdentifier(rel.name.clone()));
        }
        if !seen.insert(rel.name.clone()) {
          return Err(RegistryError::DuplicateRelation {
            kind:     def.kind.clone(),
            relation: rel.name.clone(),
          });
        }

        let Some(target) = entities.get(&rel.target) else {
          return Err(RegistryError::UnknownTarget {
            kind:     def.kind.clone(),
            relation: rel.name.clone(),
            target:   rel.target.clone(),
          });
        };

        let owner = match rel.kind {
          RelationKind::ManyToOne => def,
          RelationKind::OneToMany => target,
        };
        let fk_ok = owner
          .fields
          .iter()
          .any(|f| f.name == rel.foreign_key && f.ty == FieldType::Uuid);
        if !fk_ok {
          return Err(RegistryError::BadForeignKey {
            kind:     def.kind.clone(),
            relation: rel.name.clone(),
            field:    rel.foreign_key.clone(),
            owner:    owner.kind.clone(),
          });
        }

        if rel.mandatory && rel.kind == RelationKind::OneToMany {
          return Err(RegistryError::MandatoryOneToMany {
            kind:     def.kind.clone(),
            relation: rel.name.clone(),
          });
        }
      }
    }

    Ok(Registry { entities })
  }
}

fn is_identifier(s: &str) -> bool {
  let mut chars = s.chars();
  matches!(chars.next(), Some(c) if c.is_ascii_lowercase())
    && chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}
