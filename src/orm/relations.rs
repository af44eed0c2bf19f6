//! Relation registry and eager loading
//!
//! Relations are declared once, by record type and name, when the schema is
//! set up. Backends consult the registry to keep relation fields out of
//! storage and to hydrate them when a query asks for them.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};

use crate::orm::backend::{Backend, RecordMap, ID_FIELD};
use crate::orm::error::OrmResult;
use crate::orm::query::{Filter, QueryIntent};

/// How the source record points at its targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RelationKind {
    /// Source holds the target id in `local_key` (many-to-one)
    BelongsTo { local_key: String },
    /// Targets hold the source id in `foreign_key` (one-to-many)
    HasMany { foreign_key: String },
    /// Source holds a list of target ids in `local_key` (many-to-many)
    References { local_key: String },
}

/// A named relation from one record type to another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub source: String,
    pub name: String,
    pub target: String,
    #[serde(flatten)]
    pub kind: RelationKind,
}

impl RelationDef {
    pub fn belongs_to(source: &str, name: &str, target: &str, local_key: &str) -> Self {
        Self::new(source, name, target, RelationKind::BelongsTo {
            local_key: local_key.to_string(),
        })
    }

    pub fn has_many(source: &str, name: &str, target: &str, foreign_key: &str) -> Self {
        Self::new(source, name, target, RelationKind::HasMany {
            foreign_key: foreign_key.to_string(),
        })
    }

    pub fn references(source: &str, name: &str, target: &str, local_key: &str) -> Self {
        Self::new(source, name, target, RelationKind::References {
            local_key: local_key.to_string(),
        })
    }

    fn new(source: &str, name: &str, target: &str, kind: RelationKind) -> Self {
        Self {
            source: source.to_string(),
            name: name.to_string(),
            target: target.to_string(),
            kind,
        }
    }

    /// Ids of the targets this row points at directly (not for `HasMany`)
    pub fn target_ids(&self, row: &RecordMap) -> Vec<i64> {
        match &self.kind {
            RelationKind::BelongsTo { local_key } => {
                row.get(local_key).and_then(Value::as_i64).into_iter().collect()
            }
            RelationKind::References { local_key } => match row.get(local_key) {
                Some(Value::Array(items)) => items.iter().filter_map(Value::as_i64).collect(),
                _ => Vec::new(),
            },
            RelationKind::HasMany { .. } => Vec::new(),
        }
    }
}

/// All relations known to a backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationRegistry {
    relations: Vec<RelationDef>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Relations between the bundled aerospace models
    pub fn aerospace() -> Self {
        Self::new()
            .with(RelationDef::references("aircraft", "engines", "engine", "engine_ids"))
            .with(RelationDef::references("aircraft", "materials", "material", "material_ids"))
            .with(RelationDef::has_many("aircraft", "flights", "flight_data", "aircraft_id"))
            .with(RelationDef::references("engine", "materials", "material", "material_ids"))
            .with(RelationDef::belongs_to("flight_data", "aircraft", "aircraft", "aircraft_id"))
    }

    /// Add a relation, replacing any existing one with the same source and name
    pub fn with(mut self, relation: RelationDef) -> Self {
        self.register(relation);
        self
    }

    pub fn register(&mut self, relation: RelationDef) {
        self.relations
            .retain(|r| !(r.source == relation.source && r.name == relation.name));
        self.relations.push(relation);
    }

    pub fn find(&self, record_type: &str, name: &str) -> Option<&RelationDef> {
        self.relations
            .iter()
            .find(|r| r.source == record_type && r.name == name)
    }

    pub fn for_record_type(&self, record_type: &str) -> Vec<&RelationDef> {
        self.relations
            .iter()
            .filter(|r| r.source == record_type)
            .collect()
    }

    pub fn is_relation(&self, record_type: &str, name: &str) -> bool {
        self.find(record_type, name).is_some()
    }

    pub fn len(&self) -> usize {
        self.relations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relations.is_empty()
    }
}

/// Distinct ids in first-seen order
fn dedup(ids: impl IntoIterator<Item = i64>) -> Vec<i64> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

fn fetch_by(
    backend: &dyn Backend,
    target: &str,
    field: &str,
    ids: &[i64],
) -> OrmResult<Vec<RecordMap>> {
    let filter = Filter::is_in(field, ids.iter().copied())?;
    backend.execute_query(target, &QueryIntent::filtered(vec![filter]))
}

fn index_by(rows: Vec<RecordMap>, field: &str) -> HashMap<i64, Vec<RecordMap>> {
    let mut index: HashMap<i64, Vec<RecordMap>> = HashMap::new();
    for row in rows {
        if let Some(key) = row.get(field).and_then(Value::as_i64) {
            index.entry(key).or_default().push(row);
        }
    }
    index
}

/// Populate the requested relations on `rows`, one backend query per relation.
///
/// Names not registered for `record_type` are skipped with a warning.
pub fn hydrate(
    backend: &dyn Backend,
    registry: &RelationRegistry,
    record_type: &str,
    rows: &mut [RecordMap],
    relations: &[String],
) -> OrmResult<()> {
    if rows.is_empty() {
        return Ok(());
    }

    for name in relations {
        let Some(relation) = registry.find(record_type, name) else {
            tracing::warn!(record_type, relation = %name, "skipping unregistered relation");
            continue;
        };

        match &relation.kind {
            RelationKind::BelongsTo { .. } => {
                let ids = dedup(rows.iter().flat_map(|row| relation.target_ids(row)));
                let index = if ids.is_empty() {
                    HashMap::new()
                } else {
                    index_by(fetch_by(backend, &relation.target, ID_FIELD, &ids)?, ID_FIELD)
                };
                for row in rows.iter_mut() {
                    let related = relation
                        .target_ids(row)
                        .first()
                        .and_then(|id| index.get(id))
                        .and_then(|found| found.first())
                        .map(|target| Value::Object(target.clone()))
                        .unwrap_or(Value::Null);
                    row.insert(name.clone(), related);
                }
            }
            RelationKind::References { .. } => {
                let ids = dedup(rows.iter().flat_map(|row| relation.target_ids(row)));
                let index = if ids.is_empty() {
                    HashMap::new()
                } else {
                    index_by(fetch_by(backend, &relation.target, ID_FIELD, &ids)?, ID_FIELD)
                };
                for row in rows.iter_mut() {
                    let related: Vec<Value> = relation
                        .target_ids(row)
                        .iter()
                        .filter_map(|id| index.get(id).and_then(|found| found.first()))
                        .map(|target| Value::Object(target.clone()))
                        .collect();
                    row.insert(name.clone(), Value::Array(related));
                }
            }
            RelationKind::HasMany { foreign_key } => {
                let ids = dedup(rows.iter().filter_map(|row| row.get(ID_FIELD).and_then(Value::as_i64)));
                let mut index = if ids.is_empty() {
                    HashMap::new()
                } else {
                    index_by(fetch_by(backend, &relation.target, foreign_key, &ids)?, foreign_key)
                };
                for row in rows.iter_mut() {
                    let related = row
                        .get(ID_FIELD)
                        .and_then(Value::as_i64)
                        .and_then(|id| index.remove(&id))
                        .unwrap_or_default()
                        .into_iter()
                        .map(Value::Object)
                        .collect();
                    row.insert(name.clone(), Value::Array(related));
                }
            }
        }
    }

    Ok(())
}
