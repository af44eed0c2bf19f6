//! Storage backend layer
//!
//! A trait-based abstraction over storage engines. The query builder and the
//! record helpers talk to a `&dyn Backend` only; a relational (SQLite) and a
//! graph (labelled node store) adapter ship with the crate.

pub mod graph;
pub mod sql;
pub mod sqlite;

pub use graph::{GraphBackend, GraphLocation};
pub use sqlite::{SqliteBackend, SqliteLocation};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;

use crate::orm::config::BackendConfig;
use crate::orm::error::{OrmError, OrmResult};
use crate::orm::query::{Filter, QueryIntent};
use crate::orm::relations::RelationRegistry;

/// Field-name to value view of a record, the interchange format with backends
pub type RecordMap = serde_json::Map<String, Value>;

/// Identity field present on every stored record
pub const ID_FIELD: &str = "id";

/// Operation set every storage adapter implements.
///
/// Every call blocks until it completes or fails. Adapters own their
/// connections and locking; nothing here is retried.
pub trait Backend: Send + Sync {
    /// Short adapter name for logs
    fn name(&self) -> &'static str;

    /// Open the underlying store. Calling it again is harmless.
    fn connect(&self) -> OrmResult<()>;

    /// Release the underlying store. A no-op if never connected.
    fn disconnect(&self) -> OrmResult<()>;

    fn is_connected(&self) -> bool;

    /// Rows matching every filter, ordered, offset then limited, with the
    /// requested relations hydrated. No match is an empty vector.
    fn execute_query(&self, record_type: &str, intent: &QueryIntent) -> OrmResult<Vec<RecordMap>>;

    /// Number of rows matching the filters
    fn count_query(&self, record_type: &str, filters: &[Filter]) -> OrmResult<u64>;

    fn get_by_id(&self, record_type: &str, id: i64) -> OrmResult<Option<RecordMap>>;

    /// Persist a new record and return its assigned identity
    fn insert(&self, record_type: &str, data: &RecordMap) -> OrmResult<i64>;

    /// Overwrite every stored field of an existing record
    fn update(&self, record_type: &str, id: i64, data: &RecordMap) -> OrmResult<()>;

    /// Remove a record. Unknown ids are ignored.
    fn delete(&self, record_type: &str, id: i64) -> OrmResult<()>;

    /// Walk relations outward from one record, up to `max_depth` hops
    fn traverse(
        &self,
        record_type: &str,
        id: i64,
        relations: &[String],
        max_depth: usize,
    ) -> OrmResult<Vec<GraphNode>> {
        let _ = (id, relations, max_depth);
        Err(OrmError::NotImplemented(format!(
            "graph traversal of '{}' is not supported by the {} backend",
            record_type,
            self.name()
        )))
    }
}

/// A record reached during a traversal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub record_type: String,
    pub depth: usize,
    /// Relation followed to reach this node
    pub via: String,
    pub data: RecordMap,
}

impl GraphNode {
    pub fn id(&self) -> Option<i64> {
        self.data.get(ID_FIELD).and_then(Value::as_i64)
    }
}

/// Construct the adapter described by `config`, unconnected.
///
/// Relative file locations are resolved against `base_dir`.
pub fn open_backend(
    config: &BackendConfig,
    base_dir: &Path,
    registry: RelationRegistry,
) -> OrmResult<Box<dyn Backend>> {
    let backend: Box<dyn Backend> = match config {
        BackendConfig::Sqlite { connection_string } => {
            let backend = match SqliteLocation::parse(connection_string)? {
                SqliteLocation::Memory => SqliteBackend::in_memory(),
                SqliteLocation::File(path) => SqliteBackend::open(&base_dir.join(path)),
            };
            Box::new(backend.with_registry(registry))
        }
        BackendConfig::Graph {
            uri,
            username,
            password,
        } => {
            let location = match GraphLocation::parse(uri)? {
                GraphLocation::File(path) => GraphLocation::File(base_dir.join(path)),
                memory => memory,
            };
            let credentials = (username.clone(), password.clone());
            Box::new(GraphBackend::with_location(location, credentials).with_registry(registry))
        }
    };
    Ok(backend)
}

/// Copy of `data` without the identity and registered relation fields
pub(crate) fn storable_fields(
    registry: &RelationRegistry,
    record_type: &str,
    data: &RecordMap,
) -> RecordMap {
    data.iter()
        .filter(|(key, _)| key.as_str() != ID_FIELD && !registry.is_relation(record_type, key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Accept only plain identifiers for record types and field names
pub(crate) fn validate_identifier(kind: &str, name: &str) -> OrmResult<()> {
    let mut chars = name.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(OrmError::Validation(format!("invalid {} name '{}'", kind, name)))
    }
}
