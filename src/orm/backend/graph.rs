//! Graph Backend
//!
//! Labelled node store: every record is a node labelled with its record type,
//! and the relation registry supplies the edges. Nodes live in memory behind a
//! lock; a `file://` URI additionally persists a JSON snapshot after every
//! mutation.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use super::{storable_fields, validate_identifier, Backend, GraphNode, RecordMap, ID_FIELD};
use crate::orm::error::{BackendError, OrmError, OrmResult};
use crate::orm::query::{eval, Aggregation, Filter, QueryIntent};
use crate::orm::relations::{self, RelationDef, RelationKind, RelationRegistry};

const SNAPSHOT_VERSION: u32 = 1;

/// Where the node store is kept
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphLocation {
    Memory,
    File(PathBuf),
}

impl GraphLocation {
    /// Accepts `memory://` or `file://<path>`
    pub fn parse(uri: &str) -> OrmResult<Self> {
        if uri == "memory://" || uri == "memory" {
            return Ok(GraphLocation::Memory);
        }
        match uri.strip_prefix("file://") {
            Some("") | None => Err(OrmError::Config(format!(
                "unsupported graph URI '{}' (expected memory:// or file://<path>)",
                uri
            ))),
            Some(path) => Ok(GraphLocation::File(PathBuf::from(path))),
        }
    }
}

/// On-disk and in-memory shape of the node store
#[derive(Debug, Clone, Serialize, Deserialize)]
struct GraphStore {
    version: u32,
    next_id: i64,
    /// label -> node id -> properties
    nodes: BTreeMap<String, BTreeMap<i64, RecordMap>>,
}

impl Default for GraphStore {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            next_id: 1,
            nodes: BTreeMap::new(),
        }
    }
}

impl GraphStore {
    fn load(path: &Path) -> OrmResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .map_err(|e| BackendError::Connection(format!("{}: {}", path.display(), e)))?;
        let store: GraphStore = serde_json::from_str(&content).map_err(|e| {
            BackendError::Connection(format!("corrupt snapshot {}: {}", path.display(), e))
        })?;
        if store.version != SNAPSHOT_VERSION {
            return Err(BackendError::Connection(format!(
                "snapshot {} has unsupported version {}",
                path.display(),
                store.version
            ))
            .into());
        }
        Ok(store)
    }

    /// Write to a sibling temp file, then rename over the snapshot
    fn persist(&self, path: &Path) -> OrmResult<()> {
        let unavailable = |e: std::io::Error| BackendError::Unavailable(format!("{}: {}", path.display(), e));

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(unavailable)?;
            }
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, serde_json::to_vec_pretty(self)?).map_err(unavailable)?;
        fs::rename(&tmp, path).map_err(unavailable)?;
        Ok(())
    }

    fn node(&self, label: &str, id: i64) -> Option<RecordMap> {
        self.nodes
            .get(label)
            .and_then(|nodes| nodes.get(&id))
            .map(|props| with_id(props, id))
    }

    fn rows(&self, label: &str) -> Vec<RecordMap> {
        self.nodes
            .get(label)
            .map(|nodes| nodes.iter().map(|(id, props)| with_id(props, *id)).collect())
            .unwrap_or_default()
    }

    /// Nodes one hop away from `node` along `relation`
    fn neighbours(&self, relation: &RelationDef, node: &RecordMap) -> Vec<RecordMap> {
        match &relation.kind {
            RelationKind::BelongsTo { .. } | RelationKind::References { .. } => relation
                .target_ids(node)
                .into_iter()
                .filter_map(|id| self.node(&relation.target, id))
                .collect(),
            RelationKind::HasMany { foreign_key } => {
                let Some(id) = node.get(ID_FIELD).and_then(Value::as_i64) else {
                    return Vec::new();
                };
                self.rows(&relation.target)
                    .into_iter()
                    .filter(|row| row.get(foreign_key).and_then(Value::as_i64) == Some(id))
                    .collect()
            }
        }
    }
}

fn with_id(props: &RecordMap, id: i64) -> RecordMap {
    let mut row = props.clone();
    row.insert(ID_FIELD.to_string(), Value::from(id));
    row
}

pub struct GraphBackend {
    location: GraphLocation,
    credentials: (String, String),
    registry: RelationRegistry,
    store: RwLock<Option<GraphStore>>,
}

impl GraphBackend {
    pub fn new(uri: &str, credentials: (String, String)) -> OrmResult<Self> {
        Ok(Self::with_location(GraphLocation::parse(uri)?, credentials))
    }

    pub fn with_location(location: GraphLocation, credentials: (String, String)) -> Self {
        Self {
            location,
            credentials,
            registry: RelationRegistry::aerospace(),
            store: RwLock::new(None),
        }
    }

    /// In-memory store with throwaway credentials
    pub fn in_memory() -> Self {
        Self::with_location(GraphLocation::Memory, ("aerodata".to_string(), String::new()))
    }

    pub fn with_registry(mut self, registry: RelationRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn read<T>(&self, f: impl FnOnce(&GraphStore) -> OrmResult<T>) -> OrmResult<T> {
        let guard = self
            .store
            .read()
            .map_err(|_| BackendError::Unavailable("graph store lock poisoned".into()))?;
        match guard.as_ref() {
            Some(store) => f(store),
            None => Err(BackendError::not_connected(self.name()).into()),
        }
    }

    /// Apply a mutation and persist it. A failed write leaves the store as it was.
    fn write<T>(&self, f: impl FnOnce(&mut GraphStore) -> OrmResult<T>) -> OrmResult<T> {
        let mut guard = self
            .store
            .write()
            .map_err(|_| BackendError::Unavailable("graph store lock poisoned".into()))?;
        let store = guard
            .as_mut()
            .ok_or_else(|| BackendError::not_connected(self.name()))?;

        match &self.location {
            GraphLocation::Memory => f(&mut *store),
            GraphLocation::File(path) => {
                let before = store.clone();
                let result = f(&mut *store).and_then(|value| store.persist(path).map(|_| value));
                if result.is_err() {
                    *store = before;
                }
                result
            }
        }
    }

    /// Reduce the nodes of one label that match `filters`
    pub fn aggregate(
        &self,
        record_type: &str,
        filters: &[Filter],
        aggregation: &Aggregation,
    ) -> OrmResult<Value> {
        validate_identifier("record type", record_type)?;
        let result = self.read(|store| {
            let rows: Vec<RecordMap> = store
                .rows(record_type)
                .into_iter()
                .filter(|row| eval::matches_all(filters, row))
                .collect();
            Ok(eval::aggregate(aggregation, &rows))
        })?;
        tracing::debug!(record_type, aggregation = %aggregation, "aggregated");
        Ok(result)
    }
}

impl Backend for GraphBackend {
    fn name(&self) -> &'static str {
        "graph"
    }

    fn connect(&self) -> OrmResult<()> {
        if self.credentials.0.is_empty() {
            return Err(BackendError::Connection("graph backend requires a username".into()).into());
        }

        let mut guard = self
            .store
            .write()
            .map_err(|_| BackendError::Unavailable("graph store lock poisoned".into()))?;
        if guard.is_some() {
            return Ok(());
        }

        let store = match &self.location {
            GraphLocation::Memory => GraphStore::default(),
            GraphLocation::File(path) => GraphStore::load(path)?,
        };
        let node_count: usize = store.nodes.values().map(BTreeMap::len).sum();
        *guard = Some(store);

        tracing::info!(
            location = ?self.location,
            user = %self.credentials.0,
            nodes = node_count,
            "connected to graph store"
        );
        Ok(())
    }

    fn disconnect(&self) -> OrmResult<()> {
        let mut guard = self
            .store
            .write()
            .map_err(|_| BackendError::Unavailable("graph store lock poisoned".into()))?;
        if guard.take().is_some() {
            tracing::info!(location = ?self.location, "disconnected from graph store");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.store.read().map(|s| s.is_some()).unwrap_or(false)
    }

    fn execute_query(&self, record_type: &str, intent: &QueryIntent) -> OrmResult<Vec<RecordMap>> {
        validate_identifier("record type", record_type)?;
        let mut rows = self.read(|store| Ok(eval::execute(intent, store.rows(record_type))))?;

        // Hydration re-enters execute_query, so the read guard must be released first
        relations::hydrate(self, &self.registry, record_type, &mut rows, &intent.relations)?;

        tracing::debug!(
            record_type,
            filters = intent.filters.len(),
            relations = intent.relations.len(),
            rows = rows.len(),
            "executed query"
        );
        Ok(rows)
    }

    fn count_query(&self, record_type: &str, filters: &[Filter]) -> OrmResult<u64> {
        validate_identifier("record type", record_type)?;
        let count = self.read(|store| {
            Ok(store
                .nodes
                .get(record_type)
                .map(|nodes| {
                    nodes
                        .iter()
                        .filter(|(id, props)| eval::matches_all(filters, &with_id(props, **id)))
                        .count()
                })
                .unwrap_or(0) as u64)
        })?;
        tracing::debug!(record_type, filters = filters.len(), count, "counted");
        Ok(count)
    }

    fn get_by_id(&self, record_type: &str, id: i64) -> OrmResult<Option<RecordMap>> {
        validate_identifier("record type", record_type)?;
        self.read(|store| Ok(store.node(record_type, id)))
    }

    fn insert(&self, record_type: &str, data: &RecordMap) -> OrmResult<i64> {
        validate_identifier("record type", record_type)?;
        let props = storable_fields(&self.registry, record_type, data);
        let id = self.write(|store| {
            let id = store.next_id;
            store.next_id += 1;
            store
                .nodes
                .entry(record_type.to_string())
                .or_default()
                .insert(id, props);
            Ok(id)
        })?;
        tracing::debug!(record_type, id, "inserted");
        Ok(id)
    }

    fn update(&self, record_type: &str, id: i64, data: &RecordMap) -> OrmResult<()> {
        validate_identifier("record type", record_type)?;
        let props = storable_fields(&self.registry, record_type, data);
        self.write(|store| {
            match store.nodes.get_mut(record_type).and_then(|nodes| nodes.get_mut(&id)) {
                Some(node) => {
                    *node = props;
                    Ok(())
                }
                None => Err(BackendError::NotFoundOnWrite(format!("{} {}", record_type, id)).into()),
            }
        })?;
        tracing::debug!(record_type, id, "updated");
        Ok(())
    }

    fn delete(&self, record_type: &str, id: i64) -> OrmResult<()> {
        validate_identifier("record type", record_type)?;
        let removed = self.write(|store| {
            Ok(store
                .nodes
                .get_mut(record_type)
                .and_then(|nodes| nodes.remove(&id))
                .is_some())
        })?;
        tracing::debug!(record_type, id, removed, "deleted");
        Ok(())
    }

    /// Breadth-first walk along registered relations. Each node is reported
    /// once, at the depth it was first reached; the start node is excluded.
    /// An empty `relations` list follows every relation.
    fn traverse(
        &self,
        record_type: &str,
        id: i64,
        relations: &[String],
        max_depth: usize,
    ) -> OrmResult<Vec<GraphNode>> {
        validate_identifier("record type", record_type)?;
        let nodes = self.read(|store| {
            let Some(start) = store.node(record_type, id) else {
                return Ok(Vec::new());
            };

            let mut visited: HashSet<(String, i64)> = HashSet::new();
            visited.insert((record_type.to_string(), id));
            let mut queue = VecDeque::from([(record_type.to_string(), start, 0usize)]);
            let mut found = Vec::new();

            while let Some((label, node, depth)) = queue.pop_front() {
                if depth >= max_depth {
                    continue;
                }
                let edges = self
                    .registry
                    .for_record_type(&label)
                    .into_iter()
                    .filter(|r| relations.is_empty() || relations.contains(&r.name));

                for relation in edges {
                    for neighbour in store.neighbours(relation, &node) {
                        let Some(neighbour_id) = neighbour.get(ID_FIELD).and_then(Value::as_i64) else {
                            continue;
                        };
                        if !visited.insert((relation.target.clone(), neighbour_id)) {
                            continue;
                        }
                        found.push(GraphNode {
                            record_type: relation.target.clone(),
                            depth: depth + 1,
                            via: relation.name.clone(),
                            data: neighbour.clone(),
                        });
                        queue.push_back((relation.target.clone(), neighbour, depth + 1));
                    }
                }
            }
            Ok(found)
        })?;

        tracing::debug!(record_type, id, max_depth, reached = nodes.len(), "traversed");
        Ok(nodes)
    }
}
