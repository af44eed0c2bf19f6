//! SQLite Backend
//!
//! Relational adapter using rusqlite + r2d2 connection pooling. Every record
//! type gets its own `(id, data)` table, created the first time it is touched.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};
use std::time::Instant;

use super::sql::{self, SqlQuery};
use super::{storable_fields, Backend, RecordMap, ID_FIELD};
use crate::orm::error::{BackendError, OrmError, OrmResult};
use crate::orm::query::{Aggregation, Filter, QueryIntent};
use crate::orm::relations::{self, RelationRegistry};

type DbPool = Pool<SqliteConnectionManager>;
type DbConn = PooledConnection<SqliteConnectionManager>;

const POOL_SIZE: u32 = 10;

/// Where the database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqliteLocation {
    Memory,
    File(PathBuf),
}

impl SqliteLocation {
    /// Accepts `sqlite://<path>`, `sqlite:<path>`, a bare path, or `:memory:`
    pub fn parse(connection_string: &str) -> OrmResult<Self> {
        let rest = connection_string
            .strip_prefix("sqlite://")
            .or_else(|| connection_string.strip_prefix("sqlite:"))
            .unwrap_or(connection_string);

        match rest {
            "" => Err(OrmError::Config(format!(
                "empty SQLite path in '{}'",
                connection_string
            ))),
            ":memory:" | "memory:" => Ok(SqliteLocation::Memory),
            path => Ok(SqliteLocation::File(PathBuf::from(path))),
        }
    }
}

pub struct SqliteBackend {
    location: SqliteLocation,
    registry: RelationRegistry,
    pool: RwLock<Option<DbPool>>,
    /// Tables already created on the current pool
    tables: Mutex<HashSet<String>>,
}

impl SqliteBackend {
    pub fn new(connection_string: &str) -> OrmResult<Self> {
        Ok(Self::with_location(SqliteLocation::parse(connection_string)?))
    }

    pub fn open(db_path: &Path) -> Self {
        Self::with_location(SqliteLocation::File(db_path.to_path_buf()))
    }

    pub fn in_memory() -> Self {
        Self::with_location(SqliteLocation::Memory)
    }

    fn with_location(location: SqliteLocation) -> Self {
        Self {
            location,
            registry: RelationRegistry::aerospace(),
            pool: RwLock::new(None),
            tables: Mutex::new(HashSet::new()),
        }
    }

    /// Replace the relation registry used for eager loading
    pub fn with_registry(mut self, registry: RelationRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn build_pool(&self) -> OrmResult<DbPool> {
        let (manager, max_size) = match &self.location {
            // Every pooled connection to ":memory:" would be a separate database
            SqliteLocation::Memory => (SqliteConnectionManager::memory(), 1),
            SqliteLocation::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)
                            .map_err(|e| BackendError::Connection(e.to_string()))?;
                    }
                }
                (SqliteConnectionManager::file(path), POOL_SIZE)
            }
        };

        let manager = manager.with_init(|conn| {
            conn.execute_batch("PRAGMA foreign_keys=ON; PRAGMA busy_timeout=5000;")
        });

        let mut builder = Pool::builder().max_size(max_size);
        if self.location == SqliteLocation::Memory {
            // Recycling the only connection would drop the database with it
            builder = builder.max_lifetime(None).idle_timeout(None);
        }
        let pool = builder.build(manager)?;

        if let SqliteLocation::File(_) = self.location {
            let conn = pool.get()?;
            let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;
        }

        Ok(pool)
    }

    fn get_conn(&self) -> OrmResult<DbConn> {
        let guard = self
            .pool
            .read()
            .map_err(|_| BackendError::Unavailable("connection pool lock poisoned".into()))?;
        match guard.as_ref() {
            Some(pool) => Ok(pool.get()?),
            None => Err(BackendError::not_connected(self.name()).into()),
        }
    }

    fn ensure_table(&self, conn: &DbConn, record_type: &str) -> OrmResult<()> {
        let mut tables = self
            .tables
            .lock()
            .map_err(|_| BackendError::Unavailable("table cache lock poisoned".into()))?;
        if tables.contains(record_type) {
            return Ok(());
        }
        conn.execute(&sql::create_table(record_type)?, [])?;
        tables.insert(record_type.to_string());
        Ok(())
    }

    /// Turn an `(id, data)` row back into a record map
    fn decode_row(id: i64, data: &str) -> OrmResult<RecordMap> {
        let mut map: RecordMap = serde_json::from_str(data)?;
        map.insert(ID_FIELD.to_string(), Value::from(id));
        Ok(map)
    }

    fn run_select(&self, conn: &DbConn, query: &SqlQuery) -> OrmResult<Vec<RecordMap>> {
        let mut stmt = conn.prepare(&query.sql)?;
        let rows = stmt
            .query_map(query.param_refs().as_slice(), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.iter()
            .map(|(id, data)| Self::decode_row(*id, data))
            .collect()
    }

    /// Reduce matching rows with SQL aggregate functions
    pub fn aggregate(
        &self,
        record_type: &str,
        filters: &[Filter],
        aggregation: &Aggregation,
    ) -> OrmResult<Value> {
        let conn = self.get_conn()?;
        self.ensure_table(&conn, record_type)?;

        let query = sql::aggregate(record_type, filters, aggregation)?;
        let value: rusqlite::types::Value =
            conn.query_row(&query.sql, query.param_refs().as_slice(), |row| row.get(0))?;

        tracing::debug!(record_type, aggregation = %aggregation, "aggregated");

        Ok(match value {
            rusqlite::types::Value::Null => Value::Null,
            rusqlite::types::Value::Integer(i) => Value::from(i),
            rusqlite::types::Value::Real(f) => serde_json::Number::from_f64(f)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            rusqlite::types::Value::Text(t) => Value::String(t),
            rusqlite::types::Value::Blob(b) => Value::String(format!("BLOB({} bytes)", b.len())),
        })
    }
}

impl Backend for SqliteBackend {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn connect(&self) -> OrmResult<()> {
        let mut guard = self
            .pool
            .write()
            .map_err(|_| BackendError::Unavailable("connection pool lock poisoned".into()))?;
        if guard.is_some() {
            return Ok(());
        }
        *guard = Some(self.build_pool()?);
        tracing::info!(location = ?self.location, "connected to SQLite");
        Ok(())
    }

    fn disconnect(&self) -> OrmResult<()> {
        let mut guard = self
            .pool
            .write()
            .map_err(|_| BackendError::Unavailable("connection pool lock poisoned".into()))?;
        if guard.take().is_some() {
            if let Ok(mut tables) = self.tables.lock() {
                tables.clear();
            }
            tracing::info!(location = ?self.location, "disconnected from SQLite");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.pool.read().map(|p| p.is_some()).unwrap_or(false)
    }

    fn execute_query(&self, record_type: &str, intent: &QueryIntent) -> OrmResult<Vec<RecordMap>> {
        let start = Instant::now();
        let mut rows = {
            let conn = self.get_conn()?;
            self.ensure_table(&conn, record_type)?;
            let query = sql::select(record_type, intent)?;
            self.run_select(&conn, &query)?
        };

        // The connection goes back to the pool before relation queries borrow one
        relations::hydrate(self, &self.registry, record_type, &mut rows, &intent.relations)?;

        tracing::debug!(
            record_type,
            filters = intent.filters.len(),
            relations = intent.relations.len(),
            rows = rows.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "executed query"
        );
        Ok(rows)
    }

    fn count_query(&self, record_type: &str, filters: &[Filter]) -> OrmResult<u64> {
        let conn = self.get_conn()?;
        self.ensure_table(&conn, record_type)?;
        let query = sql::count(record_type, filters)?;
        let count: i64 = conn.query_row(&query.sql, query.param_refs().as_slice(), |row| row.get(0))?;
        tracing::debug!(record_type, filters = filters.len(), count, "counted");
        Ok(count as u64)
    }

    fn get_by_id(&self, record_type: &str, id: i64) -> OrmResult<Option<RecordMap>> {
        let conn = self.get_conn()?;
        self.ensure_table(&conn, record_type)?;
        let row = conn
            .query_row(&sql::get_by_id(record_type)?, [id], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
            })
            .optional()?;
        match row {
            Some((id, data)) => Ok(Some(Self::decode_row(id, &data)?)),
            None => Ok(None),
        }
    }

    fn insert(&self, record_type: &str, data: &RecordMap) -> OrmResult<i64> {
        let conn = self.get_conn()?;
        self.ensure_table(&conn, record_type)?;
        let payload = serde_json::to_string(&storable_fields(&self.registry, record_type, data))?;
        conn.execute(&sql::insert(record_type)?, params![payload])?;
        let id = conn.last_insert_rowid();
        tracing::debug!(record_type, id, "inserted");
        Ok(id)
    }

    fn update(&self, record_type: &str, id: i64, data: &RecordMap) -> OrmResult<()> {
        let conn = self.get_conn()?;
        self.ensure_table(&conn, record_type)?;
        let payload = serde_json::to_string(&storable_fields(&self.registry, record_type, data))?;
        let affected = conn.execute(&sql::update(record_type)?, params![payload, id])?;
        if affected == 0 {
            return Err(BackendError::NotFoundOnWrite(format!("{} {}", record_type, id)).into());
        }
        tracing::debug!(record_type, id, "updated");
        Ok(())
    }

    fn delete(&self, record_type: &str, id: i64) -> OrmResult<()> {
        let conn = self.get_conn()?;
        self.ensure_table(&conn, record_type)?;
        let affected = conn.execute(&sql::delete(record_type)?, [id])?;
        tracing::debug!(record_type, id, affected, "deleted");
        Ok(())
    }
}
