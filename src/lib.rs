//! AeroData - typed aerospace records over swappable storage backends
//!
//! ```rust,ignore
//! use aerodata::{Aircraft, Backend, Record, SqliteBackend};
//!
//! let backend = SqliteBackend::in_memory();
//! backend.connect()?;
//!
//! let mut aircraft = Aircraft::new("737-800", "Boeing", 544.0);
//! aircraft.save(&backend)?;
//!
//! let fast = Aircraft::query(&backend)
//!     .filter_by("max_speed__gt", 500)
//!     .order_by(["-max_speed"])
//!     .all()?;
//! ```

pub mod orm;

pub use orm::backend::{Backend, GraphBackend, GraphNode, RecordMap, SqliteBackend};
pub use orm::config::{BackendConfig, Config};
pub use orm::error::{BackendError, BackendErrorKind, OrmError, OrmResult};
pub use orm::models::{Aircraft, Engine, FlightData, Material};
pub use orm::query::{Aggregation, AggregationKind, Filter, FilterOperator, OrderBy, QueryBuilder, QueryIntent};
pub use orm::record::{Record, RecordMeta};
pub use orm::relations::{RelationDef, RelationKind, RelationRegistry};
