//! Query building utilities

pub mod aggregation;
pub mod builder;
pub mod eval;
pub mod filters;

pub use aggregation::{Aggregation, AggregationKind};
pub use builder::{OrderBy, QueryBuilder, QueryIntent};
pub use filters::{parse_lookup, Filter, FilterOperator};
