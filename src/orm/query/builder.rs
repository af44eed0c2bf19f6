//! Fluent query builder
//!
//! ```rust,ignore
//! let fast_boeings = Aircraft::query(&backend)
//!     .filter_by("manufacturer", "Boeing")
//!     .filter_by("max_speed__gt", 500)
//!     .with_engines()
//!     .order_by(["-max_speed"])
//!     .limit(10)
//!     .all()?;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

use super::aggregation::Aggregation;
use super::filters::Filter;
use crate::orm::backend::{Backend, RecordMap};
use crate::orm::error::{OrmError, OrmResult};
use crate::orm::record::Record;

/// Prefix on an order-by field meaning descending
pub const DESCENDING_PREFIX: char = '-';

/// One order-by key
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub descending: bool,
}

impl OrderBy {
    pub fn asc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: false,
        }
    }

    pub fn desc(field: &str) -> Self {
        Self {
            field: field.to_string(),
            descending: true,
        }
    }

    /// Parse `"field"` (ascending) or `"-field"` (descending)
    pub fn parse(spec: &str) -> OrmResult<Self> {
        let (field, descending) = match spec.strip_prefix(DESCENDING_PREFIX) {
            Some(rest) => (rest, true),
            None => (spec, false),
        };
        if field.is_empty() {
            return Err(OrmError::Validation(format!(
                "order-by '{}' has an empty field name",
                spec
            )));
        }
        Ok(Self {
            field: field.to_string(),
            descending,
        })
    }
}

impl fmt::Display for OrderBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            write!(f, "{}{}", DESCENDING_PREFIX, self.field)
        } else {
            f.write_str(&self.field)
        }
    }
}

/// Everything a backend needs to run one query.
///
/// Filters are AND-combined in insertion order. Offset is applied before limit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryIntent {
    pub filters: Vec<Filter>,
    pub relations: Vec<String>,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl QueryIntent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intent with only filters, as used for relation lookups and counts
    pub fn filtered(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            ..Self::default()
        }
    }

    pub fn add_relation(&mut self, name: &str) {
        if !self.relations.iter().any(|r| r == name) {
            self.relations.push(name.to_string());
        }
    }
}

/// Accumulates query intent for one record type and runs it against a backend.
///
/// Chained calls never fail; a malformed lookup or order-by is remembered and
/// returned by the next terminal call without touching the backend. One builder
/// serves one logical query and is not meant to be shared between threads.
pub struct QueryBuilder<'a, R: Record> {
    backend: &'a dyn Backend,
    intent: QueryIntent,
    error: Option<String>,
    _record: PhantomData<R>,
}

impl<'a, R: Record> QueryBuilder<'a, R> {
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self {
            backend,
            intent: QueryIntent::new(),
            error: None,
            _record: PhantomData,
        }
    }

    /// Add one condition per `(lookup, value)` pair
    pub fn filter<I, K, V>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<Value>,
    {
        for (expression, value) in conditions {
            match Filter::lookup(expression.as_ref(), value) {
                Ok(filter) => self.intent.filters.push(filter),
                Err(err) => self.remember(err),
            }
        }
        self
    }

    /// Add a single `lookup = value` condition
    pub fn filter_by(self, expression: &str, value: impl Into<Value>) -> Self {
        self.filter([(expression, value.into())])
    }

    /// Add an already-built condition
    pub fn push_filter(mut self, filter: Filter) -> Self {
        self.intent.filters.push(filter);
        self
    }

    /// Eager-load relations by name
    pub fn with_relations<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for name in names {
            self.intent.add_relation(name.as_ref());
        }
        self
    }

    pub fn with_engines(self) -> Self {
        self.with_relations(["engines"])
    }

    pub fn with_materials(self) -> Self {
        self.with_relations(["materials"])
    }

    pub fn with_aircraft(self) -> Self {
        self.with_relations(["aircraft"])
    }

    pub fn with_flights(self) -> Self {
        self.with_relations(["flights"])
    }

    pub fn with_route(self) -> Self {
        self.with_relations(["route"])
    }

    /// Append order-by keys; `"-field"` sorts that key descending
    pub fn order_by<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for spec in fields {
            match OrderBy::parse(spec.as_ref()) {
                Ok(order) => self.intent.order_by.push(order),
                Err(err) => self.remember(err),
            }
        }
        self
    }

    /// Replace the result limit
    pub fn limit(mut self, limit: usize) -> Self {
        self.intent.limit = Some(limit);
        self
    }

    /// Replace the number of leading results to skip
    pub fn offset(mut self, offset: usize) -> Self {
        self.intent.offset = Some(offset);
        self
    }

    pub fn intent(&self) -> &QueryIntent {
        &self.intent
    }

    /// Run with the limit forced to 1 and return the first record, if any
    pub fn first(&self) -> OrmResult<Option<R>> {
        let mut intent = self.intent.clone();
        intent.limit = Some(1);
        let rows = self.execute(&intent)?;
        match rows.into_iter().next() {
            Some(row) => Ok(Some(R::from_map(row)?)),
            None => Ok(None),
        }
    }

    /// Run the accumulated intent as-is
    pub fn all(&self) -> OrmResult<Vec<R>> {
        self.execute(&self.intent)?
            .into_iter()
            .map(R::from_map)
            .collect()
    }

    /// Count matches using the filters only
    pub fn count(&self) -> OrmResult<u64> {
        self.check()?;
        self.backend.count_query(R::RECORD_TYPE, &self.intent.filters)
    }

    pub fn exists(&self) -> OrmResult<bool> {
        Ok(self.count()? > 0)
    }

    /// Grouping has no backend-neutral form; use a backend-specific API instead
    pub fn group_by<I, S>(self, fields: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let fields: Vec<String> = fields.into_iter().map(|f| f.as_ref().to_string()).collect();
        Err(OrmError::NotImplemented(format!(
            "group_by({}) requires a backend-specific implementation",
            fields.join(", ")
        )))
    }

    /// Aggregation has no backend-neutral form; use a backend-specific API instead
    pub fn aggregate(self, aggregation: Aggregation) -> OrmResult<Self> {
        Err(OrmError::NotImplemented(format!(
            "aggregate({}) requires a backend-specific implementation",
            aggregation
        )))
    }

    fn execute(&self, intent: &QueryIntent) -> OrmResult<Vec<RecordMap>> {
        self.check()?;
        tracing::trace!(
            record_type = R::RECORD_TYPE,
            backend = self.backend.name(),
            filters = intent.filters.len(),
            "running query"
        );
        self.backend.execute_query(R::RECORD_TYPE, intent)
    }

    fn check(&self) -> OrmResult<()> {
        match &self.error {
            Some(message) => Err(OrmError::Validation(message.clone())),
            None => Ok(()),
        }
    }

    fn remember(&mut self, err: OrmError) {
        if self.error.is_none() {
            self.error = Some(match err {
                OrmError::Validation(message) => message,
                other => other.to_string(),
            });
        }
    }
}
