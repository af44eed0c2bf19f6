//! Aggregation descriptors (avg, sum, min, max, count)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Field marker meaning "count rows" rather than a real field
pub const COUNT_ALL: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationKind {
    Avg,
    Sum,
    Min,
    Max,
    Count,
}

impl AggregationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationKind::Avg => "avg",
            AggregationKind::Sum => "sum",
            AggregationKind::Min => "min",
            AggregationKind::Max => "max",
            AggregationKind::Count => "count",
        }
    }
}

/// A reduction over one field. Whether the field is aggregable is up to the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Aggregation {
    #[serde(rename = "type")]
    kind: AggregationKind,
    field: String,
}

impl Aggregation {
    pub fn avg(field: &str) -> Self {
        Self::of(AggregationKind::Avg, field)
    }

    pub fn sum(field: &str) -> Self {
        Self::of(AggregationKind::Sum, field)
    }

    pub fn min(field: &str) -> Self {
        Self::of(AggregationKind::Min, field)
    }

    pub fn max(field: &str) -> Self {
        Self::of(AggregationKind::Max, field)
    }

    /// Count rows (`None`) or non-null values of a field
    pub fn count(field: Option<&str>) -> Self {
        Self::of(AggregationKind::Count, field.unwrap_or(COUNT_ALL))
    }

    fn of(kind: AggregationKind, field: &str) -> Self {
        Self {
            kind,
            field: field.to_string(),
        }
    }

    pub fn kind(&self) -> AggregationKind {
        self.kind
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn is_row_count(&self) -> bool {
        self.kind == AggregationKind::Count && self.field == COUNT_ALL
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.kind.as_str(), self.field)
    }
}
