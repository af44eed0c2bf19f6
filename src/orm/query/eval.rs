//! In-process evaluation of query intent over JSON rows
//!
//! Used by backends that keep records as maps rather than translating the
//! intent into another query language.

use serde_json::Value;
use std::borrow::Cow;
use std::cmp::Ordering;

use super::aggregation::{Aggregation, AggregationKind};
use super::builder::{OrderBy, QueryIntent};
use super::filters::{Filter, FilterOperator};
use crate::orm::backend::RecordMap;

/// Look up a field, treating `null` the same as a missing key
fn field_value<'a>(row: &'a RecordMap, field: &str) -> Option<&'a Value> {
    match row.get(field) {
        Some(Value::Null) | None => None,
        Some(value) => Some(value),
    }
}

/// Check a single condition against a row
pub fn matches(filter: &Filter, row: &RecordMap) -> bool {
    let actual = field_value(row, filter.field());
    let expected = filter.value();

    match (filter.operator(), actual) {
        (FilterOperator::IsNull, value) => value.is_none(),
        (FilterOperator::IsNotNull, value) => value.is_some(),
        (FilterOperator::Eq, None) => expected.is_null(),
        (FilterOperator::Ne, None) => false,
        (FilterOperator::Ne, Some(_)) if expected.is_null() => true,
        (_, None) => false,
        (FilterOperator::Eq, Some(actual)) => values_equal(actual, expected),
        (FilterOperator::Ne, Some(actual)) => !values_equal(actual, expected),
        (FilterOperator::Gt, Some(actual)) => {
            compare_same_type(actual, expected) == Some(Ordering::Greater)
        }
        (FilterOperator::Gte, Some(actual)) => matches!(
            compare_same_type(actual, expected),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        (FilterOperator::Lt, Some(actual)) => {
            compare_same_type(actual, expected) == Some(Ordering::Less)
        }
        (FilterOperator::Lte, Some(actual)) => matches!(
            compare_same_type(actual, expected),
            Some(Ordering::Less | Ordering::Equal)
        ),
        (FilterOperator::Contains, Some(Value::String(haystack))) => match expected {
            Value::String(needle) => haystack.contains(needle.as_str()),
            other => haystack.contains(&other.to_string()),
        },
        (FilterOperator::Contains, Some(Value::Array(items))) => {
            items.iter().any(|item| values_equal(item, expected))
        }
        (FilterOperator::Contains, Some(_)) => false,
        (FilterOperator::In, Some(actual)) => {
            filter.values().iter().any(|v| values_equal(actual, v))
        }
        (FilterOperator::NotIn, Some(actual)) => {
            !filter.values().iter().any(|v| values_equal(actual, v))
        }
    }
}

/// AND of every filter
pub fn matches_all(filters: &[Filter], row: &RecordMap) -> bool {
    filters.iter().all(|f| matches(f, row))
}

/// Numbers compare by value so `500` equals `500.0`
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(x), Some(y)) => x == y,
            _ => x == y,
        },
        _ => a == b,
    }
}

fn compare_same_type(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Bool(_)) | Some(Value::Number(_)) => 1,
        Some(Value::String(_)) | Some(Value::Array(_)) | Some(Value::Object(_)) => 2,
    }
}

/// Sort key for text-ranked values; containers sort as their JSON text
fn sort_text(value: &Value) -> Cow<'_, str> {
    match value {
        Value::String(s) => Cow::Borrowed(s.as_str()),
        other => Cow::Owned(other.to_string()),
    }
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

/// Total order used for sorting: nulls, then numbers (booleans as 0 and 1),
/// then text. Arrays and objects sort as their JSON text among strings, which
/// is how SQLite orders `json_extract` results.
pub fn compare_for_sort(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    let rank = type_rank(a).cmp(&type_rank(b));
    if rank != Ordering::Equal {
        return rank;
    }
    match (a, b) {
        (Some(x), Some(y)) => match (numeric(x), numeric(y)) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
            _ => sort_text(x).cmp(&sort_text(y)),
        },
        _ => Ordering::Equal,
    }
}

/// Compare two rows by the order-by keys, left to right, then by `id`
pub fn compare_rows(order_by: &[OrderBy], a: &RecordMap, b: &RecordMap) -> Ordering {
    for key in order_by {
        let ordering = compare_for_sort(field_value(a, &key.field), field_value(b, &key.field));
        let ordering = if key.descending {
            ordering.reverse()
        } else {
            ordering
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    compare_for_sort(a.get("id"), b.get("id"))
}

/// Filter, sort, skip and take. Relations are left to the caller.
pub fn execute(intent: &QueryIntent, rows: impl IntoIterator<Item = RecordMap>) -> Vec<RecordMap> {
    let mut results: Vec<RecordMap> = rows
        .into_iter()
        .filter(|row| matches_all(&intent.filters, row))
        .collect();

    results.sort_by(|a, b| compare_rows(&intent.order_by, a, b));

    let results = results.into_iter().skip(intent.offset.unwrap_or(0));
    match intent.limit {
        Some(n) => results.take(n).collect(),
        None => results.collect(),
    }
}

/// Reduce already-filtered rows.
///
/// `avg`/`sum` consider numeric values only, `min`/`max` use the sort order,
/// and `count(field)` counts non-null values. Empty inputs give `null`
/// except for counts.
pub fn aggregate<'a>(aggregation: &Aggregation, rows: impl IntoIterator<Item = &'a RecordMap>) -> Value {
    let rows: Vec<&RecordMap> = rows.into_iter().collect();

    if aggregation.is_row_count() {
        return Value::from(rows.len() as u64);
    }

    let values: Vec<&Value> = rows
        .iter()
        .filter_map(|row| field_value(row, aggregation.field()))
        .collect();

    match aggregation.kind() {
        AggregationKind::Count => Value::from(values.len() as u64),
        AggregationKind::Sum | AggregationKind::Avg => {
            let numbers: Vec<f64> = values.iter().filter_map(|v| v.as_f64()).collect();
            if numbers.is_empty() {
                return Value::Null;
            }
            let sum: f64 = numbers.iter().sum();
            let result = if aggregation.kind() == AggregationKind::Avg {
                sum / numbers.len() as f64
            } else {
                sum
            };
            serde_json::Number::from_f64(result)
                .map(Value::Number)
                .unwrap_or(Value::Null)
        }
        AggregationKind::Min => values
            .into_iter()
            .min_by(|a, b| compare_for_sort(Some(*a), Some(*b)))
            .cloned()
            .unwrap_or(Value::Null),
        AggregationKind::Max => values
            .into_iter()
            .max_by(|a, b| compare_for_sort(Some(*a), Some(*b)))
            .cloned()
            .unwrap_or(Value::Null),
    }
}
