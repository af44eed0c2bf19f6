//! Filter conditions and the lookup-expression syntax
//!
//! A lookup expression is a field name with an optional operator suffix,
//! `max_speed__gt`. No suffix means equality.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::orm::error::{OrmError, OrmResult};

/// Separator between a field name and its operator suffix
pub const LOOKUP_DELIMITER: &str = "__";

/// Closed set of comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Equal
    Eq,
    /// Not equal
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// Substring for strings, membership for arrays
    Contains,
    /// Value is one of a list
    In,
    /// Value is none of a list
    NotIn,
    IsNull,
    IsNotNull,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 11] = [
        FilterOperator::Eq,
        FilterOperator::Ne,
        FilterOperator::Gt,
        FilterOperator::Gte,
        FilterOperator::Lt,
        FilterOperator::Lte,
        FilterOperator::Contains,
        FilterOperator::In,
        FilterOperator::NotIn,
        FilterOperator::IsNull,
        FilterOperator::IsNotNull,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::Contains => "contains",
            FilterOperator::In => "in",
            FilterOperator::NotIn => "not_in",
            FilterOperator::IsNull => "is_null",
            FilterOperator::IsNotNull => "is_not_null",
        }
    }

    /// Resolve an operator token, `None` if the token is not in the vocabulary
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|op| op.as_str() == token)
    }

    pub fn needs_value(&self) -> bool {
        !matches!(self, FilterOperator::IsNull | FilterOperator::IsNotNull)
    }

    pub fn is_ordering(&self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Split a lookup expression into `(field, operator)`.
///
/// The split happens on the last delimiter, and only when the trailing segment
/// is a known operator token; otherwise the whole expression is the field and
/// the operator is `eq`. A field literally named `x__eq` therefore cannot be
/// addressed by an equality lookup without spelling it `x__eq__eq`.
pub fn parse_lookup(expression: &str) -> OrmResult<(String, FilterOperator)> {
    let (field, operator) = match expression.rsplit_once(LOOKUP_DELIMITER) {
        Some((field, token)) => match FilterOperator::from_token(token) {
            Some(op) => (field, op),
            None => (expression, FilterOperator::Eq),
        },
        None => (expression, FilterOperator::Eq),
    };

    if field.is_empty() {
        return Err(OrmError::Validation(format!(
            "lookup '{}' has an empty field name",
            expression
        )));
    }

    Ok((field.to_string(), operator))
}

/// One `(field, operator, value)` condition. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawFilter")]
pub struct Filter {
    field: String,
    operator: FilterOperator,
    value: Value,
}

/// Wire shape of a filter before validation
#[derive(Deserialize)]
struct RawFilter {
    field: String,
    operator: FilterOperator,
    #[serde(default)]
    value: Value,
}

impl TryFrom<RawFilter> for Filter {
    type Error = OrmError;

    fn try_from(raw: RawFilter) -> OrmResult<Self> {
        Filter::new(raw.field, raw.operator, raw.value)
    }
}

impl Filter {
    /// Build a condition, checking that the value shape fits the operator.
    ///
    /// `is_null` / `is_not_null` discard the value.
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> OrmResult<Self> {
        let field = field.into();
        if field.is_empty() {
            return Err(OrmError::Validation("filter field must not be empty".into()));
        }

        // Only numbers and strings have an order
        if operator.is_ordering() && !(value.is_number() || value.is_string()) {
            return Err(OrmError::Validation(format!(
                "'{}' on field '{}' requires a number or string, got {}",
                operator, field, value
            )));
        }

        let value = match operator {
            FilterOperator::IsNull | FilterOperator::IsNotNull => Value::Null,
            FilterOperator::In | FilterOperator::NotIn => {
                if !value.is_array() {
                    return Err(OrmError::Validation(format!(
                        "'{}' on field '{}' requires a list value, got {}",
                        operator, field, value
                    )));
                }
                value
            }
            FilterOperator::Gt
            | FilterOperator::Gte
            | FilterOperator::Lt
            | FilterOperator::Lte
            | FilterOperator::Contains => {
                if value.is_null() || value.is_array() || value.is_object() {
                    return Err(OrmError::Validation(format!(
                        "'{}' on field '{}' requires a scalar value, got {}",
                        operator, field, value
                    )));
                }
                value
            }
            FilterOperator::Eq | FilterOperator::Ne => value,
        };

        Ok(Self {
            field,
            operator,
            value,
        })
    }

    /// Build a condition from a lookup expression such as `max_speed__gt`
    pub fn lookup(expression: &str, value: impl Into<Value>) -> OrmResult<Self> {
        let (field, operator) = parse_lookup(expression)?;
        Self::new(field, operator, value.into())
    }

    pub fn eq(field: &str, value: impl Into<Value>) -> OrmResult<Self> {
        Self::new(field, FilterOperator::Eq, value.into())
    }

    pub fn is_in<I, V>(field: &str, values: I) -> OrmResult<Self>
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let list = values.into_iter().map(Into::into).collect();
        Self::new(field, FilterOperator::In, Value::Array(list))
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn operator(&self) -> FilterOperator {
        self.operator
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    /// List elements for `in` / `not_in`, empty for every other operator
    pub fn values(&self) -> &[Value] {
        match &self.value {
            Value::Array(items) => items,
            _ => &[],
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.operator.needs_value() {
            write!(f, "{} {} {}", self.field, self.operator, self.value)
        } else {
            write!(f, "{} {}", self.field, self.operator)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_bare_field_is_eq() {
        let (field, op) = parse_lookup("manufacturer").unwrap();
        assert_eq!(field, "manufacturer");
        assert_eq!(op, FilterOperator::Eq);
    }

    #[test]
    fn test_every_operator_suffix() {
        for op in FilterOperator::ALL {
            let (field, parsed) = parse_lookup(&format!("max_speed__{}", op)).unwrap();
            assert_eq!(field, "max_speed");
            assert_eq!(parsed, op);
        }
    }

    #[test]
    fn test_unknown_suffix_keeps_whole_expression() {
        let (field, op) = parse_lookup("engine__type").unwrap();
        assert_eq!(field, "engine__type");
        assert_eq!(op, FilterOperator::Eq);
    }

    #[test]
    fn test_split_on_last_delimiter() {
        let (field, op) = parse_lookup("specs__thrust__gte").unwrap();
        assert_eq!(field, "specs__thrust");
        assert_eq!(op, FilterOperator::Gte);

        // A field that itself ends in an operator token is read as a lookup
        let (field, op) = parse_lookup("x__eq").unwrap();
        assert_eq!(field, "x");
        assert_eq!(op, FilterOperator::Eq);
    }

    #[test]
    fn test_empty_field_rejected() {
        assert!(matches!(parse_lookup(""), Err(OrmError::Validation(_))));
        assert!(matches!(parse_lookup("__gt"), Err(OrmError::Validation(_))));
    }

    #[test]
    fn test_in_requires_list() {
        let err = Filter::lookup("manufacturer__in", "Boeing").unwrap_err();
        assert!(matches!(err, OrmError::Validation(_)));

        let ok = Filter::lookup("manufacturer__not_in", json!(["Boeing", "Airbus"])).unwrap();
        assert_eq!(ok.values().len(), 2);
    }

    #[test]
    fn test_ordering_requires_scalar() {
        assert!(Filter::lookup("max_speed__gt", json!([1, 2])).is_err());
        assert!(Filter::lookup("max_speed__lte", Value::Null).is_err());
        assert!(Filter::lookup("max_speed__gt", 500).is_ok());
        assert!(Filter::lookup("model__lt", "B").is_ok());
    }

    #[test]
    fn test_ordering_rejects_booleans() {
        for op in ["gt", "gte", "lt", "lte"] {
            let err = Filter::lookup(&format!("max_speed__{}", op), true).unwrap_err();
            assert!(matches!(err, OrmError::Validation(_)));
        }
        assert!(Filter::lookup("certified", true).is_ok());
    }

    #[test]
    fn test_deserialize_validates() {
        let empty_field = serde_json::from_value::<Filter>(json!({
            "field": "", "operator": "eq", "value": 1
        }));
        assert!(empty_field.is_err());

        let scalar_in = serde_json::from_value::<Filter>(json!({
            "field": "id", "operator": "in", "value": 5
        }));
        assert!(scalar_in.is_err());

        let missing_field = serde_json::from_value::<Filter>(json!({"operator": "in", "value": [5]}));
        assert!(missing_field.is_err());

        // Null checks may omit the value
        let filter: Filter =
            serde_json::from_value(json!({"field": "range", "operator": "is_null"})).unwrap();
        assert_eq!(filter, Filter::new("range", FilterOperator::IsNull, Value::Null).unwrap());

        let original = Filter::lookup("max_speed__gte", 450).unwrap();
        let back: Filter = serde_json::from_value(serde_json::to_value(&original).unwrap()).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_null_checks_ignore_value() {
        let filter = Filter::lookup("cruise_speed__is_null", true).unwrap();
        assert_eq!(filter.value(), &Value::Null);
        assert_eq!(filter.to_string(), "cruise_speed is_null");
    }

    #[test]
    fn test_operator_serde_tokens() {
        assert_eq!(serde_json::to_value(FilterOperator::NotIn).unwrap(), json!("not_in"));
        let op: FilterOperator = serde_json::from_value(json!("is_not_null")).unwrap();
        assert_eq!(op, FilterOperator::IsNotNull);
    }
}
