//! SQL generation for the relational backend
//!
//! Each record type is one table of `(id, data)` where `data` holds the record
//! map as JSON. Filters and order keys become `json_extract` expressions with
//! every value and JSON path bound as a parameter.

use rusqlite::types::{ToSql, ToSqlOutput};
use serde_json::Value;

use super::{validate_identifier, ID_FIELD};
use crate::orm::error::OrmResult;
use crate::orm::query::{Aggregation, AggregationKind, Filter, FilterOperator, QueryIntent};

/// SQL value for parameterized queries
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl From<&Value> for SqlValue {
    fn from(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Integer(*b as i64),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Integer(i),
                None => SqlValue::Real(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => SqlValue::Text(s.clone()),
            // json_extract renders containers as minified JSON text
            other => SqlValue::Text(other.to_string()),
        }
    }
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            SqlValue::Null => rusqlite::types::Null.to_sql(),
            SqlValue::Integer(i) => i.to_sql(),
            SqlValue::Real(f) => f.to_sql(),
            SqlValue::Text(s) => s.to_sql(),
        }
    }
}

/// A statement and its positional parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl SqlQuery {
    pub fn param_refs(&self) -> Vec<&dyn ToSql> {
        self.params.iter().map(|p| p as &dyn ToSql).collect()
    }
}

/// Numbered parameter list; `push` returns the `?N` placeholder
#[derive(Debug, Default)]
struct Params {
    values: Vec<SqlValue>,
}

impl Params {
    fn push(&mut self, value: SqlValue) -> String {
        self.values.push(value);
        format!("?{}", self.values.len())
    }
}

/// Quote a table name
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table(record_type: &str) -> OrmResult<String> {
    validate_identifier("record type", record_type)?;
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            data TEXT NOT NULL
        )",
        quote_ident(record_type)
    ))
}

/// A field reference: the `id` column, or a JSON path into `data`
struct FieldExpr {
    expr: String,
    path: Option<String>,
}

fn field_expr(field: &str, params: &mut Params) -> OrmResult<FieldExpr> {
    validate_identifier("field", field)?;
    if field == ID_FIELD {
        return Ok(FieldExpr {
            expr: "id".to_string(),
            path: None,
        });
    }
    let path = params.push(SqlValue::Text(format!("$.\"{}\"", field)));
    Ok(FieldExpr {
        expr: format!("json_extract(data, {})", path),
        path: Some(path),
    })
}

/// `json_type` test that a stored value has the same JSON type as `value`
fn json_type_test(value: &Value) -> Option<&'static str> {
    match value {
        Value::Null => None,
        Value::Bool(true) => Some("= 'true'"),
        Value::Bool(false) => Some("= 'false'"),
        Value::Number(_) => Some("IN ('integer', 'real')"),
        Value::String(_) => Some("= 'text'"),
        Value::Array(_) => Some("= 'array'"),
        Value::Object(_) => Some("= 'object'"),
    }
}

/// True when the JSON value behind `type_expr`/`value_expr` equals any
/// candidate of the same JSON type. Booleans are matched on type alone since
/// SQLite extracts them as 0 and 1.
fn any_of_typed(
    type_expr: &str,
    value_expr: &str,
    candidates: &[&Value],
    params: &mut Params,
) -> String {
    let mut groups: Vec<(&'static str, Vec<String>)> = Vec::new();
    for value in candidates {
        let Some(test) = json_type_test(value) else {
            continue;
        };
        let index = match groups.iter().position(|(t, _)| *t == test) {
            Some(index) => index,
            None => {
                groups.push((test, Vec::new()));
                groups.len() - 1
            }
        };
        if !value.is_boolean() {
            groups[index].1.push(params.push((*value).into()));
        }
    }

    let parts: Vec<String> = groups
        .into_iter()
        .map(|(test, placeholders)| match placeholders.as_slice() {
            [] => format!("{} {}", type_expr, test),
            [single] => format!("({} {} AND {} = {})", type_expr, test, value_expr, single),
            _ => format!(
                "({} {} AND {} IN ({}))",
                type_expr,
                test,
                value_expr,
                placeholders.join(", ")
            ),
        })
        .collect();

    match parts.as_slice() {
        [] => "0".to_string(),
        [single] => single.clone(),
        _ => format!("({})", parts.join(" OR ")),
    }
}

/// Equality against any of `candidates`, nulls excluded
fn equals_any(field: &FieldExpr, candidates: &[&Value], params: &mut Params) -> String {
    match &field.path {
        Some(path) => {
            let type_expr = format!("json_type(data, {})", path);
            any_of_typed(&type_expr, &field.expr, candidates, params)
        }
        // The id column only ever holds integers
        None => {
            let placeholders: Vec<String> = candidates
                .iter()
                .filter(|v| v.is_number())
                .map(|v| params.push((*v).into()))
                .collect();
            match placeholders.as_slice() {
                [] => "0".to_string(),
                [single] => format!("{} = {}", field.expr, single),
                _ => format!("{} IN ({})", field.expr, placeholders.join(", ")),
            }
        }
    }
}

/// `gt/gte/lt/lte`, restricted to values of the operand's JSON type
fn ordering_clause(filter: &Filter, field: &FieldExpr, params: &mut Params) -> String {
    let value = filter.value();
    let symbol = match filter.operator() {
        FilterOperator::Gt => ">",
        FilterOperator::Gte => ">=",
        FilterOperator::Lt => "<",
        _ => "<=",
    };
    match (&field.path, json_type_test(value)) {
        (Some(path), Some(test)) => format!(
            "(json_type(data, {}) {} AND {} {} {})",
            path,
            test,
            field.expr,
            symbol,
            params.push(value.into())
        ),
        (None, _) if value.is_number() => {
            format!("{} {} {}", field.expr, symbol, params.push(value.into()))
        }
        _ => "0".to_string(),
    }
}

fn filter_clause(filter: &Filter, params: &mut Params) -> OrmResult<String> {
    // Every bound parameter must appear in the statement, so bail out before
    // the field path is pushed
    if filter.operator() == FilterOperator::In && filter.values().iter().all(Value::is_null) {
        validate_identifier("field", filter.field())?;
        return Ok("0".to_string());
    }

    let field = field_expr(filter.field(), params)?;
    let expr = &field.expr;
    let value = filter.value();

    let clause = match filter.operator() {
        FilterOperator::IsNull => format!("{} IS NULL", expr),
        FilterOperator::IsNotNull => format!("{} IS NOT NULL", expr),
        FilterOperator::Eq if value.is_null() => format!("{} IS NULL", expr),
        FilterOperator::Ne if value.is_null() => format!("{} IS NOT NULL", expr),
        FilterOperator::Eq => equals_any(&field, &[value], params),
        FilterOperator::Ne => format!(
            "({} IS NOT NULL AND NOT {})",
            expr,
            equals_any(&field, &[value], params)
        ),
        FilterOperator::Contains => match &field.path {
            Some(path) => {
                let member = any_of_typed("json_each.type", "json_each.value", &[value], params);
                let needle = params.push(SqlValue::Text(match value {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                }));
                format!(
                    "(CASE json_type(data, {path}) \
                     WHEN 'array' THEN EXISTS (SELECT 1 FROM json_each(data, {path}) WHERE {member}) \
                     WHEN 'text' THEN instr({expr}, {needle}) > 0 \
                     ELSE 0 END)",
                    path = path,
                    member = member,
                    expr = expr,
                    needle = needle
                )
            }
            None => "0".to_string(),
        },
        FilterOperator::In => {
            let candidates: Vec<&Value> = filter.values().iter().filter(|v| !v.is_null()).collect();
            equals_any(&field, &candidates, params)
        }
        FilterOperator::NotIn => {
            let candidates: Vec<&Value> = filter.values().iter().filter(|v| !v.is_null()).collect();
            if candidates.is_empty() {
                format!("{} IS NOT NULL", expr)
            } else {
                format!(
                    "({} IS NOT NULL AND NOT {})",
                    expr,
                    equals_any(&field, &candidates, params)
                )
            }
        }
        FilterOperator::Gt | FilterOperator::Gte | FilterOperator::Lt | FilterOperator::Lte => {
            ordering_clause(filter, &field, params)
        }
    };

    Ok(clause)
}

fn where_clause(filters: &[Filter], params: &mut Params) -> OrmResult<String> {
    if filters.is_empty() {
        return Ok(String::new());
    }
    let parts = filters
        .iter()
        .map(|f| filter_clause(f, params))
        .collect::<OrmResult<Vec<String>>>()?;
    Ok(format!(" WHERE {}", parts.join(" AND ")))
}

/// `SELECT id, data` honouring filters, order, offset and limit
pub fn select(record_type: &str, intent: &QueryIntent) -> OrmResult<SqlQuery> {
    validate_identifier("record type", record_type)?;
    let mut params = Params::default();
    let where_sql = where_clause(&intent.filters, &mut params)?;

    let mut order_parts = Vec::with_capacity(intent.order_by.len() + 1);
    for key in &intent.order_by {
        let field = field_expr(&key.field, &mut params)?;
        order_parts.push(format!(
            "{} {}",
            field.expr,
            if key.descending { "DESC" } else { "ASC" }
        ));
    }
    order_parts.push("id ASC".to_string());

    let mut sql = format!(
        "SELECT id, data FROM {}{} ORDER BY {}",
        quote_ident(record_type),
        where_sql,
        order_parts.join(", ")
    );

    if intent.limit.is_some() || intent.offset.is_some() {
        // Out-of-range values saturate; a negative LIMIT or OFFSET would mean "no bound"
        let limit = intent.limit.map(saturating_i64).unwrap_or(-1);
        let offset = saturating_i64(intent.offset.unwrap_or(0));
        let limit_param = params.push(SqlValue::Integer(limit));
        let offset_param = params.push(SqlValue::Integer(offset));
        sql.push_str(&format!(" LIMIT {} OFFSET {}", limit_param, offset_param));
    }

    Ok(SqlQuery {
        sql,
        params: params.values,
    })
}

fn saturating_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub fn count(record_type: &str, filters: &[Filter]) -> OrmResult<SqlQuery> {
    validate_identifier("record type", record_type)?;
    let mut params = Params::default();
    let where_sql = where_clause(filters, &mut params)?;
    Ok(SqlQuery {
        sql: format!("SELECT COUNT(*) FROM {}{}", quote_ident(record_type), where_sql),
        params: params.values,
    })
}

pub fn aggregate(
    record_type: &str,
    filters: &[Filter],
    aggregation: &Aggregation,
) -> OrmResult<SqlQuery> {
    validate_identifier("record type", record_type)?;
    let mut params = Params::default();

    let projection = if aggregation.is_row_count() {
        "COUNT(*)".to_string()
    } else {
        let field = field_expr(aggregation.field(), &mut params)?;
        let numeric = match &field.path {
            Some(path) => format!(
                "CASE WHEN json_type(data, {}) IN ('integer', 'real') THEN {} END",
                path, field.expr
            ),
            None => field.expr.clone(),
        };
        match aggregation.kind() {
            AggregationKind::Avg => format!("AVG({})", numeric),
            AggregationKind::Sum => format!("SUM({}) * 1.0", numeric),
            AggregationKind::Min => format!("MIN({})", field.expr),
            AggregationKind::Max => format!("MAX({})", field.expr),
            AggregationKind::Count => format!("COUNT({})", field.expr),
        }
    };

    let where_sql = where_clause(filters, &mut params)?;
    Ok(SqlQuery {
        sql: format!(
            "SELECT {} FROM {}{}",
            projection,
            quote_ident(record_type),
            where_sql
        ),
        params: params.values,
    })
}

pub fn insert(record_type: &str) -> OrmResult<String> {
    validate_identifier("record type", record_type)?;
    Ok(format!("INSERT INTO {} (data) VALUES (?1)", quote_ident(record_type)))
}

pub fn update(record_type: &str) -> OrmResult<String> {
    validate_identifier("record type", record_type)?;
    Ok(format!("UPDATE {} SET data = ?1 WHERE id = ?2", quote_ident(record_type)))
}

pub fn delete(record_type: &str) -> OrmResult<String> {
    validate_identifier("record type", record_type)?;
    Ok(format!("DELETE FROM {} WHERE id = ?1", quote_ident(record_type)))
}

pub fn get_by_id(record_type: &str) -> OrmResult<String> {
    validate_identifier("record type", record_type)?;
    Ok(format!("SELECT id, data FROM {} WHERE id = ?1", quote_ident(record_type)))
}
