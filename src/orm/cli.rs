//! AeroData CLI Module
//! Command-line interface over the configured backend

pub mod formatter;

use clap::{Parser, Subcommand};
use serde_json::Value;
use std::path::PathBuf;

use crate::orm::backend::{Backend, GraphNode, RecordMap};
use crate::orm::error::{OrmError, OrmResult};
use crate::orm::models::{Aircraft, Engine, FlightData, Material};
use crate::orm::record::Record;

#[derive(Parser, Debug)]
#[command(name = "aerodata")]
#[command(author = "AeroData Team")]
#[command(version)]
#[command(about = "Query and edit aerospace records over SQLite or graph storage", long_about = None)]
pub struct Cli {
    /// Project directory (defaults to current directory)
    #[arg(short, long, global = true)]
    pub project: Option<PathBuf>,

    /// Output format (json for scripting)
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Log filter, overriding the project config (e.g. "aerodata=debug")
    #[arg(long, global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BackendKind {
    Sqlite,
    Graph,
}

/// Record types the CLI knows how to hydrate
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum RecordKind {
    Aircraft,
    Engine,
    Material,
    #[value(name = "flight_data", alias = "flight-data")]
    FlightData,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Aircraft => Aircraft::RECORD_TYPE,
            RecordKind::Engine => Engine::RECORD_TYPE,
            RecordKind::Material => Material::RECORD_TYPE,
            RecordKind::FlightData => FlightData::RECORD_TYPE,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a project directory with a default config
    Init {
        /// Project name
        name: String,

        /// Storage backend to configure
        #[arg(short, long, default_value = "sqlite")]
        backend: BackendKind,
    },

    /// List records matching filters
    Query {
        record_type: RecordKind,

        #[command(flatten)]
        args: QueryArgs,
    },

    /// Show one record by id
    Get { record_type: RecordKind, id: i64 },

    /// Count records matching filters
    Count {
        record_type: RecordKind,

        /// Filter as lookup=value, e.g. max_speed__gt=500 (repeatable)
        #[arg(short = 'w', long = "where", value_parser = parse_condition)]
        conditions: Vec<(String, Value)>,
    },

    /// Insert a record from a JSON object
    Insert { record_type: RecordKind, json: String },

    /// Delete a record by id
    Delete { record_type: RecordKind, id: i64 },

    /// Walk relations outward from a record (graph backend only)
    Traverse {
        record_type: RecordKind,
        id: i64,

        /// Relation to follow (repeatable; default: all)
        #[arg(short, long = "relation")]
        relations: Vec<String>,

        /// Maximum number of hops
        #[arg(short, long, default_value = "2")]
        depth: usize,
    },
}

#[derive(clap::Args, Debug, Clone, Default)]
pub struct QueryArgs {
    /// Filter as lookup=value, e.g. max_speed__gt=500 (repeatable)
    #[arg(short = 'w', long = "where", value_parser = parse_condition)]
    pub conditions: Vec<(String, Value)>,

    /// Relation to eager-load (repeatable)
    #[arg(long = "with")]
    pub relations: Vec<String>,

    /// Sort key, "-field" for descending (repeatable)
    #[arg(short, long)]
    pub order_by: Vec<String>,

    #[arg(short, long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub offset: Option<usize>,
}

impl Cli {
    pub fn get_project_dir(&self) -> PathBuf {
        self.project
            .clone()
            .unwrap_or_else(|| std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")))
    }
}

/// Split `lookup=value`; the value is read as JSON when it parses, else as a string
pub fn parse_condition(raw: &str) -> Result<(String, Value), String> {
    let (lookup, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected lookup=value, got '{}'", raw))?;
    let lookup = lookup.trim();
    if lookup.is_empty() {
        return Err(format!("missing lookup in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((lookup.to_string(), value))
}

fn query_as<R: Record>(backend: &dyn Backend, args: &QueryArgs) -> OrmResult<Vec<RecordMap>> {
    let mut query = R::query(backend)
        .filter(args.conditions.iter().cloned())
        .with_relations(&args.relations)
        .order_by(&args.order_by);
    if let Some(limit) = args.limit {
        query = query.limit(limit);
    }
    if let Some(offset) = args.offset {
        query = query.offset(offset);
    }
    query
        .all()?
        .iter()
        .map(|record| record.to_map(true))
        .collect()
}

fn count_as<R: Record>(backend: &dyn Backend, conditions: &[(String, Value)]) -> OrmResult<u64> {
    R::query(backend).filter(conditions.iter().cloned()).count()
}

fn get_as<R: Record>(backend: &dyn Backend, id: i64) -> OrmResult<Option<RecordMap>> {
    R::get_by_id(backend, id)?
        .map(|record| record.to_map(true))
        .transpose()
}

fn insert_as<R: Record>(backend: &dyn Backend, json: &str) -> OrmResult<RecordMap> {
    let map = match serde_json::from_str(json)? {
        Value::Object(map) => map,
        _ => return Err(OrmError::Validation("record must be a JSON object".into())),
    };
    let mut record = R::from_map(map)?;
    if record.id().is_some() {
        return Err(OrmError::Validation("new records must not carry an id".into()));
    }
    record.save(backend)?;
    record.to_map(true)
}

fn delete_as<R: Record>(backend: &dyn Backend, id: i64) -> OrmResult<bool> {
    match R::get_by_id(backend, id)? {
        Some(record) => {
            record.delete(backend)?;
            Ok(true)
        }
        None => Ok(false),
    }
}

/// Typed query, returned as sparse maps for display
pub fn run_query(backend: &dyn Backend, kind: RecordKind, args: &QueryArgs) -> OrmResult<Vec<RecordMap>> {
    match kind {
        RecordKind::Aircraft => query_as::<Aircraft>(backend, args),
        RecordKind::Engine => query_as::<Engine>(backend, args),
        RecordKind::Material => query_as::<Material>(backend, args),
        RecordKind::FlightData => query_as::<FlightData>(backend, args),
    }
}

pub fn run_count(backend: &dyn Backend, kind: RecordKind, conditions: &[(String, Value)]) -> OrmResult<u64> {
    match kind {
        RecordKind::Aircraft => count_as::<Aircraft>(backend, conditions),
        RecordKind::Engine => count_as::<Engine>(backend, conditions),
        RecordKind::Material => count_as::<Material>(backend, conditions),
        RecordKind::FlightData => count_as::<FlightData>(backend, conditions),
    }
}

pub fn run_get(backend: &dyn Backend, kind: RecordKind, id: i64) -> OrmResult<Option<RecordMap>> {
    match kind {
        RecordKind::Aircraft => get_as::<Aircraft>(backend, id),
        RecordKind::Engine => get_as::<Engine>(backend, id),
        RecordKind::Material => get_as::<Material>(backend, id),
        RecordKind::FlightData => get_as::<FlightData>(backend, id),
    }
}

/// Validate `json` against the record type, then save it
pub fn run_insert(backend: &dyn Backend, kind: RecordKind, json: &str) -> OrmResult<RecordMap> {
    match kind {
        RecordKind::Aircraft => insert_as::<Aircraft>(backend, json),
        RecordKind::Engine => insert_as::<Engine>(backend, json),
        RecordKind::Material => insert_as::<Material>(backend, json),
        RecordKind::FlightData => insert_as::<FlightData>(backend, json),
    }
}

/// Returns whether a record was found and deleted
pub fn run_delete(backend: &dyn Backend, kind: RecordKind, id: i64) -> OrmResult<bool> {
    match kind {
        RecordKind::Aircraft => delete_as::<Aircraft>(backend, id),
        RecordKind::Engine => delete_as::<Engine>(backend, id),
        RecordKind::Material => delete_as::<Material>(backend, id),
        RecordKind::FlightData => delete_as::<FlightData>(backend, id),
    }
}

pub fn run_traverse(
    backend: &dyn Backend,
    kind: RecordKind,
    id: i64,
    relations: &[String],
    depth: usize,
) -> OrmResult<Vec<GraphNode>> {
    backend.traverse(kind.as_str(), id, relations, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orm::backend::{GraphBackend, SqliteBackend};
    use serde_json::json;

    #[test]
    fn test_parse_condition() {
        assert_eq!(
            parse_condition("max_speed__gt=500").unwrap(),
            ("max_speed__gt".to_string(), json!(500))
        );
        assert_eq!(
            parse_condition("manufacturer=Boeing").unwrap(),
            ("manufacturer".to_string(), json!("Boeing"))
        );
        assert_eq!(
            parse_condition("id__in=[1,2]").unwrap(),
            ("id__in".to_string(), json!([1, 2]))
        );
        assert_eq!(
            parse_condition("origin=").unwrap(),
            ("origin".to_string(), json!(""))
        );
        assert!(parse_condition("no_equals_sign").is_err());
        assert!(parse_condition("=5").is_err());
    }

    #[test]
    fn test_cli_parses_query() {
        let cli = Cli::try_parse_from([
            "aerodata",
            "--format",
            "json",
            "query",
            "aircraft",
            "--where",
            "manufacturer=Boeing",
            "-w",
            "max_speed__gt=500",
            "--with",
            "engines",
            "--order-by=-max_speed",
            "--limit",
            "10",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Query { record_type, args } => {
                assert_eq!(record_type, RecordKind::Aircraft);
                assert_eq!(args.conditions.len(), 2);
                assert_eq!(args.relations, vec!["engines"]);
                assert_eq!(args.order_by, vec!["-max_speed"]);
                assert_eq!(args.limit, Some(10));
                assert_eq!(args.offset, None);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_flight_data_record_kind() {
        let cli = Cli::try_parse_from(["aerodata", "get", "flight_data", "3"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Get { record_type: RecordKind::FlightData, id: 3 }
        ));
    }

    #[test]
    fn test_insert_query_delete_round() {
        let backend = SqliteBackend::in_memory();
        backend.connect().unwrap();

        let inserted = run_insert(
            &backend,
            RecordKind::Engine,
            r#"{"model": "GE90-115B", "manufacturer": "GE", "engine_type": "turbofan", "thrust": 115300, "weight": 18260}"#,
        )
        .unwrap();
        let id = inserted["id"].as_i64().unwrap();
        assert!(inserted.contains_key("created_at"));

        let args = QueryArgs {
            conditions: vec![("thrust__gte".into(), json!(100000))],
            ..QueryArgs::default()
        };
        let rows = run_query(&backend, RecordKind::Engine, &args).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["model"], json!("GE90-115B"));
        assert_eq!(run_count(&backend, RecordKind::Engine, &[]).unwrap(), 1);

        assert!(run_insert(&backend, RecordKind::Engine, r#"{"model": "incomplete"}"#).is_err());
        assert!(run_insert(&backend, RecordKind::Engine, "[1, 2]").is_err());

        assert!(run_delete(&backend, RecordKind::Engine, id).unwrap());
        assert!(!run_delete(&backend, RecordKind::Engine, id).unwrap());
        assert!(run_get(&backend, RecordKind::Engine, id).unwrap().is_none());
    }

    #[test]
    fn test_traverse_on_sqlite_is_not_implemented() {
        let backend = SqliteBackend::in_memory();
        backend.connect().unwrap();
        assert!(matches!(
            run_traverse(&backend, RecordKind::Aircraft, 1, &[], 2),
            Err(OrmError::NotImplemented(_))
        ));

        let graph = GraphBackend::in_memory();
        graph.connect().unwrap();
        assert!(run_traverse(&graph, RecordKind::Aircraft, 1, &[], 2).unwrap().is_empty());
    }
}
