//! AeroData CLI - Main entry point for CLI binary
//!
//! This binary provides the `aerodata` tool for inspecting and editing
//! records in a project's configured backend.

use aerodata::orm::{
    backend::Backend,
    cli::{self, formatter::CliFormatter, BackendKind, Cli, Commands, OutputFormat},
    config::{BackendConfig, Config, LoggingConfig},
    logging::init_logging,
};
use anyhow::{bail, Context, Result};
use clap::Parser;
use serde::Serialize;
use std::path::Path;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run_cli(cli) {
        CliFormatter::error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

fn run_cli(cli: Cli) -> Result<()> {
    let project_dir = cli.get_project_dir();
    let json_output = cli.format == OutputFormat::Json;

    if let Commands::Init { name, backend } = &cli.command {
        init_tracing(&LoggingConfig::default(), cli.log_level.as_deref());
        return cmd_init(&project_dir, name, *backend, json_output);
    }

    let config = Config::load(&project_dir)
        .with_context(|| format!("Not an aerodata project: {}", project_dir.display()))?;
    init_tracing(&config.logging, cli.log_level.as_deref());

    let backend = config.open_backend(&project_dir)?;
    backend.connect()?;
    let result = dispatch(cli.command, backend.as_ref(), json_output);
    backend.disconnect()?;
    result
}

fn init_tracing(logging: &LoggingConfig, override_level: Option<&str>) {
    let mut logging = logging.clone();
    if let Some(level) = override_level {
        logging.level = Some(level.to_string());
    }
    if let Err(e) = init_logging(&logging) {
        eprintln!("Logging disabled: {}", e);
    }
}

fn dispatch(command: Commands, backend: &dyn Backend, json: bool) -> Result<()> {
    match command {
        Commands::Init { .. } => bail!("init does not run against an open backend"),
        Commands::Query { record_type, args } => {
            let rows = cli::run_query(backend, record_type, &args)?;
            if json {
                print_json(&rows)?;
            } else {
                CliFormatter::records(record_type.as_str(), &rows);
            }
        }
        Commands::Get { record_type, id } => match cli::run_get(backend, record_type, id)? {
            Some(row) if json => print_json(&row)?,
            Some(row) => CliFormatter::record(record_type.as_str(), &row),
            None if json => print_json(&serde_json::Value::Null)?,
            None => bail!("{} {} not found", record_type.as_str(), id),
        },
        Commands::Count { record_type, conditions } => {
            let count = cli::run_count(backend, record_type, &conditions)?;
            if json {
                print_json(&serde_json::json!({ "record_type": record_type.as_str(), "count": count }))?;
            } else {
                CliFormatter::kv(record_type.as_str(), &count.to_string());
            }
        }
        Commands::Insert { record_type, json: payload } => {
            let row = cli::run_insert(backend, record_type, &payload)?;
            if json {
                print_json(&row)?;
            } else {
                CliFormatter::success(&format!(
                    "Inserted {}",
                    cli::formatter::record_title(record_type.as_str(), &row)
                ));
            }
        }
        Commands::Delete { record_type, id } => {
            let deleted = cli::run_delete(backend, record_type, id)?;
            if json {
                print_json(&serde_json::json!({ "deleted": deleted }))?;
            } else if deleted {
                CliFormatter::success(&format!("Deleted {} {}", record_type.as_str(), id));
            } else {
                CliFormatter::warning(&format!("{} {} does not exist", record_type.as_str(), id));
            }
        }
        Commands::Traverse {
            record_type,
            id,
            relations,
            depth,
        } => {
            let nodes = cli::run_traverse(backend, record_type, id, &relations, depth)?;
            if json {
                print_json(&nodes)?;
            } else {
                CliFormatter::nodes(&nodes);
            }
        }
    }
    Ok(())
}

fn cmd_init(base_dir: &Path, name: &str, backend: BackendKind, json: bool) -> Result<()> {
    let project_dir = base_dir.join(name);
    if project_dir.join(aerodata::orm::config::CONFIG_FILE).exists() {
        bail!("Project already initialized: {}", project_dir.display());
    }

    std::fs::create_dir_all(project_dir.join("data"))?;

    let mut config = Config::default_for_project(name);
    if backend == BackendKind::Graph {
        config.backend = BackendConfig::Graph {
            uri: "file://data/graph.json".to_string(),
            username: "aerodata".to_string(),
            password: String::new(),
        };
    }
    config.save(&project_dir)?;

    let gitignore = "# AeroData\ndata/*.db\ndata/*.db-*\ndata/*.tmp\n*.log\n";
    std::fs::write(project_dir.join(".gitignore"), gitignore)?;

    if json {
        print_json(&serde_json::json!({
            "project": name,
            "path": project_dir,
            "backend": config.backend,
        }))?;
    } else {
        CliFormatter::success(&format!("Created project '{}'", name));
        CliFormatter::kv("Path", &project_dir.display().to_string());
        CliFormatter::kv(
            "Backend",
            match backend {
                BackendKind::Sqlite => "sqlite",
                BackendKind::Graph => "graph",
            },
        );
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
