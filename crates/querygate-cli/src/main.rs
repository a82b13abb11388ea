use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use querygate_cache::{SchemaCache, SnapshotFile};
use querygate_catalog::{PostgresStore, SchemaStore};
use querygate_core::{Config, SchemaSnapshot, ValidationResult};
use querygate_sql::Guardrail;

const DEFAULT_CONFIG: &str = "querygate.toml";
const PG_URL_ENV: &str = "QUERYGATE_PG_URL";

/// QueryGate - SQL guardrails for generated queries
#[derive(Parser)]
#[command(name = "querygate")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: querygate.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a SQL statement against the configured rules
    Validate {
        /// SQL statement to validate
        #[arg(conflicts_with = "file", required_unless_present = "file")]
        sql: Option<String>,

        /// Read the statement from a file
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Inspect or refresh the schema snapshot
    Schema {
        #[command(subcommand)]
        command: SchemaCommands,
    },

    /// Write a default querygate.toml
    InitConfig {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand)]
enum SchemaCommands {
    /// Show tables in the persisted snapshot, or one table's columns
    Show {
        /// Table to show (stored key or bare name)
        table: Option<String>,
    },

    /// Reload the snapshot from the backing store
    Reload,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_path = cli.config.clone().unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));

    if let Commands::InitConfig { force } = cli.command {
        return init_config_command(&config_path, force);
    }

    // Load config if present
    let config = if config_path.exists() {
        Config::from_file(&config_path)?
    } else if cli.config.is_some() {
        return Err(anyhow::anyhow!("Config file not found: {}", config_path.display()));
    } else {
        if cli.verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if cli.verbose {
        eprintln!("{} dialect: {:?}", "Using".cyan(), config.dialect);
    }

    match cli.command {
        Commands::Validate { sql, file, json } => {
            validate_command(&config, sql, file.as_deref(), json, cli.verbose).await
        }
        Commands::Schema { command: SchemaCommands::Show { table } } => {
            schema_show_command(&config, table.as_deref()).await
        }
        Commands::Schema { command: SchemaCommands::Reload } => {
            schema_reload_command(&config, cli.verbose).await
        }
        Commands::InitConfig { .. } => Ok(()),
    }
}

fn init_tracing(verbose: bool) {
    let default_directive = if verbose { "querygate=debug" } else { "querygate=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
}

/// Validate command - run the guardrail over one statement
async fn validate_command(
    config: &Config,
    sql: Option<String>,
    file: Option<&Path>,
    json: bool,
    verbose: bool,
) -> Result<()> {
    let sql = match (sql, file) {
        (Some(sql), _) => sql,
        (None, Some(path)) => std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?,
        (None, None) => return Err(anyhow::anyhow!("Provide a SQL statement or --file")),
    };

    let snapshot = schema_for_validation(config, load_persisted_snapshot(config, verbose).await)?;
    let guardrail = Guardrail::from_config(config);
    let result = guardrail.validate(&sql, &snapshot);

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        print_validation(&result);
    }

    if !result.ok {
        std::process::exit(1);
    }

    Ok(())
}

/// Schema show command - print the persisted snapshot
async fn schema_show_command(config: &Config, table: Option<&str>) -> Result<()> {
    let path = config.snapshot_path();
    let snapshot = SnapshotFile::new(&path).read().await?.ok_or_else(|| {
        anyhow::anyhow!(
            "No schema snapshot at {}. Run 'querygate schema reload' first.",
            path.display()
        )
    })?;

    match table {
        Some(table) => {
            let (name, info) = snapshot
                .lookup(table)
                .ok_or_else(|| anyhow::anyhow!("Table '{}' is not in the schema snapshot", table))?;

            println!("{}", name.bold());
            println!("  {}", snapshot.description(name).dimmed());
            for column in &info.columns {
                println!("  - {}", column);
            }
        }
        None => {
            println!(
                "{} {} tables (loaded {})",
                "Schema:".bold(),
                snapshot.table_count(),
                snapshot.loaded_at().to_rfc3339()
            );
            for (name, info) in snapshot.tables() {
                println!("  {} ({} columns)", name, info.columns.len());
            }
        }
    }

    Ok(())
}

/// Schema reload command - force a live load from the backing store
async fn schema_reload_command(config: &Config, verbose: bool) -> Result<()> {
    let store = connect_store(config, verbose).await?;

    if verbose {
        eprintln!("{} {}...", "Reloading schema from".cyan(), store.name());
    }

    let mut cache = SchemaCache::new(store);
    if config.cache.persist {
        cache = cache.with_persistence(SnapshotFile::new(config.snapshot_path()));
    }

    let snapshot = cache.reload().await?;

    println!(
        "{} {} tables loaded",
        "✓".green(),
        snapshot.table_count()
    );
    if let Some(file) = cache.snapshot_file() {
        println!("  Snapshot: {}", file.path().display());
    }

    Ok(())
}

/// Write the default config file
fn init_config_command(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(anyhow::anyhow!(
            "{} already exists. Use --force to overwrite.",
            path.display()
        ));
    }

    Config::default().save_to_file(path)?;
    println!("{} Wrote {}", "✓".green(), path.display());

    Ok(())
}

/// Build the configured backing store and test its connection
async fn connect_store(config: &Config, verbose: bool) -> Result<Arc<dyn SchemaStore>> {
    let store_config = config.store.clone().unwrap_or_default();

    let store: Arc<dyn SchemaStore> = match store_config.store_type.to_lowercase().as_str() {
        "postgres" | "postgresql" => {
            let conn_str = store_config
                .settings
                .get("connection_string")
                .cloned()
                .or_else(|| std::env::var(PG_URL_ENV).ok())
                .ok_or_else(|| {
                    anyhow::anyhow!(
                        "Postgres requires 'connection_string' in [store] settings or {} in the environment",
                        PG_URL_ENV
                    )
                })?;

            let use_tls = store_config
                .settings
                .get("sslmode")
                .is_some_and(|mode| mode != "disable");

            let store = if use_tls {
                PostgresStore::from_connection_string_with_tls(&conn_str).await?
            } else {
                PostgresStore::from_connection_string(&conn_str).await?
            };

            let store = match store_config.settings.get("schemas") {
                Some(schemas) => store.with_schemas(
                    schemas
                        .split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect(),
                ),
                None => store,
            };

            Arc::new(store)
        }
        other => {
            return Err(anyhow::anyhow!(
                "Unsupported store type '{}'. Supported: postgres",
                other
            ));
        }
    };

    if verbose {
        eprintln!("{}", "Testing store connection...".cyan());
    }

    store
        .test_connection()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to connect to schema store: {}", e))?;

    Ok(store)
}

/// Read the persisted snapshot, if there is a usable one
async fn load_persisted_snapshot(config: &Config, verbose: bool) -> Option<SchemaSnapshot> {
    let path = config.snapshot_path();

    match SnapshotFile::new(&path).read().await {
        Ok(Some(snapshot)) => Some(snapshot),
        Ok(None) => {
            if verbose {
                eprintln!("{} {}", "No schema snapshot at".yellow(), path.display());
            }
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable schema snapshot");
            None
        }
    }
}

/// Pick the snapshot validation runs against.
///
/// Schema restriction against an empty snapshot would reject every table,
/// so a missing snapshot is an error in that mode.
fn schema_for_validation(config: &Config, snapshot: Option<SchemaSnapshot>) -> Result<SchemaSnapshot> {
    match snapshot {
        Some(snapshot) => Ok(snapshot),
        None if config.rules.restrict_to_schema => Err(anyhow::anyhow!(
            "restrict_to_schema is enabled but no schema snapshot is available at {}. Run 'querygate schema reload' first.",
            config.snapshot_path().display()
        )),
        None => Ok(SchemaSnapshot::empty()),
    }
}

fn print_validation(result: &ValidationResult) {
    if result.ok {
        println!("{}", "✓ SQL passed all guardrail checks".green().bold());
        return;
    }

    println!(
        "{} {} violation(s)",
        "✗".red().bold(),
        result.errors.len()
    );
    for error in &result.errors {
        println!("  [{}] {}", "ERROR".red().bold(), error);
    }
}
