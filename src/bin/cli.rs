//! Tabulon CLI.

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};
use colored::*;
use serde_json::Value;
use std::path::PathBuf;
use tabulon::admin::{BackupRequest, IndexRequest};
use tabulon::{BulkKind, BulkRequest, Engine, EngineConfig, OperationResult, Record, TableAddress};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tabulon")]
#[command(about = "Tabulon - embedded tabular store with SQL and document queries", long_about = None)]
struct Cli {
    /// Data directory (default: ~/.tabulon/data)
    #[arg(long, global = true, env = "TABULON_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Tenant id
    #[arg(long, short, global = true, default_value = "default")]
    tenant: String,

    /// Database name
    #[arg(long, short, global = true, default_value = "main")]
    database: String,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Table,
    Json,
}

#[derive(Clone, Copy, ValueEnum)]
enum BulkOp {
    Insert,
    Update,
    Delete,
}

impl From<BulkOp> for BulkKind {
    fn from(op: BulkOp) -> Self {
        match op {
            BulkOp::Insert => BulkKind::Insert,
            BulkOp::Update => BulkKind::Update,
            BulkOp::Delete => BulkKind::Delete,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a SQL statement
    Sql {
        /// SQL text
        query: String,

        /// Include the execution plan
        #[arg(long)]
        explain: bool,

        /// Output format
        #[arg(long, value_enum, default_value = "table")]
        format: Format,
    },

    /// Run a document operation, e.g. '{"find": {"age": 25}}'
    Doc {
        /// Table name
        table: String,

        /// Operation descriptor (JSON)
        operation: String,
    },

    /// Apply a bulk operation from a JSONL file
    Bulk {
        /// Table name
        table: String,

        /// Operation kind
        #[arg(value_enum)]
        operation: BulkOp,

        /// JSONL file with one item per line
        #[arg(long)]
        file: PathBuf,

        /// Items per batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// Insert one record (JSON object)
    Insert {
        /// Table name
        table: String,

        /// Record (JSON)
        record: String,
    },

    /// Create a table
    CreateTable {
        /// Table name
        table: String,

        /// Column definitions (comma-separated)
        #[arg(long)]
        columns: Option<String>,
    },

    /// List tables in the database
    Tables,

    /// List databases of the tenant
    Databases,

    /// Archive a table
    Archive {
        /// Table name
        table: String,

        /// Skip the archive marker line
        #[arg(long)]
        no_compress: bool,
    },

    /// Write an index descriptor
    Index {
        /// Table name
        table: String,

        /// Index name
        name: String,

        /// Indexed columns (comma-separated)
        #[arg(long)]
        columns: String,

        /// Mark the index unique
        #[arg(long)]
        unique: bool,
    },

    /// Write a backup descriptor for the database
    Backup {
        /// Backup type
        #[arg(long = "type", default_value = "full")]
        backup_type: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config =
        EngineConfig::load_with_data_dir(cli.data_dir.clone()).context("loading configuration")?;
    let engine = Engine::open(config)?;
    let addr = |table: &str| TableAddress::new(&cli.tenant, &cli.database, table);

    match cli.command {
        Commands::Sql {
            ref query,
            explain,
            format,
        } => {
            println!("{} Executing query...", "→".cyan());
            let result = engine.execute_sql(&cli.tenant, &cli.database, query, None, explain);
            print_result(&result, format)?;
        }

        Commands::Doc {
            ref table,
            ref operation,
        } => {
            let descriptor: Value =
                serde_json::from_str(operation).context("operation is not valid JSON")?;
            let result = engine.execute_document(&addr(table), &descriptor);
            print_result(&result, Format::Table)?;
        }

        Commands::Bulk {
            ref table,
            operation,
            ref file,
            batch_size,
        } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("reading {}", file.display()))?;
            let items = content
                .lines()
                .filter(|line| !line.trim().is_empty())
                .enumerate()
                .map(|(i, line)| {
                    serde_json::from_str(line).with_context(|| format!("line {} is not JSON", i + 1))
                })
                .collect::<anyhow::Result<Vec<Value>>>()?;

            let mut request = BulkRequest::new(operation.into(), items);
            request.batch_size = batch_size;
            let result = engine.bulk(&addr(table), &request);
            print_result(&result, Format::Table)?;
        }

        Commands::Insert {
            ref table,
            ref record,
        } => {
            let record: Record = serde_json::from_str(record).context("record must be a JSON object")?;
            engine.insert(&addr(table), &record)?;
            println!("{} Inserted into {}", "✓".green(), addr(table));
        }

        Commands::CreateTable {
            ref table,
            ref columns,
        } => {
            let address = addr(table);
            if engine.create_table(&address)? {
                println!("{} Created table {}", "✓".green(), address);
            } else {
                println!("{} Table {} already exists", "•".yellow(), address);
            }
            if let Some(columns) = columns {
                engine.store().save_schema(&address, &split_csv(columns))?;
            }
        }

        Commands::Tables => {
            let tables = engine.list_tables(&cli.tenant, &cli.database)?;
            if tables.is_empty() {
                println!("{}", "No tables".yellow());
                return Ok(());
            }
            println!("{} Database: {}", "✓".green(), cli.database.bright_white());
            for table in tables {
                let stats = engine.table_stats(&addr(&table))?;
                println!(
                    "  {} {} {}",
                    "•".green(),
                    table.bright_white(),
                    format!("({} records, {} bytes)", stats.records, stats.bytes).dimmed()
                );
            }
        }

        Commands::Databases => {
            let databases = engine.list_databases(&cli.tenant)?;
            if databases.is_empty() {
                println!("{}", "No databases".yellow());
                return Ok(());
            }
            println!("{} Tenant: {}", "✓".green(), cli.tenant.bright_white());
            for database in databases {
                println!("  {} {}", "•".green(), database);
            }
        }

        Commands::Archive {
            ref table,
            no_compress,
        } => {
            let info = engine.archive_table(&addr(table), !no_compress)?;
            println!("{} Archived to {}", "✓".green(), info.path.display());
        }

        Commands::Index {
            ref table,
            ref name,
            ref columns,
            unique,
        } => {
            let mut request = IndexRequest::new(name.clone(), split_csv(columns));
            request.unique = unique;
            let path = engine.create_index(&addr(table), &request)?;
            println!("{} Index descriptor written: {}", "✓".green(), path.display());
        }

        Commands::Backup { ref backup_type } => {
            let request = BackupRequest {
                backup_type: backup_type.clone(),
                ..BackupRequest::default()
            };
            let (path, _) = engine.backup_database(&cli.tenant, &cli.database, &request)?;
            println!("{} Backup descriptor written: {}", "✓".green(), path.display());
            println!("   {}", "Descriptor only: table rows are not copied".dimmed());
        }
    }

    Ok(())
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "tabulon=debug" } else { "tabulon=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn split_csv(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn print_result(result: &OperationResult, format: Format) -> anyhow::Result<()> {
    if !result.success {
        println!(
            "{} {}",
            "✗".red(),
            result.error.as_deref().unwrap_or("operation failed")
        );
        bail!("operation failed");
    }

    if let Format::Json = format {
        println!("{}", serde_json::to_string_pretty(result)?);
        return Ok(());
    }

    let rows = result.rows();
    let counts = [
        ("affected", result.affected_rows),
        ("inserted", result.inserted_count),
        ("updated", result.updated_count),
        ("modified", result.modified_count),
        ("deleted", result.deleted_count),
    ];
    for (label, count) in counts {
        if let Some(n) = count {
            println!("{} {} {}", "✓".green(), n, label);
        }
    }
    if let Some(batches) = result.total_batches {
        println!("   {} batches", batches);
    }

    if result.data.is_some() || result.documents.is_some() {
        println!("\n{} {} rows:", "✓".green(), rows.len());
        for row in rows.iter().take(20) {
            println!("  • {}", row);
        }
        if rows.len() > 20 {
            println!("  ... and {} more", rows.len() - 20);
        }
    }

    if let Some(plan) = &result.execution_plan {
        println!("\n{}", "Execution plan:".cyan().bold());
        for step in &plan.steps {
            println!("  {} {}", "→".cyan(), step);
        }
        println!("  estimated cost: {:.3}", plan.estimated_cost);
    }
    Ok(())
}
