//! cql2pg: compile CQL trees to PostgreSQL
//!
//! # Usage
//!
//! ```bash
//! # Compile a JSON encoded CQL tree
//! cql2pg --field users.jsonb --schema schema.json compile query.json
//!
//! # Read the tree from stdin, print only the WHERE/ORDER BY part
//! echo '{"term":{"index":"name","relation":{"base":"=="},"value":"Jo*"}}' | cql2pg -f users compile - --clause
//!
//! # Show how a field is searched
//! cql2pg --schema schema.json -f users explain groups.title
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::*;
use cql2pg::config::Config;
use cql2pg::prelude::*;
use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cql2pg")]
#[command(version)]
#[command(about = "Compile CQL query trees into PostgreSQL JSONB SQL", long_about = None)]
#[command(after_help = "EXAMPLES:
    cql2pg -f users.jsonb compile query.json
    cql2pg -f users --schema schema.json --server-choice name,email compile - --clause
    cql2pg --schema schema.json tables")]
struct Cli {
    /// Table or table.column to compile against
    #[arg(short, long, global = true, env = "CQL2PG_FIELD")]
    field: Option<String>,

    /// JSON schema document with indexes and foreign keys
    #[arg(short, long, global = true, env = "CQL2PG_SCHEMA")]
    schema: Option<PathBuf>,

    /// Indexes searched by terms without an index
    #[arg(long, global = true, value_delimiter = ',')]
    server_choice: Vec<String>,

    /// Config file (defaults to <config dir>/cql2pg/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a JSON encoded CQL tree
    Compile {
        /// Query file, `-` for stdin
        input: String,

        /// Print only the WHERE / ORDER BY clause
        #[arg(long)]
        clause: bool,
    },
    /// Show how a field is resolved
    Explain {
        /// Index name, e.g. `title` or `groups.name`
        index: String,
    },
    /// List the tables of the schema
    Tables,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run(cli: &Cli) -> Result<()> {
    let file_config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config '{}'", path.display()))?,
        None => Config::load_default().context("Failed to load config")?,
    };
    let mut overrides = Config::builder().server_choice(cli.server_choice.iter().cloned());
    if let Some(field) = &cli.field {
        overrides = overrides.field(field.as_str());
    }
    if let Some(schema) = &cli.schema {
        overrides = overrides.schema(schema.clone());
    }
    let config = file_config.merge(overrides.build());

    let schema = match &config.schema {
        Some(path) => SchemaModel::load(path)
            .with_context(|| format!("Failed to load schema '{}'", path.display()))?,
        None => SchemaModel::new(),
    };

    match &cli.command {
        Commands::Tables => {
            show_tables(&schema);
            Ok(())
        }
        Commands::Explain { index } => {
            let compiler = compiler(&config, schema)?;
            println!("{}", compiler.explain(index)?);
            Ok(())
        }
        Commands::Compile { input, clause } => {
            let compiler = compiler(&config, schema)?;
            let node = read_query(input)?;
            if cli.verbose {
                eprintln!("{} {}", "Query:".dimmed(), node.to_string().yellow());
            }
            let select = compiler.to_sql(&node)?;
            if *clause || !select.joins().is_empty() {
                println!("{}", select);
            } else {
                println!("select * from {} {}", compiler.table(), select);
            }
            Ok(())
        }
    }
}

fn compiler(config: &Config, schema: SchemaModel) -> Result<Cql2Pg> {
    let field = config
        .field
        .as_deref()
        .context("No field given. Use --field, CQL2PG_FIELD or the config file")?;
    let compiler = Cql2Pg::new(field)?
        .with_schema(Arc::new(schema))
        .with_server_choice_indexes(config.server_choice.iter().cloned())?;
    Ok(compiler)
}

fn read_query(input: &str) -> Result<CqlNode> {
    let content = if input == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        buf
    } else {
        std::fs::read_to_string(input).with_context(|| format!("Failed to read file '{}'", input))?
    };
    serde_json::from_str(&content).context("Invalid CQL tree")
}

fn show_tables(schema: &SchemaModel) {
    if schema.is_empty() {
        println!("{}", "No schema loaded. Use --schema or CQL2PG_SCHEMA".yellow());
        return;
    }
    for table in schema.tables() {
        println!(
            "{} {}",
            table.name.cyan().bold(),
            format!("(pk {})", table.pk_column).dimmed()
        );
        let mut names: Vec<&String> = table.indexes.keys().collect();
        names.sort();
        for name in names {
            if let Some(index) = table.index(name) {
                println!("  {} {}", name.green(), format!("{:?}", index.kind).dimmed());
            }
        }
        for fk in &table.foreign_keys {
            println!(
                "  {} {} {} {}",
                "fk".yellow(),
                fk.column.as_deref().unwrap_or("?"),
                "→".dimmed(),
                fk.target_table.as_deref().unwrap_or("?")
            );
        }
    }
}
