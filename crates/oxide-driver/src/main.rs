//! oxide-schema CLI
//!
//! Renders schema DDL and inspects live databases.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use oxide_ddl::prelude::{
    BuildContext, DatabaseType, DefaultNamingStrategy, MetadataTable, SqlInMemory, Table,
};
use oxide_driver::prelude::*;

/// Reversible schema DDL for SQLite, SQL Server and Oracle.
#[derive(Parser)]
#[command(name = "oxide-schema")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Database URL (SQLite path or connection string).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite:db.sqlite3")]
    database: String,

    /// Data source options file (JSON); overrides `--database`.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the SQL creating a table described in a JSON file.
    Sql {
        /// Table definition file.
        #[arg(short, long)]
        table: PathBuf,

        /// Target dialect (sqlite, mssql, oracle).
        #[arg(short = 'D', long, default_value = "sqlite")]
        dialect: DatabaseType,

        /// Show the SQL undoing the creation instead.
        #[arg(short, long)]
        reverse: bool,
    },

    /// Print the tables of the database as JSON.
    Inspect {
        /// Include the bookkeeping and cache tables.
        #[arg(long)]
        all: bool,
    },

    /// Create the bookkeeping and cache tables.
    Init,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .without_time()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Sql {
            table,
            dialect,
            reverse,
        } => {
            let definition: Table = serde_json::from_str(&std::fs::read_to_string(&table)?)?;
            let naming = DefaultNamingStrategy::new();
            let metadata = MetadataTable::default();
            let ctx = BuildContext::new(&naming, &metadata);
            let change = dialect
                .dialect()
                .create_table(&ctx, &definition, true, true)?;
            let queries = if reverse {
                change.sql.down_in_execution_order()
            } else {
                change.sql.up
            };
            println!("{}", SqlInMemory::script(&queries));
        }

        Commands::Inspect { all } => {
            let manager = open(&cli.database, cli.config.as_ref()).await?;
            let runner = manager.create_query_runner(ReplicationMode::Slave);
            let tables = if all {
                oxide_driver::catalog::load_tables(&runner, None, true).await?
            } else {
                runner.get_tables().await?
            };
            let views = runner.get_views().await?;
            runner.release().await?;
            manager.disconnect().await?;

            let output = serde_json::json!({ "tables": tables, "views": views });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::Init => {
            let manager = open(&cli.database, cli.config.as_ref()).await?;
            let runner = manager.create_query_runner(ReplicationMode::Master);
            info!("Creating bookkeeping tables...");
            runner.create_metadata_table().await?;
            runner.create_cache_table().await?;
            runner.release().await?;
            manager.disconnect().await?;
            info!("Bookkeeping tables ready.");
        }
    }

    Ok(())
}

async fn open(database: &str, config: Option<&PathBuf>) -> anyhow::Result<Arc<ConnectionManager>> {
    let options = match config {
        Some(path) => DataSourceOptions::from_file(path)?,
        None => DataSourceOptions::sqlite(database),
    };
    if options.database_type != DatabaseType::Sqlite {
        anyhow::bail!(
            "no built-in driver for {:?}; use the library with a custom backend",
            options.database_type
        );
    }
    let manager = Arc::new(ConnectionManager::sqlite(options));
    manager.connect().await?;
    Ok(manager)
}
