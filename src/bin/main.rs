//! nlsql CLI - translate questions to SQL over a component catalogue
//!
//! Usage:
//!   nlsql register <components.json>
//!   nlsql seed <schema.toml>
//!   nlsql list [--category <category>]
//!   nlsql ask "<question>" [--dialect <dialect>] [--format sql|json]
//!   nlsql remove <id>
//!
//! Examples:
//!   nlsql seed schema.toml
//!   nlsql ask "total sales amount by region" --dialect postgres
//!   nlsql list --category join

use clap::{Parser, Subcommand, ValueEnum};
use nlsql::component::{
    load_components, seed_from_schema, Category, ComponentId, ComponentRegistry,
    SchemaDescription,
};
use nlsql::config::Settings;
use nlsql::embedding::HashingEmbedder;
use nlsql::pipeline::Pipeline;
use nlsql::sql::Dialect;
use nlsql::store::{SqliteVectorStore, VectorStore};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nlsql")]
#[command(about = "nlsql - natural-language questions to parameterized SQL")]
#[command(version)]
struct Cli {
    /// Settings file (defaults to NLSQL_CONFIG, ./nlsql.toml, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Catalogue database (overrides [store].path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register components from a JSON array
    Register {
        /// Path to the components file
        file: PathBuf,
    },

    /// Derive and register components from a schema description
    Seed {
        /// Path to the schema file (.toml or .json)
        file: PathBuf,
    },

    /// List registered components
    List {
        /// Only show one category (table, column, join, filter, ...)
        #[arg(short, long)]
        category: Option<Category>,
    },

    /// Translate a question to SQL
    Ask {
        question: String,

        /// SQL dialect to generate (defaults to [compiler].dialect)
        #[arg(short, long)]
        dialect: Option<DialectArg>,

        /// Output format
        #[arg(short, long, default_value = "sql")]
        format: OutputFormat,
    },

    /// Remove a registered component
    Remove { id: String },
}

#[derive(Clone, ValueEnum)]
enum DialectArg {
    Postgres,
    Mysql,
    Tsql,
    Duckdb,
    Bigquery,
    Snowflake,
    Databricks,
    Redshift,
}

impl From<DialectArg> for Dialect {
    fn from(arg: DialectArg) -> Self {
        match arg {
            DialectArg::Postgres => Dialect::Postgres,
            DialectArg::Mysql => Dialect::MySql,
            DialectArg::Tsql => Dialect::TSql,
            DialectArg::Duckdb => Dialect::DuckDb,
            DialectArg::Bigquery => Dialect::BigQuery,
            DialectArg::Snowflake => Dialect::Snowflake,
            DialectArg::Databricks => Dialect::Databricks,
            DialectArg::Redshift => Dialect::Redshift,
        }
    }
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    /// SQL followed by the bound parameters as comments
    Sql,
    /// The full translation: candidates, plan and query
    Json,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nlsql=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let settings = match load_settings(cli.config.as_ref()) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let store = match open_store(&settings, cli.db) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error opening catalogue: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let gateway = Arc::new(HashingEmbedder::new(settings.embedding.dimension));

    let result = match cli.command {
        Commands::Register { file } => cmd_register(file, gateway, store).await,
        Commands::Seed { file } => cmd_seed(file, gateway, store).await,
        Commands::List { category } => cmd_list(category, store).await,
        Commands::Ask {
            question,
            dialect,
            format,
        } => cmd_ask(&settings, question, dialect, format, gateway, store).await,
        Commands::Remove { id } => cmd_remove(id, gateway, store).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

type CmdResult = Result<(), Box<dyn std::error::Error>>;

fn load_settings(path: Option<&PathBuf>) -> Result<Settings, nlsql::config::SettingsError> {
    match path {
        Some(p) => Settings::from_file(p),
        None => Settings::load(),
    }
}

fn open_store(
    settings: &Settings,
    db: Option<PathBuf>,
) -> Result<Arc<SqliteVectorStore>, Box<dyn std::error::Error>> {
    let path = match db {
        Some(p) => p,
        None => match settings.store.resolved_path()? {
            Some(p) => p,
            None => SqliteVectorStore::default_path()?,
        },
    };
    tracing::debug!(path = %path.display(), "cli.store.open");
    Ok(Arc::new(SqliteVectorStore::open(&path)?))
}

async fn cmd_register(
    file: PathBuf,
    gateway: Arc<HashingEmbedder>,
    store: Arc<SqliteVectorStore>,
) -> CmdResult {
    let components = load_components(&file)?;
    let summary = ComponentRegistry::new(gateway, store)
        .register_all(components)
        .await?;
    println!(
        "Registered {} component(s), {} already present",
        summary.registered, summary.unchanged
    );
    Ok(())
}

async fn cmd_seed(
    file: PathBuf,
    gateway: Arc<HashingEmbedder>,
    store: Arc<SqliteVectorStore>,
) -> CmdResult {
    let schema = SchemaDescription::from_file(&file)?;
    let components = seed_from_schema(&schema);
    let summary = ComponentRegistry::new(gateway, store)
        .register_all(components)
        .await?;
    println!(
        "Seeded {} table(s): {} component(s) registered, {} already present",
        schema.tables.len(),
        summary.registered,
        summary.unchanged
    );
    Ok(())
}

async fn cmd_list(category: Option<Category>, store: Arc<SqliteVectorStore>) -> CmdResult {
    let components = store.list(category).await?;
    if components.is_empty() {
        println!("No components registered.");
        return Ok(());
    }

    for category in Category::ALL {
        let in_category: Vec<_> = components
            .iter()
            .filter(|c| c.category() == category)
            .collect();
        if in_category.is_empty() {
            continue;
        }
        println!("{} ({}):", category, in_category.len());
        for c in in_category {
            println!("  {}  {}", c.id, c.description);
        }
        println!();
    }
    Ok(())
}

async fn cmd_ask(
    settings: &Settings,
    question: String,
    dialect: Option<DialectArg>,
    format: OutputFormat,
    gateway: Arc<HashingEmbedder>,
    store: Arc<SqliteVectorStore>,
) -> CmdResult {
    let mut pipeline = Pipeline::from_settings(settings, gateway, store);
    if let Some(d) = dialect {
        pipeline = pipeline.with_dialect(d.into());
    }

    pipeline.init().await?;
    let result = pipeline.translate(&question).await;
    pipeline.shutdown();
    let translation = result?;

    match format {
        OutputFormat::Sql => {
            println!("{}", translation.query.sql);
            for (i, value) in translation.query.parameters.iter().enumerate() {
                println!("-- ${}: {}", i + 1, value);
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&translation)?);
        }
    }
    Ok(())
}

async fn cmd_remove(
    id: String,
    gateway: Arc<HashingEmbedder>,
    store: Arc<SqliteVectorStore>,
) -> CmdResult {
    let id = ComponentId::new(id);
    if ComponentRegistry::new(gateway, store).deregister(&id).await? {
        println!("Removed {}", id);
    } else {
        println!("No component with id {}", id);
    }
    Ok(())
}
