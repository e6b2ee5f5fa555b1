//! Biblio Graph CLI — load a bibliographic archive into a graph store

use anyhow::Context;
use biblio_graph::gateway::{EmbeddedGateway, GatewayResult, GraphGateway, Neo4jGateway};
use biblio_graph::{
    content_fingerprint, database_name_for, ArchiveDecoder, IngestConfig, IngestReport,
    IngestResult, Pipeline, PipelineOptions,
};
use clap::{Args, Parser, Subcommand};
use comfy_table::{ContentArrangement, Table};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "biblio-graph", version, about = "Bibliographic archive to graph loader")]
struct Cli {
    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum Backend {
    /// Neo4j server over Bolt
    Neo4j,
    /// In-process store (dry run)
    Embedded,
}

#[derive(Subcommand)]
enum Commands {
    /// Load an archive (node pass, then relationship pass)
    Load(LoadArgs),
    /// Print the database name derived from an archive file name
    DbName {
        file_name: String,
    },
    /// Print the content fingerprint of a JSON value
    Fingerprint {
        json: String,
    },
}

#[derive(Args)]
struct LoadArgs {
    /// Zip archive of JSON document records
    archive: PathBuf,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum, default_value = "neo4j")]
    backend: Backend,

    #[arg(long, env = "NEO4J_URI")]
    uri: Option<String>,

    #[arg(long, env = "NEO4J_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "NEO4J_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Target database (default: derived from the archive file name)
    #[arg(long)]
    database: Option<String>,

    /// Relationship batches in flight
    #[arg(long)]
    window: Option<usize>,

    /// Attempts per relationship batch
    #[arg(long)]
    max_retries: Option<u32>,

    /// Detach-delete the target database first
    #[arg(long)]
    clear: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Load(args) => run_load(args, &cli.format).await,
        Commands::DbName { file_name } => {
            println!("{}", database_name_for(&file_name));
            Ok(())
        }
        Commands::Fingerprint { json } => run_fingerprint(&json),
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn resolve_config(args: &LoadArgs) -> anyhow::Result<IngestConfig> {
    let mut config = match &args.config {
        Some(path) => IngestConfig::from_yaml_file(path)
            .with_context(|| format!("reading {}", path.display()))?,
        None => IngestConfig::default(),
    };

    if let Some(uri) = &args.uri {
        config.connection.uri = uri.clone();
    }
    if let Some(username) = &args.username {
        config.connection.username = username.clone();
    }
    if let Some(password) = &args.password {
        config.connection.password = password.clone();
    }
    if let Some(database) = &args.database {
        config.connection.database = Some(database.clone());
    }
    if let Some(window) = args.window {
        config.loader.window = window;
    }
    if let Some(max_retries) = args.max_retries {
        config.loader.max_retries = max_retries;
    }
    if args.clear {
        config.clear = true;
    }

    config.validate()?;
    Ok(config)
}

async fn run_load(args: LoadArgs, format: &OutputFormat) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;

    let database = match &config.connection.database {
        Some(name) => name.clone(),
        None => {
            let file_name = args
                .archive
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .with_context(|| format!("{} has no file name", args.archive.display()))?;
            database_name_for(&file_name)
        }
    };

    let decoder = ArchiveDecoder::open(&args.archive)
        .await
        .with_context(|| format!("opening {}", args.archive.display()))?;

    let gateway: Arc<dyn GraphGateway> = match args.backend {
        Backend::Neo4j => {
            Arc::new(Neo4jGateway::connect(&config.connection, &database, config.loader.window).await?)
        }
        Backend::Embedded => Arc::new(EmbeddedGateway::in_memory(database.as_str())),
    };
    info!("Loading {} into '{}'", args.archive.display(), database);

    let pipeline = Pipeline::new(Arc::clone(&gateway), PipelineOptions::from(&config));
    let report = finish_load(pipeline.run(&decoder), gateway.close()).await?;

    print_report(&report, format)?;
    Ok(())
}

/// Await the load, then close the gateway whatever the outcome. A load
/// failure outranks a close failure; the latter is only logged then.
async fn finish_load(
    load: impl Future<Output = IngestResult<IngestReport>>,
    close: impl Future<Output = GatewayResult<()>>,
) -> anyhow::Result<IngestReport> {
    let outcome = load.await;
    let closed = close.await;
    match (outcome, closed) {
        (Ok(report), closed) => {
            closed.context("closing gateway")?;
            Ok(report)
        }
        (Err(e), Err(close_error)) => {
            warn!("Closing gateway after failed load: {}", close_error);
            Err(e.into())
        }
        (Err(e), Ok(())) => Err(e.into()),
    }
}

fn run_fingerprint(json: &str) -> anyhow::Result<()> {
    let value: serde_json::Value = serde_json::from_str(json).context("parsing JSON argument")?;
    println!("{}", content_fingerprint(&value));
    Ok(())
}

fn print_report(report: &IngestReport, format: &OutputFormat) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "database": report.database,
                "entries_read": report.entries_read,
                "entries_skipped": report.entries_skipped,
                "node_batches": report.nodes.batches,
                "document_upserts": report.nodes.documents,
                "author_upserts": report.nodes.authors,
                "relationship_batches": report.relationships.batches,
                "relationship_pairs": report.relationships.pairs,
                "relationships_matched": report.relationships.relationships,
                "retries": report.relationships.retries,
                "elapsed_ms": report.elapsed.as_millis() as u64,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table.set_content_arrangement(ContentArrangement::Dynamic);
            table.set_header(vec!["metric", "value"]);
            table.add_row(vec!["database".to_string(), report.database.clone()]);
            table.add_row(vec!["entries read".to_string(), report.entries_read.to_string()]);
            table.add_row(vec!["entries skipped".to_string(), report.entries_skipped.to_string()]);
            table.add_row(vec!["document upserts".to_string(), report.nodes.documents.to_string()]);
            table.add_row(vec!["author upserts".to_string(), report.nodes.authors.to_string()]);
            table.add_row(vec!["node batches".to_string(), report.nodes.batches.to_string()]);
            table.add_row(vec![
                "relationships matched".to_string(),
                format!("{}/{}", report.relationships.relationships, report.relationships.pairs),
            ]);
            table.add_row(vec![
                "relationship batches".to_string(),
                report.relationships.batches.to_string(),
            ]);
            table.add_row(vec!["retries".to_string(), report.relationships.retries.to_string()]);
            table.add_row(vec!["elapsed".to_string(), format!("{:.2?}", report.elapsed)]);
            println!("{}", table);
        }
    }
    Ok(())
}
