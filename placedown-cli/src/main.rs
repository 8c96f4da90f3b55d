//! Placedown CLI - Command-line interface
//!
//! Builds a compressed export artifact from a JSON document of place
//! records, serving from the artifact cache on repeat runs.

mod error;

use clap::{Parser, ValueEnum};
use error::CliError;
use placedown::cache::{CacheKey, EntityType, ExportCoordinator, ExportFormat, MemoryKvStore};
use placedown::config::ExportConfig;
use placedown::export::model::{Entity, ExportRecord};
use placedown::logging;
use placedown::runner::TokioJobRunner;
use placedown::service::{ExportService, ServeOutcome};
use placedown::source::MemoryRecordSource;
use placedown::stream::BufferSink;
use serde::Deserialize;
use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, ValueEnum)]
enum EntityTypeArg {
    /// A single contributed dataset
    Dataset,
    /// A curated collection of places or datasets
    Collection,
}

impl From<EntityTypeArg> for EntityType {
    fn from(arg: EntityTypeArg) -> Self {
        match arg {
            EntityTypeArg::Dataset => EntityType::Dataset,
            EntityTypeArg::Collection => EntityType::Collection,
        }
    }
}

#[derive(Debug, Clone, ValueEnum)]
enum FormatArg {
    /// Linked Places feature collection (JSON)
    Lpf,
    /// Tab-separated table
    Tsv,
}

impl From<FormatArg> for ExportFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Lpf => ExportFormat::Feature,
            FormatArg::Tsv => ExportFormat::Table,
        }
    }
}

/// Input document: the entity plus its place records.
#[derive(Debug, Deserialize)]
struct InputDoc {
    entity: Entity,
    #[serde(default)]
    records: Vec<ExportRecord>,
}

#[derive(Parser)]
#[command(name = "placedown")]
#[command(about = "Build compressed place-data export artifacts", long_about = None)]
struct Args {
    /// Path to the JSON input document
    #[arg(long)]
    input: String,

    /// Entity kind
    #[arg(long, value_enum, default_value = "dataset")]
    entity_type: EntityTypeArg,

    /// Entity identifier
    #[arg(long)]
    entity_id: i64,

    /// Export format
    #[arg(long, value_enum, default_value = "lpf")]
    format: FormatArg,

    /// Copy the compressed artifact to this path as well
    #[arg(long)]
    output: Option<PathBuf>,

    /// Artifact cache directory (default: platform cache dir)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Rebuild even if a cached artifact exists
    #[arg(long)]
    force: bool,
}

fn main() {
    let args = Args::parse();

    let _logging =
        match logging::init_logging(logging::default_log_dir(), logging::default_log_file()) {
            Ok(guard) => guard,
            Err(err) => CliError::LoggingInit(err.to_string()).exit(),
        };

    if let Err(err) = run(args) {
        err.exit();
    }
}

fn run(args: Args) -> Result<(), CliError> {
    let input = File::open(&args.input).map_err(|err| CliError::Input {
        path: args.input.clone(),
        message: err.to_string(),
    })?;
    let doc: InputDoc = serde_json::from_reader(input).map_err(|err| CliError::Input {
        path: args.input.clone(),
        message: err.to_string(),
    })?;

    let entity_type: EntityType = args.entity_type.clone().into();
    let source = MemoryRecordSource::new();
    source.insert(entity_type, args.entity_id, doc.entity, doc.records);

    // Background jobs need a runtime even though this run is synchronous.
    let runtime = tokio::runtime::Runtime::new().map_err(|err| CliError::Runtime(err.to_string()))?;
    let _guard = runtime.enter();
    let runner = Arc::new(TokioJobRunner::new());

    let mut config = ExportConfig::new();
    if let Some(dir) = &args.cache_dir {
        config = config.with_cache_dir(dir);
    }
    let coordinator = ExportCoordinator::new(Arc::new(MemoryKvStore::new()));
    let service = ExportService::new(coordinator, Arc::new(source), runner, config);

    let key = CacheKey::new(entity_type, args.entity_id, args.format.into());
    if args.force {
        let _ = std::fs::remove_file(key.cache_path(&service.config().cache_dir));
    }

    let mut sink = BufferSink::new();
    let outcome = service.serve(&key, &mut sink, &CancellationToken::new())?;

    match outcome {
        ServeOutcome::CacheHit { bytes } => {
            println!("Served {} bytes from cache", bytes);
        }
        ServeOutcome::BuiltAndCached { summary } => {
            println!(
                "Built and cached {} compressed bytes from {} chunks",
                summary.bytes_out, summary.chunks_in
            );
        }
        ServeOutcome::LiveStream { summary } => {
            println!(
                "Streamed {} compressed bytes without caching",
                summary.bytes_out
            );
        }
    }

    let headers = service.describe_artifact(&key);
    println!(
        "Artifact: {} ({}, {})",
        key.cache_path(&service.config().cache_dir).display(),
        headers.content_type,
        headers.content_encoding
    );

    if let Some(output) = &args.output {
        std::fs::write(output, sink.as_bytes()).map_err(|error| CliError::FileWrite {
            path: output.display().to_string(),
            error,
        })?;
        println!("Wrote {}", output.display());
    }

    Ok(())
}
