//! CLI entry point: ingest a question-answer corpus into the vector index,
//! or run a similarity query against it.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use pqa_search::{
    CorpusReader, Credentials, Embedder, OnnxBackend, OpenSearchStore, Pipeline, Settings,
    VectorDimension,
};

#[derive(Parser)]
#[command(
    name = "pqa-search",
    version,
    about = "Semantic question-answer retrieval over a k-NN vector index"
)]
struct Cli {
    /// Path to a TOML settings file; defaults to pqa.toml in the current
    /// directory plus PQA_-prefixed environment variables
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed the corpus and load it into the vector index
    Ingest {
        /// Corpus file, overriding the configured path
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Maximum records to ingest, overriding the configured cutoff
        #[arg(long)]
        cutoff: Option<usize>,
    },
    /// Embed a query and print the most similar stored questions
    Query {
        /// The question to search for
        text: String,

        /// Neighbors requested from the store, overriding the configured k
        #[arg(long)]
        k: Option<usize>,

        /// Number of results to print
        #[arg(long)]
        limit: Option<usize>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    match cli.command {
        Commands::Ingest { corpus, cutoff } => {
            let path = corpus.unwrap_or_else(|| settings.corpus.path.clone());
            let cutoff = cutoff.map_or(settings.corpus.cutoff, Some);
            let records = CorpusReader::new(path).with_cutoff(cutoff).read()?;

            let pipeline = build_pipeline(&settings)?;
            pipeline.ensure_index()?;
            let report = pipeline.ingest(&records)?;
            println!(
                "Indexed {} records in {} batches",
                report.records_indexed, report.batches
            );
        }
        Commands::Query { text, k, limit } => {
            let k = k.unwrap_or(settings.query.k);
            let limit = limit.unwrap_or(settings.query.print_limit);

            let pipeline = build_pipeline(&settings)?;
            let hits = pipeline.query(&text, k)?;

            println!("Search results:");
            for hit in hits.iter().take(limit) {
                println!();
                println!("Score: {}", hit.score.get());
                println!("Question: {}", hit.question);
                println!("Answer: {}", hit.answer);
            }
        }
    }

    Ok(())
}

fn build_pipeline(settings: &Settings) -> anyhow::Result<Pipeline<OpenSearchStore>> {
    let dimension = VectorDimension::new(settings.embedding.dimension)?;
    let backend = OnnxBackend::from_files(
        &settings.embedding.model_path,
        &settings.embedding.tokenizer_path,
        settings.embedding.max_length,
        dimension,
    )?;
    let embedder = Embedder::new(Box::new(backend));

    let credentials = match (&settings.store.username, &settings.store.password) {
        (Some(username), Some(password)) => Some(Credentials {
            username: username.clone(),
            password: password.clone(),
        }),
        (None, None) => None,
        _ => anyhow::bail!("store.username and store.password must be set together"),
    };
    let store = OpenSearchStore::new(
        &settings.store.endpoint,
        &settings.store.index,
        credentials,
        Duration::from_secs(settings.store.timeout_secs),
        dimension,
    )?;

    Ok(Pipeline::new(embedder, store).with_batch_size(settings.embedding.batch_size))
}
