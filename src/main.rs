use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use semprint::config::Config;
use semprint::embedding::{Embedder, TeiModel};
use semprint::error::Result;
use semprint::store::StoreHandle;
use semprint::types::{VectorId, VectorRecord};
use semprint::VectorStoreManager;

#[derive(Parser)]
#[command(name = "semprint", about = "Sentence fingerprints backed by a vector index")]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Print Prometheus metrics after the command finishes.
    #[arg(long, global = true)]
    print_metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Store a few sentences, find the closest one to a new sentence, clean up.
    Similarity {
        #[arg(long, default_value = "example_collection")]
        collection: String,
        #[arg(long, default_value_t = 10)]
        top_k: usize,
    },
    /// Print the fingerprint of each sentence as JSON.
    Embed { sentences: Vec<String> },
    /// Count stored vectors across collections (all when none are given).
    Count { collections: Vec<String> },
    /// List every id stored in a collection.
    Ids { collection: String },
    /// Drop a collection.
    Drop { collection: String },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).expect("failed to load config");

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format.as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .init();
        }
    }

    semprint::metrics::init();

    let outcome = run(cli.command, &config).await;

    if cli.print_metrics {
        print!("{}", semprint::metrics::render());
    }

    if let Err(e) = outcome {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(command: Command, config: &Config) -> Result<()> {
    match command {
        Command::Similarity { collection, top_k } => similarity(config, &collection, top_k).await,
        Command::Embed { sentences } => {
            let embedder = connect_embedder(config).await?;
            let vectors = embedder.embed_all(sentences.as_slice()).await?;
            println!("{}", serde_json::to_string(&vectors)?);
            Ok(())
        }
        Command::Count { collections } => {
            let manager = connect_manager(config).await?;
            let names: Vec<&str> = collections.iter().map(String::as_str).collect();
            let count = manager.count_vectors(&names).await?;
            println!("{}", serde_json::to_string(&count)?);
            Ok(())
        }
        Command::Ids { collection } => {
            let manager = connect_manager(config).await?;
            let listing = manager.list_node_ids(&collection).await?;
            println!("{}", serde_json::to_string(&listing)?);
            Ok(())
        }
        Command::Drop { collection } => {
            let manager = connect_manager(config).await?;
            manager.delete_collection(&collection).await
        }
    }
}

async fn connect_embedder(config: &Config) -> Result<Embedder> {
    let model = Arc::new(TeiModel::connect(&config.embedding).await?);
    Embedder::from_model(model, config.embedding.max_length, config.index.dimension)
}

async fn connect_manager(config: &Config) -> Result<VectorStoreManager> {
    let handle = StoreHandle::connect(&config.store).await?;
    Ok(VectorStoreManager::new(handle, config.index.clone()))
}

async fn similarity(config: &Config, collection: &str, top_k: usize) -> Result<()> {
    let embedder = connect_embedder(config).await?;
    let manager = connect_manager(config).await?;

    let sentences: BTreeMap<VectorId, &str> = [
        (0, "we are having problems with the model"),
        (1, "the model is working very well"),
        (2, "the sun is very hot today"),
        (3, "today is a cloudy day"),
    ]
    .into_iter()
    .collect();

    let texts: Vec<&str> = sentences.values().copied().collect();
    let vectors = embedder.embed_all(texts.as_slice()).await?;
    let records: Vec<VectorRecord> = sentences
        .keys()
        .zip(vectors)
        .map(|(id, v)| VectorRecord::new(*id, v))
        .collect();

    manager
        .ensure_collection(collection, embedder.dimension())
        .await?;
    manager.insert(collection, None, &records).await?;

    let probe = "it is too sweaty today";
    let query = embedder.embed_one(probe).await?;
    let results = manager.query(collection, None, &[query], top_k).await?;

    println!("closest to {probe:?}:");
    for hit in results.first().map(Vec::as_slice).unwrap_or_default() {
        let text = sentences.get(&hit.id).copied().unwrap_or("<unknown>");
        println!("  {:>8.4}  {text}", hit.distance);
    }

    manager.delete_collection(collection).await
}
