//! # symdex CLI
//!
//! The `symdex` binary drives the hybrid code-entity index. It provides
//! commands for index initialization, entity ingestion, lexical/semantic/
//! hybrid search, similar-code lookup, point retrieval, and statistics.
//!
//! ## Usage
//!
//! ```bash
//! symdex --config ./symdex.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `symdex init` | Create the index directory and provision the schema |
//! | `symdex add <file.json>` | Ingest one entity (object) or many (array) |
//! | `symdex search "<query>"` | Search entities (text, semantic, or hybrid) |
//! | `symdex similar <snippet-file>` | Find code similar to a snippet |
//! | `symdex get <id>` | Retrieve a full entity by id |
//! | `symdex stats` | Print corpus statistics |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the index
//! symdex init --config ./symdex.toml
//!
//! # Ingest extractor output
//! symdex add entities.json
//!
//! # Lexical search
//! symdex search "calculate"
//!
//! # Hybrid search (lexical + semantic)
//! symdex search "mathematical operation" --mode hybrid
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};

use symdex::config::{load_config, Config};
use symdex::embedding::create_provider;
use symdex::ingest::Ingestor;
use symdex::models::SearchResult;
use symdex::search::SearchEngine;
use symdex::stats::get_statistics;
use symdex::store::Store;

/// symdex CLI — a hybrid lexical + semantic search index over code
/// entities extracted from multi-language source trees.
#[derive(Parser)]
#[command(
    name = "symdex",
    about = "symdex — hybrid lexical + semantic search over code entities",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./symdex.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the index directory and database schema.
    ///
    /// Idempotent — running it multiple times is safe, and an existing
    /// index is opened without data loss.
    Init,

    /// Ingest entities from a JSON file.
    ///
    /// The file holds either a single entity object or an array of them.
    /// Arrays are ingested as a batch: invalid items are skipped and the
    /// count of persisted items is printed.
    Add {
        /// Path to the JSON payload file.
        file: PathBuf,
    },

    /// Search the corpus.
    Search {
        /// Query text (free text or code tokens).
        query: String,

        /// Search mode: text, semantic, or hybrid.
        #[arg(long, default_value = "text")]
        mode: String,

        /// Maximum number of results per mode.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Find entities similar to a code snippet.
    Similar {
        /// Path to a file holding the code snippet.
        file: PathBuf,

        /// Maximum number of results.
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Retrieve a full entity by id (JSON output).
    Get {
        /// Entity id, e.g. `func_test.py_calculate_42`.
        id: String,
    },

    /// Print corpus statistics.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    let store = Arc::new(Store::new(&config.index.path));

    match cli.command {
        Commands::Init => {
            store.initialize().await?;
            println!("initialized index at {}", config.index.path.display());
        }
        Commands::Add { file } => {
            store.initialize().await?;
            let ingestor = build_ingestor(&config, &store)?;

            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read payload file: {}", file.display()))?;
            let value: serde_json::Value =
                serde_json::from_str(&content).context("Payload file is not valid JSON")?;

            match value {
                serde_json::Value::Array(items) => {
                    let total = items.len();
                    let count = ingestor.add_entities_batch(items).await?;
                    println!("ingested {} / {} entities", count, total);
                }
                object => {
                    let entity = ingestor.add_entity(object).await?;
                    println!("ingested {}", entity.id);
                }
            }
        }
        Commands::Search { query, mode, limit } => {
            store.initialize().await?;
            let engine = build_engine(&config, &store)?;
            let limit = limit.unwrap_or(config.retrieval.limit);

            match mode.as_str() {
                "text" => print_results(&engine.text_search(&query, limit).await?),
                "semantic" => print_results(&engine.semantic_search(&query, limit).await?),
                "hybrid" => {
                    let hybrid = engine.hybrid_search(&query).await?;
                    println!("text results:");
                    print_results(&hybrid.text);
                    println!();
                    println!("semantic results:");
                    print_results(&hybrid.semantic);
                    println!();
                    println!("combined: {} distinct entities", hybrid.combined_count);
                }
                other => bail!("Unknown search mode: {}. Use text, semantic, or hybrid.", other),
            }
        }
        Commands::Similar { file, limit } => {
            store.initialize().await?;
            let engine = build_engine(&config, &store)?;
            let limit = limit.unwrap_or(config.retrieval.limit);

            let snippet = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read snippet file: {}", file.display()))?;
            print_results(&engine.find_similar_code(&snippet, limit).await?);
        }
        Commands::Get { id } => {
            store.initialize().await?;
            match store.get_by_id(&id).await? {
                Some(entity) => println!("{}", serde_json::to_string_pretty(&entity)?),
                None => {
                    println!("not found: {}", id);
                }
            }
        }
        Commands::Stats => {
            store.initialize().await?;
            let stats = get_statistics(&store).await?;

            println!("symdex — Index Stats");
            println!("====================");
            println!();
            println!("  Index:      {}", config.index.path.display());
            println!("  Entities:   {}", stats.total_entities);
            println!("  Files:      {}", stats.total_files);
            println!("  Size:       {:.2} MB", stats.index_size_mb);
            println!("  Computed:   {}", stats.last_updated);

            if !stats.entities_by_kind.is_empty() {
                println!();
                println!("  By kind:");
                for (kind, count) in &stats.entities_by_kind {
                    println!("    {:<16} {:>6}", kind, count);
                }
            }
            if !stats.entities_by_language.is_empty() {
                println!();
                println!("  By language:");
                for (language, count) in &stats.entities_by_language {
                    println!("    {:<16} {:>6}", language, count);
                }
            }
        }
    }

    store.close().await;
    Ok(())
}

fn build_ingestor(config: &Config, store: &Arc<Store>) -> Result<Ingestor> {
    let provider = create_provider(&config.embedding)?;
    Ok(Ingestor::new(store.clone(), provider))
}

fn build_engine(config: &Config, store: &Arc<Store>) -> Result<SearchEngine> {
    let provider = create_provider(&config.embedding)?;
    Ok(SearchEngine::new(store.clone(), provider))
}

fn print_results(results: &[SearchResult]) {
    if results.is_empty() {
        println!("No results.");
        return;
    }

    for (i, result) in results.iter().enumerate() {
        println!(
            "{}. [{:.3}] {} ({}, {})",
            i + 1,
            result.score,
            result.fqn,
            result.kind,
            result.language
        );
        println!("    {}:{}-{}", result.file, result.line_start, result.line_end);
        if !result.signature.is_empty() {
            println!("    {}", result.signature);
        }
        println!(
            "    excerpt: \"{}\"",
            result.snippet.replace('\n', " ").trim()
        );
        println!();
    }
}
