//! # symdex
//!
//! A hybrid lexical + semantic search index over code entities extracted
//! from multi-language source trees.
//!
//! symdex stores one record per code entity (function, class, method,
//! migration, ...) and keeps two retrieval paradigms consistent over the
//! same corpus: token-based full-text search through SQLite FTS5, and
//! nearest-neighbor search over 384-dimensional embedding vectors.
//! Structural metadata (inheritance, calls) and cross-language correlation
//! keys (API endpoints, database tables) are stored alongside and indexed
//! for lexical lookup.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌───────────────┐
//! │ Extractors │──▶│  Ingestor    │──▶│    SQLite      │
//! │ (payloads) │   │ Validate+    │   │ entities      │
//! └────────────┘   │ Embed        │   │ + FTS5        │
//!                  └─────────────┘   │ + vectors     │
//!                                    └───────┬───────┘
//!                                            │
//!                            ┌───────────────┤
//!                            ▼               ▼
//!                     ┌────────────┐  ┌────────────┐
//!                     │ SearchEngine│  │ Statistics │
//!                     │ text/sem/   │  │            │
//!                     │ hybrid      │  │            │
//!                     └────────────┘  └────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use symdex::embedding::HashProvider;
//! use symdex::ingest::Ingestor;
//! use symdex::search::SearchEngine;
//! use symdex::store::Store;
//!
//! # async fn run() -> symdex::Result<()> {
//! let store = Arc::new(Store::new("/tmp/my-index"));
//! store.initialize().await?;
//!
//! let provider = Arc::new(HashProvider::default());
//! let ingestor = Ingestor::new(store.clone(), provider.clone());
//! ingestor
//!     .add_entity(serde_json::json!({
//!         "id": "func_test.py_calculate_42",
//!         "name": "calculate",
//!         "fqn": "test.py::calculate",
//!         "kind": "function",
//!         "content": "def calculate(x, y): return x + y",
//!         "file": "test.py",
//!         "line_start": 42
//!     }))
//!     .await?;
//!
//! let engine = SearchEngine::new(store.clone(), provider);
//! let hits = engine.text_search("calculate", 10).await?;
//! assert!(!hits.is_empty());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Entity model, search projections, statistics |
//! | [`payload`] | Dynamic ingestion payloads and validation |
//! | [`embedding`] | Embedding provider abstraction |
//! | [`store`] | SQLite storage engine and schema |
//! | [`ingest`] | Ingestion pipeline |
//! | [`search`] | Lexical, semantic, and hybrid search |
//! | [`stats`] | Corpus statistics |
//! | [`config`] | TOML configuration for the CLI |
//! | [`error`] | Error taxonomy |

pub mod config;
pub mod db;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod models;
pub mod payload;
pub mod search;
pub mod stats;
pub mod store;

pub use error::{Error, Result};
