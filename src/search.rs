//! Lexical, semantic, and hybrid search over the entity corpus.
//!
//! Lexical search runs through the FTS5 mirror with BM25 ranking; semantic
//! search embeds the query and ranks stored vectors by cosine similarity.
//! Hybrid search runs both concurrently and reports the id-union size
//! without merging the two rankings.
//!
//! Fault policy: once the store is initialized, a backend fault inside any
//! search degrades to an empty result list (logged, never raised) — search
//! availability is prioritized over strict correctness reporting, so an
//! empty result is deliberately ambiguous. Calls before initialization
//! still fail with [`crate::Error::NotInitialized`].

use std::collections::HashSet;
use std::sync::Arc;

use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::embedding::{blob_to_vec, cosine_similarity, embed_query, EmbeddingProvider};
use crate::error::Result;
use crate::models::{EntityKind, HybridSearch, Language, SearchResult};
use crate::store::Store;

/// Default cap on the number of results per search mode.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Read-side engine over one [`Store`] and one embedding provider.
pub struct SearchEngine {
    store: Arc<Store>,
    provider: Arc<dyn EmbeddingProvider>,
}

impl SearchEngine {
    pub fn new(store: Arc<Store>, provider: Arc<dyn EmbeddingProvider>) -> Self {
        SearchEngine { store, provider }
    }

    /// Lexical ranked search over content, signature, name, and the
    /// correlation fields (`api_endpoints`, `db_tables`).
    ///
    /// The raw query is preprocessed into a safe FTS5 match expression
    /// (see [`build_match_query`]), so queries like `/api/users/{id}` or
    /// `test_function` need no escaping by the caller.
    pub async fn text_search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let pool = self.store.pool().await?;

        let match_query = match build_match_query(query) {
            Some(q) => q,
            None => return Ok(Vec::new()),
        };

        match fetch_text_candidates(&pool, &match_query, limit).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!(error = %e, query, "text search degraded to empty result");
                Ok(Vec::new())
            }
        }
    }

    /// Semantic search: embed the query, rank the corpus by vector
    /// proximity, nearest first.
    pub async fn semantic_search(&self, query: &str, limit: usize) -> Result<Vec<SearchResult>> {
        let pool = self.store.pool().await?;

        let query_vec = match embed_query(self.provider.as_ref(), query).await {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "query embedding failed; semantic search degraded");
                return Ok(Vec::new());
            }
        };

        match fetch_vector_candidates(&pool, &query_vec, limit).await {
            Ok(results) => Ok(results),
            Err(e) => {
                warn!(error = %e, query, "semantic search degraded to empty result");
                Ok(Vec::new())
            }
        }
    }

    /// Run lexical and semantic search concurrently and report both raw
    /// lists plus the size of their deduplicated id-union. The lists are
    /// not merged into a single ranking.
    pub async fn hybrid_search(&self, query: &str) -> Result<HybridSearch> {
        let (text, semantic) = tokio::join!(
            self.text_search(query, DEFAULT_SEARCH_LIMIT),
            self.semantic_search(query, DEFAULT_SEARCH_LIMIT),
        );
        let text = text?;
        let semantic = semantic?;

        let combined: HashSet<&str> = text
            .iter()
            .map(|r| r.id.as_str())
            .chain(semantic.iter().map(|r| r.id.as_str()))
            .collect();

        Ok(HybridSearch {
            combined_count: combined.len(),
            text,
            semantic,
        })
    }

    /// Surface near-duplicate or structurally similar code: identical
    /// mechanics to [`semantic_search`](SearchEngine::semantic_search),
    /// with a code snippet as the query text.
    pub async fn find_similar_code(&self, snippet: &str, limit: usize) -> Result<Vec<SearchResult>> {
        self.semantic_search(snippet, limit).await
    }
}

/// Turn a raw user query into a safe FTS5 match expression.
///
/// Splits on every non-alphanumeric character and double-quotes each token
/// (implicit AND between tokens), so FTS5 operators and punctuation in the
/// raw query cannot produce syntax errors. Returns `None` when the query
/// contains no tokens.
fn build_match_query(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{}\"", t))
        .collect();

    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

async fn fetch_text_candidates(
    pool: &SqlitePool,
    match_query: &str,
    limit: usize,
) -> std::result::Result<Vec<SearchResult>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT e.id, e.name, e.fqn, e.kind, e.file, e.line_start, e.line_end,
               e.language, e.signature, entities_fts.rank AS rank,
               snippet(entities_fts, 3, '>>>', '<<<', '...', 32) AS snippet
        FROM entities_fts
        JOIN entities e ON e.id = entities_fts.entity_id
        WHERE entities_fts MATCH ?
        ORDER BY rank
        LIMIT ?
        "#,
    )
    .bind(match_query)
    .bind(limit as i64)
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let rank: f64 = row.try_get("rank")?;
            let snippet: String = row.try_get("snippet")?;
            // Negate BM25 rank so higher = better.
            result_from_row(row, -rank, snippet)
        })
        .collect()
}

async fn fetch_vector_candidates(
    pool: &SqlitePool,
    query_vec: &[f32],
    limit: usize,
) -> std::result::Result<Vec<SearchResult>, sqlx::Error> {
    let rows = sqlx::query(
        r#"
        SELECT e.id, e.name, e.fqn, e.kind, e.file, e.line_start, e.line_end,
               e.language, e.signature, v.embedding,
               COALESCE(substr(e.content, 1, 240), '') AS snippet
        FROM entity_vectors v
        JOIN entities e ON e.id = v.entity_id
        "#,
    )
    .fetch_all(pool)
    .await?;

    let mut results: Vec<SearchResult> = rows
        .iter()
        .map(|row| {
            let blob: Vec<u8> = row.try_get("embedding")?;
            let snippet: String = row.try_get("snippet")?;
            let similarity = cosine_similarity(query_vec, &blob_to_vec(&blob)) as f64;
            result_from_row(row, similarity, snippet)
        })
        .collect::<std::result::Result<_, sqlx::Error>>()?;

    // Nearest first; id tiebreak keeps ordering deterministic.
    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.id.cmp(&b.id))
    });
    results.truncate(limit);

    Ok(results)
}

fn result_from_row(
    row: &sqlx::sqlite::SqliteRow,
    score: f64,
    snippet: String,
) -> std::result::Result<SearchResult, sqlx::Error> {
    let kind: String = row.try_get("kind")?;
    let language: String = row.try_get("language")?;

    Ok(SearchResult {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        fqn: row.try_get("fqn")?,
        kind: EntityKind::parse(&kind),
        file: row.try_get("file")?,
        line_start: row.try_get("line_start")?,
        line_end: row.try_get("line_end")?,
        language: Language::parse(&language),
        signature: row.try_get("signature")?,
        snippet,
        score,
    })
}
