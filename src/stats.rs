//! Corpus statistics aggregation.
//!
//! Statistics are best-effort telemetry: after initialization, any backend
//! failure degrades to a zeroed snapshot instead of raising, so callers
//! can always render a dashboard or health line. `last_updated` records
//! when the snapshot was computed, not when the corpus last changed.

use std::collections::BTreeMap;

use sqlx::{Row, SqlitePool};
use tracing::warn;

use crate::error::Result;
use crate::models::Statistics;
use crate::store::Store;

/// Compute a statistics snapshot over the whole corpus.
///
/// Fails with [`crate::Error::NotInitialized`] before `initialize()`;
/// afterwards it never raises — a backend fault yields
/// [`Statistics::empty`].
pub async fn get_statistics(store: &Store) -> Result<Statistics> {
    let pool = store.pool().await?;

    match compute(store, &pool).await {
        Ok(stats) => Ok(stats),
        Err(e) => {
            warn!(error = %e, "statistics degraded to empty snapshot");
            Ok(Statistics::empty())
        }
    }
}

async fn compute(store: &Store, pool: &SqlitePool) -> Result<Statistics> {
    let total_entities: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entities")
        .fetch_one(pool)
        .await?;

    let entities_by_kind = group_count(pool, "kind").await?;
    let entities_by_language = group_count(pool, "language").await?;

    let total_files: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT file) FROM entities")
        .fetch_one(pool)
        .await?;

    let index_size_mb = store.estimated_size().await? as f64 / (1024.0 * 1024.0);

    Ok(Statistics {
        total_entities,
        entities_by_kind,
        entities_by_language,
        total_files,
        index_size_mb,
        last_updated: chrono::Utc::now().to_rfc3339(),
    })
}

/// Count entities grouped by one column. `column` is a fixed identifier
/// supplied by this module, never caller input.
async fn group_count(pool: &SqlitePool, column: &str) -> Result<BTreeMap<String, i64>> {
    let rows = sqlx::query(&format!(
        "SELECT {col} AS tag, COUNT(*) AS n FROM entities GROUP BY {col}",
        col = column
    ))
    .fetch_all(pool)
    .await?;

    let mut counts = BTreeMap::new();
    for row in &rows {
        let tag: String = row.try_get("tag")?;
        let n: i64 = row.try_get("n")?;
        counts.insert(tag, n);
    }
    Ok(counts)
}
