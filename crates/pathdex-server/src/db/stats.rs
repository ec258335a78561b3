//! Read-side catalog queries.
//!
//! These run straight against storage so the API can answer without
//! taking the writer lock or loading the mirror.

use futures::TryStreamExt;
use sqlx::PgPool;

use pathdex_common::IndexId;

use crate::catalog::{CatalogStats, IndexStats};

use super::DbResult;

#[derive(sqlx::FromRow)]
struct StatsRow {
    index_id: i64,
    total_paths: i64,
    paths_with_string: i64,
}

/// Per-segment aggregates, all-time and restricted to the live release
pub async fn query_stats(pool: &PgPool) -> DbResult<CatalogStats> {
    let mut stats = CatalogStats::default();

    let totals = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT index_id,
               COUNT(*) AS total_paths,
               COUNT(path) AS paths_with_string
        FROM paths
        GROUP BY index_id
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in totals {
        stats.totals.insert(
            IndexId(row.index_id as u32),
            IndexStats {
                total_paths: row.total_paths as u64,
                paths_with_string: row.paths_with_string as u64,
            },
        );
    }

    // An entry counts as current only if its last sighting is the
    // segment's latest observed version.
    let current = sqlx::query_as::<_, StatsRow>(
        r#"
        SELECT p.index_id,
               COUNT(*) AS total_paths,
               COUNT(p.path) AS paths_with_string
        FROM paths p
        JOIN latest_indexes li
          ON li.index_id = p.index_id
         AND li.game_version_id = p.last_seen_id
        GROUP BY p.index_id
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in current {
        stats.current.insert(
            IndexId(row.index_id as u32),
            IndexStats {
                total_paths: row.total_paths as u64,
                paths_with_string: row.paths_with_string as u64,
            },
        );
    }

    Ok(stats)
}

/// Every known path string, deduplicated and sorted
pub async fn export_paths(pool: &PgPool) -> DbResult<Vec<String>> {
    let mut rows = sqlx::query_scalar::<_, String>(
        "SELECT DISTINCT path FROM paths WHERE path IS NOT NULL ORDER BY path",
    )
    .fetch(pool);

    let mut paths = Vec::new();
    while let Some(path) = rows.try_next().await? {
        paths.push(path);
    }
    Ok(paths)
}
