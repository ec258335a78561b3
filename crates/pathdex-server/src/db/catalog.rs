//! Loading and flushing the catalog mirror.
//!
//! Versions are interned in `game_versions` and referenced by id from
//! every other table. Load reads the full mirror into memory; flush
//! applies one cycle's [`ChangeSet`] inside a single transaction so an
//! aborted cycle leaves the stored catalog untouched.

use std::collections::HashMap;

use sqlx::{PgPool, Postgres, QueryBuilder, Transaction};
use tracing::{debug, info};

use pathdex_common::{FullKey, GameVersion, IndexId, OnePartKey, TwoPartKey};

use crate::catalog::{CatalogState, ChangeSet, PathEntry, StagingEntry1, StagingEntry2};

use super::{DbError, DbResult};

// Keeps each batched statement well under Postgres's bind limit.
const UPSERT_CHUNK_SIZE: usize = 500;

#[derive(sqlx::FromRow)]
struct VersionRow {
    id: i64,
    year: i32,
    month: i32,
    day: i32,
    part: i32,
    revision: i32,
    is_special: bool,
    comment: Option<String>,
}

impl VersionRow {
    fn into_version(self) -> GameVersion {
        let mut version = GameVersion::new(
            self.year as u32,
            self.month as u32,
            self.day as u32,
            self.part as u32,
            self.revision as u32,
        );
        version.is_special = self.is_special;
        version.comment = self.comment;
        version
    }
}

#[derive(sqlx::FromRow)]
struct PathRow {
    index_id: i64,
    folder_hash: i64,
    file_hash: i64,
    full_hash: i64,
    path: Option<String>,
    first_seen_id: i64,
    last_seen_id: i64,
}

#[derive(sqlx::FromRow)]
struct StagingTwoPartRow {
    index_id: i64,
    folder_hash: i64,
    file_hash: i64,
    first_seen_id: i64,
    last_seen_id: i64,
}

#[derive(sqlx::FromRow)]
struct StagingOnePartRow {
    index_id: i64,
    full_hash: i64,
    first_seen_id: i64,
    last_seen_id: i64,
}

#[derive(sqlx::FromRow)]
struct LatestIndexRow {
    index_id: i64,
    game_version_id: i64,
}

#[derive(sqlx::FromRow)]
struct LatestProcessedRow {
    repo: String,
    game_version_id: i64,
}

fn resolve_version(
    versions: &HashMap<i64, GameVersion>,
    id: i64,
    table: &str,
) -> DbResult<GameVersion> {
    versions
        .get(&id)
        .cloned()
        .ok_or_else(|| DbError::inconsistent(format!("{table} references missing version id {id}")))
}

/// Load the entire stored catalog into an in-memory mirror
pub async fn load_state(pool: &PgPool) -> DbResult<CatalogState> {
    let mut state = CatalogState::new();

    let version_rows = sqlx::query_as::<_, VersionRow>(
        "SELECT id, year, month, day, part, revision, is_special, comment FROM game_versions",
    )
    .fetch_all(pool)
    .await?;

    let mut versions = HashMap::with_capacity(version_rows.len());
    for row in version_rows {
        versions.insert(row.id, row.into_version());
    }

    let path_rows = sqlx::query_as::<_, PathRow>(
        r#"
        SELECT index_id, folder_hash, file_hash, full_hash, path, first_seen_id, last_seen_id
        FROM paths
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in path_rows {
        state.load_path(PathEntry {
            key: FullKey::new(
                IndexId(row.index_id as u32),
                row.folder_hash as u32,
                row.file_hash as u32,
                row.full_hash as u32,
            ),
            path: row.path,
            first_seen: resolve_version(&versions, row.first_seen_id, "paths")?,
            last_seen: resolve_version(&versions, row.last_seen_id, "paths")?,
        });
    }

    let staging1_rows = sqlx::query_as::<_, StagingTwoPartRow>(
        r#"
        SELECT index_id, folder_hash, file_hash, first_seen_id, last_seen_id
        FROM staging_two_part
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in staging1_rows {
        state.load_staging1(StagingEntry1 {
            key: TwoPartKey {
                index_id: IndexId(row.index_id as u32),
                folder_hash: row.folder_hash as u32,
                file_hash: row.file_hash as u32,
            },
            first_seen: resolve_version(&versions, row.first_seen_id, "staging_two_part")?,
            last_seen: resolve_version(&versions, row.last_seen_id, "staging_two_part")?,
        });
    }

    let staging2_rows = sqlx::query_as::<_, StagingOnePartRow>(
        r#"
        SELECT index_id, full_hash, first_seen_id, last_seen_id
        FROM staging_one_part
        "#,
    )
    .fetch_all(pool)
    .await?;
    for row in staging2_rows {
        state.load_staging2(StagingEntry2 {
            key: OnePartKey {
                index_id: IndexId(row.index_id as u32),
                full_hash: row.full_hash as u32,
            },
            first_seen: resolve_version(&versions, row.first_seen_id, "staging_one_part")?,
            last_seen: resolve_version(&versions, row.last_seen_id, "staging_one_part")?,
        });
    }

    let latest_index_rows = sqlx::query_as::<_, LatestIndexRow>(
        "SELECT index_id, game_version_id FROM latest_indexes",
    )
    .fetch_all(pool)
    .await?;
    for row in latest_index_rows {
        let version = resolve_version(&versions, row.game_version_id, "latest_indexes")?;
        state.load_latest_index(IndexId(row.index_id as u32), version);
    }

    let latest_processed_rows = sqlx::query_as::<_, LatestProcessedRow>(
        "SELECT repo, game_version_id FROM latest_processed_versions",
    )
    .fetch_all(pool)
    .await?;
    for row in latest_processed_rows {
        let version =
            resolve_version(&versions, row.game_version_id, "latest_processed_versions")?;
        state.load_latest_processed(row.repo, version);
    }

    info!(
        confirmed = state.confirmed_len(),
        staged = state.staged_len(),
        "Loaded catalog mirror"
    );
    Ok(state)
}

/// Intern a version, returning its stable id
async fn ensure_version_id(
    tx: &mut Transaction<'_, Postgres>,
    cache: &mut HashMap<GameVersion, i64>,
    version: &GameVersion,
) -> DbResult<i64> {
    if let Some(id) = cache.get(version) {
        return Ok(*id);
    }

    // Annotations never weaken: the special flag sticks once set and a
    // stored comment is not replaced.
    let (id,): (i64,) = sqlx::query_as(
        r#"
        INSERT INTO game_versions (year, month, day, part, revision, is_special, comment)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        ON CONFLICT (year, month, day, part, revision)
        DO UPDATE SET
            is_special = game_versions.is_special OR EXCLUDED.is_special,
            comment = COALESCE(game_versions.comment, EXCLUDED.comment)
        RETURNING id
        "#,
    )
    .bind(version.year as i32)
    .bind(version.month as i32)
    .bind(version.day as i32)
    .bind(version.part as i32)
    .bind(version.revision as i32)
    .bind(version.is_special)
    .bind(version.comment.as_deref())
    .fetch_one(&mut **tx)
    .await?;

    cache.insert(version.clone(), id);
    Ok(id)
}

struct PathUpsert<'a> {
    key: FullKey,
    path: Option<&'a str>,
    first_seen_id: i64,
    last_seen_id: i64,
}

struct StagingUpsert1 {
    key: TwoPartKey,
    first_seen_id: i64,
    last_seen_id: i64,
}

struct StagingUpsert2 {
    key: OnePartKey,
    first_seen_id: i64,
    last_seen_id: i64,
}

async fn upsert_paths(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[PathUpsert<'_>],
) -> DbResult<()> {
    for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO paths (index_id, folder_hash, file_hash, full_hash, path, first_seen_id, last_seen_id) ",
        );
        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(i64::from(row.key.index_id.0))
                .push_bind(i64::from(row.key.folder_hash))
                .push_bind(i64::from(row.key.file_hash))
                .push_bind(i64::from(row.key.full_hash))
                .push_bind(row.path)
                .push_bind(row.first_seen_id)
                .push_bind(row.last_seen_id);
        });
        // A stored string is never replaced or cleared; ranges come from
        // memory where they already only widen.
        query_builder.push(
            r#"
            ON CONFLICT (index_id, folder_hash, file_hash, full_hash)
            DO UPDATE SET
                path = COALESCE(paths.path, EXCLUDED.path),
                first_seen_id = EXCLUDED.first_seen_id,
                last_seen_id = EXCLUDED.last_seen_id
            "#,
        );
        query_builder.build().execute(&mut **tx).await?;
    }
    Ok(())
}

async fn upsert_staging1(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[StagingUpsert1],
) -> DbResult<()> {
    for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO staging_two_part (index_id, folder_hash, file_hash, first_seen_id, last_seen_id) ",
        );
        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(i64::from(row.key.index_id.0))
                .push_bind(i64::from(row.key.folder_hash))
                .push_bind(i64::from(row.key.file_hash))
                .push_bind(row.first_seen_id)
                .push_bind(row.last_seen_id);
        });
        query_builder.push(
            r#"
            ON CONFLICT (index_id, folder_hash, file_hash)
            DO UPDATE SET
                first_seen_id = EXCLUDED.first_seen_id,
                last_seen_id = EXCLUDED.last_seen_id
            "#,
        );
        query_builder.build().execute(&mut **tx).await?;
    }
    Ok(())
}

async fn upsert_staging2(
    tx: &mut Transaction<'_, Postgres>,
    rows: &[StagingUpsert2],
) -> DbResult<()> {
    for chunk in rows.chunks(UPSERT_CHUNK_SIZE) {
        let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
            "INSERT INTO staging_one_part (index_id, full_hash, first_seen_id, last_seen_id) ",
        );
        query_builder.push_values(chunk, |mut b, row| {
            b.push_bind(i64::from(row.key.index_id.0))
                .push_bind(i64::from(row.key.full_hash))
                .push_bind(row.first_seen_id)
                .push_bind(row.last_seen_id);
        });
        query_builder.push(
            r#"
            ON CONFLICT (index_id, full_hash)
            DO UPDATE SET
                first_seen_id = EXCLUDED.first_seen_id,
                last_seen_id = EXCLUDED.last_seen_id
            "#,
        );
        query_builder.build().execute(&mut **tx).await?;
    }
    Ok(())
}

/// Apply one cycle's changes to storage in a single transaction
pub async fn flush(pool: &PgPool, state: &CatalogState, changes: &ChangeSet) -> DbResult<()> {
    if changes.is_empty() {
        debug!("No catalog changes to flush");
        return Ok(());
    }

    let mut tx = pool.begin().await?;
    let mut version_ids: HashMap<GameVersion, i64> = HashMap::new();

    let mut path_rows = Vec::with_capacity(changes.paths.len());
    for key in &changes.paths {
        let Some(entry) = state.path(key) else {
            return Err(DbError::inconsistent(format!(
                "dirty path {key} missing from mirror"
            )));
        };
        let first_seen_id = ensure_version_id(&mut tx, &mut version_ids, &entry.first_seen).await?;
        let last_seen_id = ensure_version_id(&mut tx, &mut version_ids, &entry.last_seen).await?;
        path_rows.push(PathUpsert {
            key: *key,
            path: entry.path.as_deref(),
            first_seen_id,
            last_seen_id,
        });
    }
    upsert_paths(&mut tx, &path_rows).await?;

    let mut staging1_rows = Vec::with_capacity(changes.staging1_upserts.len());
    for key in &changes.staging1_upserts {
        let Some(entry) = state.staging1(key) else {
            return Err(DbError::inconsistent(format!(
                "dirty staging row {key} missing from mirror"
            )));
        };
        let first_seen_id = ensure_version_id(&mut tx, &mut version_ids, &entry.first_seen).await?;
        let last_seen_id = ensure_version_id(&mut tx, &mut version_ids, &entry.last_seen).await?;
        staging1_rows.push(StagingUpsert1 {
            key: *key,
            first_seen_id,
            last_seen_id,
        });
    }
    upsert_staging1(&mut tx, &staging1_rows).await?;

    let mut staging2_rows = Vec::with_capacity(changes.staging2_upserts.len());
    for key in &changes.staging2_upserts {
        let Some(entry) = state.staging2(key) else {
            return Err(DbError::inconsistent(format!(
                "dirty staging row {key} missing from mirror"
            )));
        };
        let first_seen_id = ensure_version_id(&mut tx, &mut version_ids, &entry.first_seen).await?;
        let last_seen_id = ensure_version_id(&mut tx, &mut version_ids, &entry.last_seen).await?;
        staging2_rows.push(StagingUpsert2 {
            key: *key,
            first_seen_id,
            last_seen_id,
        });
    }
    upsert_staging2(&mut tx, &staging2_rows).await?;

    for key in &changes.staging1_deletes {
        sqlx::query(
            "DELETE FROM staging_two_part WHERE index_id = $1 AND folder_hash = $2 AND file_hash = $3",
        )
        .bind(i64::from(key.index_id.0))
        .bind(i64::from(key.folder_hash))
        .bind(i64::from(key.file_hash))
        .execute(&mut *tx)
        .await?;
    }

    for key in &changes.staging2_deletes {
        sqlx::query("DELETE FROM staging_one_part WHERE index_id = $1 AND full_hash = $2")
            .bind(i64::from(key.index_id.0))
            .bind(i64::from(key.full_hash))
            .execute(&mut *tx)
            .await?;
    }

    for index_id in &changes.latest_indexes {
        let Some(version) = state.latest_index_version(*index_id) else {
            return Err(DbError::inconsistent(format!(
                "dirty segment {index_id} missing from version ledger"
            )));
        };
        let version_id = ensure_version_id(&mut tx, &mut version_ids, version).await?;
        sqlx::query(
            r#"
            INSERT INTO latest_indexes (index_id, game_version_id)
            VALUES ($1, $2)
            ON CONFLICT (index_id) DO UPDATE SET game_version_id = EXCLUDED.game_version_id
            "#,
        )
        .bind(i64::from(index_id.0))
        .bind(version_id)
        .execute(&mut *tx)
        .await?;
    }

    for repo in &changes.latest_processed {
        let Some(version) = state.latest_processed_version(repo) else {
            return Err(DbError::inconsistent(format!(
                "dirty repo '{repo}' missing from version ledger"
            )));
        };
        let version_id = ensure_version_id(&mut tx, &mut version_ids, version).await?;
        sqlx::query(
            r#"
            INSERT INTO latest_processed_versions (repo, game_version_id)
            VALUES ($1, $2)
            ON CONFLICT (repo) DO UPDATE SET game_version_id = EXCLUDED.game_version_id
            "#,
        )
        .bind(repo)
        .bind(version_id)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;

    info!(
        paths = changes.paths.len(),
        staging_upserts = changes.staging1_upserts.len() + changes.staging2_upserts.len(),
        staging_deletes = changes.staging1_deletes.len() + changes.staging2_deletes.len(),
        "Flushed catalog changes"
    );
    Ok(())
}
