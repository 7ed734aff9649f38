//! Database layer: migrations, exchange writes and task queries.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::info;

use crate::errors::{ApiError, Result};
use crate::records::{
    ExchangeCreated, ExchangeRecord, ExchangeRow, ExchangeStatus, NewExchange, StoredFile,
    TaskSummary,
};

/// Establish a SQLite connection pool and run pending migrations.
pub async fn init_pool(database_url: &str) -> Result<SqlitePool> {
    let url = if database_url.starts_with("sqlite:") {
        database_url.to_string()
    } else {
        format!("sqlite:{database_url}")
    };
    // Make sure the file is created if it doesn't exist yet.
    let options = SqliteConnectOptions::from_str(&url)?.create_if_missing(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    migrate(&pool).await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    info!("Database migrations applied successfully");
    Ok(())
}

// ─────────────────────────────────────────────────────────
// Exchange writes
// ─────────────────────────────────────────────────────────

/// Insert both records of an exchange and its file rows in one transaction.
pub async fn insert_exchange(pool: &SqlitePool, new: &NewExchange) -> Result<ExchangeCreated> {
    let status = ExchangeStatus::Pending;
    let offered = serde_json::to_string(&new.offered)?;
    let expected = serde_json::to_string(&new.expected)?;

    let mut tx = pool.begin().await?;
    let id = sqlx::query(
        r#"
        INSERT INTO exchanges
            (name, typeofexchange, enddate, status, offered_details, expected_details, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
    )
    .bind(new.name())
    .bind(new.type_of_exchange())
    .bind(new.end_date())
    .bind(status.as_str())
    .bind(&offered)
    .bind(&expected)
    .bind(new.created_at)
    .execute(&mut *tx)
    .await?
    .last_insert_rowid();

    for file in &new.files {
        sqlx::query(
            r#"
            INSERT INTO exchange_files (exchange_id, side, kind, path, mime_type, size)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(id)
        .bind(&file.side)
        .bind(&file.kind)
        .bind(&file.path)
        .bind(&file.mime_type)
        .bind(file.size)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    info!(id, files = new.files.len(), "exchange stored");
    Ok(ExchangeCreated {
        id,
        status,
        created_at: new.created_at,
    })
}

// ─────────────────────────────────────────────────────────
// Task list
// ─────────────────────────────────────────────────────────

const TASK_COLUMNS: &str =
    "id, name, typeofexchange, created_at AS createddate, enddate, status";

/// All exchanges, newest first.
pub async fn list_tasks(pool: &SqlitePool) -> Result<Vec<TaskSummary>> {
    let rows = sqlx::query_as::<_, TaskSummary>(&format!(
        "SELECT {TASK_COLUMNS} FROM exchanges ORDER BY created_at DESC, id DESC"
    ))
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn get_task(pool: &SqlitePool, id: i64) -> Result<TaskSummary> {
    sqlx::query_as::<_, TaskSummary>(&format!(
        "SELECT {TASK_COLUMNS} FROM exchanges WHERE id = ?1"
    ))
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound(id))
}

/// Rename an exchange and/or change its status. Absent values are kept.
/// The name mirrors the offered title, so both change together.
pub async fn update_task(
    pool: &SqlitePool,
    id: i64,
    name: Option<&str>,
    status: Option<ExchangeStatus>,
) -> Result<TaskSummary> {
    let affected = sqlx::query(
        r#"
        UPDATE exchanges
        SET    name = COALESCE(?1, name),
               offered_details = CASE
                   WHEN ?1 IS NULL THEN offered_details
                   ELSE json_set(offered_details, '$.title', ?1)
               END,
               status = COALESCE(?2, status)
        WHERE  id = ?3
        "#,
    )
    .bind(name)
    .bind(status.map(|s| s.as_str()))
    .bind(id)
    .execute(pool)
    .await?
    .rows_affected();

    if affected == 0 {
        return Err(ApiError::NotFound(id));
    }
    get_task(pool, id).await
}

/// Delete an exchange. Returns the public paths of its stored files that no
/// other exchange references, so the caller can remove them.
pub async fn delete_task(pool: &SqlitePool, id: i64) -> Result<Vec<String>> {
    let mut tx = pool.begin().await?;
    let paths: Vec<(String,)> = sqlx::query_as(
        r#"
        SELECT DISTINCT path
        FROM   exchange_files
        WHERE  exchange_id = ?1
          AND  path NOT IN (SELECT path FROM exchange_files WHERE exchange_id != ?1)
        "#,
    )
    .bind(id)
    .fetch_all(&mut *tx)
    .await?;
    sqlx::query("DELETE FROM exchange_files WHERE exchange_id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    let affected = sqlx::query("DELETE FROM exchanges WHERE id = ?1")
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();
    if affected == 0 {
        return Err(ApiError::NotFound(id));
    }
    tx.commit().await?;

    info!(id, "exchange deleted");
    Ok(paths.into_iter().map(|(p,)| p).collect())
}

/// Of `paths`, those no stored exchange references.
pub async fn unreferenced_paths(pool: &SqlitePool, paths: &[String]) -> Result<Vec<String>> {
    let mut free = Vec::new();
    for path in paths {
        let (uses,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM exchange_files WHERE path = ?1")
                .bind(path)
                .fetch_one(pool)
                .await?;
        if uses == 0 && !free.contains(path) {
            free.push(path.clone());
        }
    }
    Ok(free)
}

// ─────────────────────────────────────────────────────────
// Exchange reads
// ─────────────────────────────────────────────────────────

pub async fn get_exchange(pool: &SqlitePool, id: i64) -> Result<ExchangeRecord> {
    let row = sqlx::query_as::<_, ExchangeRow>(
        r#"
        SELECT id, status, offered_details, expected_details, created_at
        FROM   exchanges
        WHERE  id = ?1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(ApiError::NotFound(id))?;

    let files = sqlx::query_as::<_, StoredFile>(
        r#"
        SELECT side, kind, path, mime_type, size
        FROM   exchange_files
        WHERE  exchange_id = ?1
        ORDER  BY id ASC
        "#,
    )
    .bind(id)
    .fetch_all(pool)
    .await?;

    Ok(ExchangeRecord {
        id: row.id,
        status: row.status,
        created_at: row.created_at,
        offered_details: serde_json::from_str(&row.offered_details)?,
        expected_details: serde_json::from_str(&row.expected_details)?,
        files,
    })
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    // One connection that never expires: every connection to `:memory:` is
    // its own database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}
