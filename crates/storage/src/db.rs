use budgetflow_core::{BudgetDocument, FinancialGoal};
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use thiserror::Error;

pub type DbPool = Pool<Sqlite>;

const PROFILE_END_DATE_KEY: &str = "profile_end_date";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("Stored document is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid date in setting {key}: {value}")]
    BadDate { key: String, value: String },
}

/// Handle returned for a queued continuous-optimization request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationRequest {
    pub request_id: String,
    pub status: String,
}

pub async fn create_db(path: &Path) -> Result<DbPool, sqlx::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;

    sqlx::query("PRAGMA journal_mode = WAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&pool)
        .await?;

    run_migrations(&pool).await?;

    Ok(pool)
}

async fn run_migrations(pool: &DbPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS budget_documents (
            user_id TEXT PRIMARY KEY,
            document TEXT NOT NULL,
            last_modified_at TEXT,
            last_optimization_reviewed_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS financial_goals (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id TEXT NOT NULL,
            account TEXT NOT NULL,
            deadline TEXT,
            priority TEXT NOT NULL DEFAULT ''
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            user_id TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (user_id, key)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS optimization_requests (
            request_id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            projection TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn load_document(pool: &DbPool, user_id: &str) -> Result<Option<BudgetDocument>, StorageError> {
    let row = sqlx::query_as::<_, (String,)>("SELECT document FROM budget_documents WHERE user_id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some((json,)) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Replaces the user's whole document in one statement; either all of it is
/// stored or none of it is.
pub async fn save_document(pool: &DbPool, user_id: &str, document: &BudgetDocument) -> Result<(), StorageError> {
    let json = serde_json::to_string(document)?;
    sqlx::query(
        r#"
        INSERT INTO budget_documents (user_id, document, last_modified_at, last_optimization_reviewed_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id) DO UPDATE SET
            document = excluded.document,
            last_modified_at = excluded.last_modified_at,
            last_optimization_reviewed_at = excluded.last_optimization_reviewed_at
        "#,
    )
    .bind(user_id)
    .bind(json)
    .bind(document.last_modified_at.map(|t| t.to_rfc3339()))
    .bind(document.last_optimization_reviewed_at.map(|t| t.to_rfc3339()))
    .execute(pool)
    .await?;

    tracing::info!(
        "Saved budget for {user_id}: {} snapshot(s)",
        document.modifications.len()
    );
    Ok(())
}

pub async fn get_goals(pool: &DbPool, user_id: &str) -> Result<Vec<FinancialGoal>, StorageError> {
    let rows = sqlx::query_as::<_, (String, Option<String>, String)>(
        "SELECT account, deadline, priority FROM financial_goals WHERE user_id = ? ORDER BY id",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|(account, deadline, priority)| FinancialGoal {
            account,
            deadline: deadline.and_then(|d| NaiveDate::parse_from_str(&d, "%Y-%m-%d").ok()),
            priority,
        })
        .collect())
}

pub async fn insert_goal(pool: &DbPool, user_id: &str, goal: &FinancialGoal) -> Result<(), StorageError> {
    sqlx::query("INSERT INTO financial_goals (user_id, account, deadline, priority) VALUES (?, ?, ?, ?)")
        .bind(user_id)
        .bind(&goal.account)
        .bind(goal.deadline.map(|d| d.to_string()))
        .bind(&goal.priority)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn get_setting(pool: &DbPool, user_id: &str, key: &str) -> Result<Option<String>, StorageError> {
    let row = sqlx::query_as::<_, (String,)>("SELECT value FROM settings WHERE user_id = ? AND key = ?")
        .bind(user_id)
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(row.map(|r| r.0))
}

pub async fn set_setting(pool: &DbPool, user_id: &str, key: &str, value: &str) -> Result<(), StorageError> {
    sqlx::query(
        "INSERT INTO settings (user_id, key, value) VALUES (?, ?, ?)
         ON CONFLICT(user_id, key) DO UPDATE SET value = excluded.value",
    )
    .bind(user_id)
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_profile_end_date(pool: &DbPool, user_id: &str) -> Result<Option<NaiveDate>, StorageError> {
    match get_setting(pool, user_id, PROFILE_END_DATE_KEY).await? {
        Some(value) => NaiveDate::parse_from_str(&value, "%Y-%m-%d")
            .map(Some)
            .map_err(|_| StorageError::BadDate {
                key: PROFILE_END_DATE_KEY.to_string(),
                value,
            }),
        None => Ok(None),
    }
}

pub async fn set_profile_end_date(pool: &DbPool, user_id: &str, date: NaiveDate) -> Result<(), StorageError> {
    set_setting(pool, user_id, PROFILE_END_DATE_KEY, &date.to_string()).await
}

/// Queues a day-by-day projection for continuous optimization. The
/// projection is stored as given and never inspected.
pub async fn create_optimization_request(
    pool: &DbPool,
    user_id: &str,
    projection: &[serde_json::Value],
) -> Result<OptimizationRequest, StorageError> {
    let request = OptimizationRequest {
        request_id: uuid::Uuid::new_v4().to_string(),
        status: "pending".to_string(),
    };
    sqlx::query(
        "INSERT INTO optimization_requests (request_id, user_id, projection, status, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(&request.request_id)
    .bind(user_id)
    .bind(serde_json::to_string(projection)?)
    .bind(&request.status)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;
    Ok(request)
}

pub async fn get_optimization_request(
    pool: &DbPool,
    request_id: &str,
) -> Result<Option<OptimizationRequest>, StorageError> {
    let row = sqlx::query_as::<_, (String, String)>(
        "SELECT request_id, status FROM optimization_requests WHERE request_id = ?",
    )
    .bind(request_id)
    .fetch_optional(pool)
    .await?;
    Ok(row.map(|(request_id, status)| OptimizationRequest { request_id, status }))
}
