//! Session chat history.
//!
//! Every session is stamped with the run token of the process that last
//! wrote it. A session read or written under a different token belongs to an
//! earlier process: its turns are dropped and the session is re-stamped.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use crate::core::errors::ApiError;
use crate::core::security::RunToken;
use crate::tutor::ChatTurn;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub id: String,
    #[serde(skip_serializing)]
    pub run_token: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub turn_count: i64,
}

#[derive(Clone)]
pub struct HistoryStore {
    pool: SqlitePool,
}

impl HistoryStore {
    pub async fn new(db_path: PathBuf) -> Result<Self, ApiError> {
        let options = SqliteConnectOptions::new()
            .filename(&db_path)
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to connect to history db: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                run_token TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init sessions table: {}", e)))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS turns (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                user_text TEXT NOT NULL,
                bot_text TEXT NOT NULL,
                is_mcq INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                FOREIGN KEY(session_id) REFERENCES sessions(id) ON DELETE CASCADE
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to init turns table: {}", e)))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_turns_session_id ON turns(session_id)")
            .execute(&pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create index: {}", e)))?;

        Ok(Self { pool })
    }

    pub async fn create_session(&self, run_token: &RunToken) -> Result<SessionInfo, ApiError> {
        let session_id = uuid::Uuid::new_v4().to_string();
        let now = chrono::Utc::now().to_rfc3339();

        sqlx::query("INSERT INTO sessions (id, run_token, created_at, updated_at) VALUES (?, ?, ?, ?)")
            .bind(&session_id)
            .bind(run_token.value())
            .bind(&now)
            .bind(&now)
            .execute(&self.pool)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to create session: {}", e)))?;

        Ok(SessionInfo {
            id: session_id,
            run_token: run_token.value().to_string(),
            created_at: now.clone(),
            updated_at: now,
            turn_count: 0,
        })
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<SessionInfo>, ApiError> {
        let row = sqlx::query(
            "SELECT s.id, s.run_token, s.created_at, s.updated_at, \
             (SELECT COUNT(*) FROM turns t WHERE t.session_id = s.id) AS turn_count \
             FROM sessions s WHERE s.id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(ApiError::internal)?;

        Ok(row.map(|row| SessionInfo {
            id: row.try_get::<String, _>("id").unwrap_or_default(),
            run_token: row.try_get::<String, _>("run_token").unwrap_or_default(),
            created_at: row.try_get::<String, _>("created_at").unwrap_or_default(),
            updated_at: row.try_get::<String, _>("updated_at").unwrap_or_default(),
            turn_count: row.try_get::<i64, _>("turn_count").unwrap_or(0),
        }))
    }

    /// Turns of a session in insertion order, after applying the run-token
    /// rule. Unknown sessions are `NotFound`.
    pub async fn load_turns(
        &self,
        session_id: &str,
        run_token: &RunToken,
    ) -> Result<Vec<ChatTurn>, ApiError> {
        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        let stored: Option<String> = sqlx::query_scalar("SELECT run_token FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        let Some(stored) = stored else {
            return Err(ApiError::NotFound(format!("Session {} not found", session_id)));
        };

        if !run_token.matches(&stored) {
            reset_session(&mut tx, session_id, run_token).await?;
        }

        let rows = sqlx::query(
            "SELECT user_text, bot_text, is_mcq FROM turns WHERE session_id = ? ORDER BY id ASC",
        )
        .bind(session_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;

        Ok(rows
            .into_iter()
            .map(|row| {
                ChatTurn::from_stored(
                    row.try_get::<String, _>("user_text").unwrap_or_default(),
                    row.try_get::<String, _>("bot_text").unwrap_or_default(),
                    row.try_get::<bool, _>("is_mcq").unwrap_or(false),
                )
            })
            .collect())
    }

    /// Appends a turn, creating the session if it does not exist yet.
    pub async fn append_turn(
        &self,
        session_id: &str,
        run_token: &RunToken,
        turn: &ChatTurn,
    ) -> Result<i64, ApiError> {
        let now = chrono::Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await.map_err(ApiError::internal)?;

        sqlx::query(
            "INSERT OR IGNORE INTO sessions (id, run_token, created_at, updated_at) VALUES (?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(run_token.value())
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        let stored: String = sqlx::query_scalar("SELECT run_token FROM sessions WHERE id = ?")
            .bind(session_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(ApiError::internal)?;
        if !run_token.matches(&stored) {
            reset_session(&mut tx, session_id, run_token).await?;
        }

        sqlx::query("UPDATE sessions SET updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(session_id)
            .execute(&mut *tx)
            .await
            .map_err(ApiError::internal)?;

        let result = sqlx::query(
            "INSERT INTO turns (session_id, user_text, bot_text, is_mcq, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(session_id)
        .bind(&turn.user)
        .bind(&turn.bot)
        .bind(turn.is_mcq)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(ApiError::internal)?;

        tx.commit().await.map_err(ApiError::internal)?;

        Ok(result.last_insert_rowid())
    }

    /// Removes every turn of a session; returns how many were removed.
    pub async fn clear_turns(&self, session_id: &str) -> Result<u64, ApiError> {
        let result = sqlx::query("DELETE FROM turns WHERE session_id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected())
    }

    pub async fn delete_session(&self, session_id: &str) -> Result<bool, ApiError> {
        let result = sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(session_id)
            .execute(&self.pool)
            .await
            .map_err(ApiError::internal)?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn session_count(&self) -> Result<i64, ApiError> {
        sqlx::query_scalar("SELECT COUNT(*) FROM sessions")
            .fetch_one(&self.pool)
            .await
            .map_err(ApiError::internal)
    }
}

async fn reset_session(
    tx: &mut Transaction<'_, Sqlite>,
    session_id: &str,
    run_token: &RunToken,
) -> Result<(), ApiError> {
    tracing::info!("Clearing history of session {} from an earlier run", session_id);

    sqlx::query("DELETE FROM turns WHERE session_id = ?")
        .bind(session_id)
        .execute(&mut **tx)
        .await
        .map_err(ApiError::internal)?;

    sqlx::query("UPDATE sessions SET run_token = ?, updated_at = ? WHERE id = ?")
        .bind(run_token.value())
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(session_id)
        .execute(&mut **tx)
        .await
        .map_err(ApiError::internal)?;

    Ok(())
}
