//! Persistence sink: where outcomes and failure records go.
//!
//! The evaluation core only ever talks to the [`PersistenceSink`] trait;
//! [`PgSink`] is the Postgres implementation. A successful score is stored
//! as the parsed JSON document; an unrecoverable parse is tracked in
//! `parse_failures`, keyed by filename, with a retry counter the upsert
//! increments and the next success clears.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::PgPool;
use tracing::info;

use crate::matching::MatchOutcome;

#[async_trait]
pub trait PersistenceSink: Send + Sync {
    /// Stores a successfully parsed score document.
    async fn insert_success(&self, outcome: &MatchOutcome, document: &Value) -> Result<()>;

    /// Records an unrecoverable parse: inserts with retry count 1, or
    /// bumps the counter and replaces the diagnostic for a filename
    /// already present.
    async fn upsert_failure(&self, filename: &str, diagnostic: &str, raw_excerpt: &str)
        -> Result<()>;

    /// Drops the failure record for `filename`, if any.
    async fn clear_failure(&self, filename: &str) -> Result<()>;

    /// Filenames currently recorded as failed, for the retry sweep.
    async fn failed_filenames(&self) -> Result<Vec<String>>;
}

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

pub struct PgSink {
    pool: PgPool,
}

impl PgSink {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the two tables if they do not exist yet.
    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS match_results (
                id BIGSERIAL PRIMARY KEY,
                filename TEXT NOT NULL,
                correlation_id UUID,
                score_data JSONB NOT NULL,
                evaluated_at TIMESTAMPTZ NOT NULL
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create match_results")?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS parse_failures (
                filename TEXT PRIMARY KEY,
                diagnostic TEXT NOT NULL,
                raw_excerpt TEXT NOT NULL DEFAULT '',
                retry_count INT NOT NULL DEFAULT 1,
                last_attempt_at TIMESTAMPTZ NOT NULL DEFAULT now()
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create parse_failures")?;

        Ok(())
    }
}

#[async_trait]
impl PersistenceSink for PgSink {
    async fn insert_success(&self, outcome: &MatchOutcome, document: &Value) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO match_results (filename, correlation_id, score_data, evaluated_at)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(&outcome.filename)
        .bind(outcome.correlation_id)
        .bind(Json(document))
        .bind(outcome.evaluated_at)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to insert result for {}", outcome.filename))?;
        Ok(())
    }

    async fn upsert_failure(
        &self,
        filename: &str,
        diagnostic: &str,
        raw_excerpt: &str,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO parse_failures (filename, diagnostic, raw_excerpt, retry_count)
            VALUES ($1, $2, $3, 1)
            ON CONFLICT (filename) DO UPDATE SET
                diagnostic = EXCLUDED.diagnostic,
                raw_excerpt = EXCLUDED.raw_excerpt,
                retry_count = parse_failures.retry_count + 1,
                last_attempt_at = now()
            "#,
        )
        .bind(filename)
        .bind(diagnostic)
        .bind(raw_excerpt)
        .execute(&self.pool)
        .await
        .with_context(|| format!("failed to upsert failure for {filename}"))?;
        Ok(())
    }

    async fn clear_failure(&self, filename: &str) -> Result<()> {
        sqlx::query("DELETE FROM parse_failures WHERE filename = $1")
            .bind(filename)
            .execute(&self.pool)
            .await
            .with_context(|| format!("failed to clear failure for {filename}"))?;
        Ok(())
    }

    async fn failed_filenames(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as("SELECT filename FROM parse_failures")
            .fetch_all(&self.pool)
            .await
            .context("failed to list parse failures")?;
        Ok(rows.into_iter().map(|(filename,)| filename).collect())
    }
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// In-memory sink implementing the same upsert/clear semantics as
    /// `PgSink`, shared by the evaluation and retry tests.
    #[derive(Default)]
    pub struct RecordingSink {
        inserted: Mutex<Vec<String>>,
        failures: Mutex<HashMap<String, (String, u32)>>,
        cleared: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        pub fn inserted(&self) -> Vec<String> {
            self.inserted.lock().unwrap().clone()
        }

        pub fn failures(&self) -> HashMap<String, (String, u32)> {
            self.failures.lock().unwrap().clone()
        }

        pub fn cleared(&self) -> Vec<String> {
            self.cleared.lock().unwrap().clone()
        }

        pub fn seed_failure(&self, filename: &str) {
            self.failures
                .lock()
                .unwrap()
                .insert(filename.to_string(), ("seeded".to_string(), 1));
        }
    }

    #[async_trait]
    impl PersistenceSink for RecordingSink {
        async fn insert_success(&self, outcome: &MatchOutcome, _document: &Value) -> Result<()> {
            self.inserted.lock().unwrap().push(outcome.filename.clone());
            Ok(())
        }

        async fn upsert_failure(
            &self,
            filename: &str,
            diagnostic: &str,
            _raw_excerpt: &str,
        ) -> Result<()> {
            let mut failures = self.failures.lock().unwrap();
            failures
                .entry(filename.to_string())
                .and_modify(|(stored, count)| {
                    *stored = diagnostic.to_string();
                    *count += 1;
                })
                .or_insert((diagnostic.to_string(), 1));
            Ok(())
        }

        async fn clear_failure(&self, filename: &str) -> Result<()> {
            self.failures.lock().unwrap().remove(filename);
            self.cleared.lock().unwrap().push(filename.to_string());
            Ok(())
        }

        async fn failed_filenames(&self) -> Result<Vec<String>> {
            Ok(self.failures.lock().unwrap().keys().cloned().collect())
        }
    }
}
