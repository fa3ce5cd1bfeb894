//! SQLite registry store implementation.
//!
//! Implements `RegistryStore` from `buildrelay-core` using sqlx with split
//! read/write pools. The status view is stored as JSON text; the status name
//! is duplicated into its own column for ad-hoc queries.

use buildrelay_core::registry::store::RegistryStore;
use buildrelay_types::error::RepositoryError;
use buildrelay_types::status::{RegistryEntry, StatusView};
use buildrelay_types::token::CorrelationToken;
use chrono::{DateTime, Utc};
use sqlx::Row;

use super::pool::RegistryDb;

/// SQLite-backed implementation of `RegistryStore`.
pub struct SqliteRegistryStore {
    pool: RegistryDb,
}

impl SqliteRegistryStore {
    pub fn new(pool: RegistryDb) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct RegistryRow {
    token: String,
    run_id: Option<i64>,
    view: String,
    revision: i64,
    updated_at: String,
}

impl RegistryRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            token: row.try_get("token")?,
            run_id: row.try_get("run_id")?,
            view: row.try_get("view")?,
            revision: row.try_get("revision")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_entry(self) -> Result<RegistryEntry, RepositoryError> {
        let token: CorrelationToken = self
            .token
            .parse()
            .map_err(|e| RepositoryError::Query(format!("invalid token: {e}")))?;
        let view: StatusView = serde_json::from_str(&self.view)
            .map_err(|e| RepositoryError::Query(format!("invalid status view: {e}")))?;
        let run_id = self
            .run_id
            .map(|id| u64::try_from(id).map_err(|e| RepositoryError::Query(format!("invalid run_id: {e}"))))
            .transpose()?;
        let revision = u64::try_from(self.revision)
            .map_err(|e| RepositoryError::Query(format!("invalid revision: {e}")))?;

        Ok(RegistryEntry {
            token,
            run_id,
            view,
            revision,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// Column values for writing an entry.
struct EntryColumns {
    run_id: Option<i64>,
    view: String,
    status: String,
    revision: i64,
    updated_at: String,
}

impl EntryColumns {
    fn from_entry(entry: &RegistryEntry) -> Result<Self, RepositoryError> {
        let view = serde_json::to_string(&entry.view)
            .map_err(|e| RepositoryError::Query(format!("failed to serialize status view: {e}")))?;
        let run_id = entry
            .run_id
            .map(|id| i64::try_from(id).map_err(|e| RepositoryError::Query(format!("run_id out of range: {e}"))))
            .transpose()?;
        let revision = i64::try_from(entry.revision)
            .map_err(|e| RepositoryError::Query(format!("revision out of range: {e}")))?;

        Ok(Self {
            run_id,
            view,
            status: entry.view.status.to_string(),
            revision,
            updated_at: format_datetime(&entry.updated_at),
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// RegistryStore implementation
// ---------------------------------------------------------------------------

impl RegistryStore for SqliteRegistryStore {
    async fn get(&self, token: &CorrelationToken) -> Result<Option<RegistryEntry>, RepositoryError> {
        let row = sqlx::query(
            "SELECT token, run_id, view, revision, updated_at FROM build_registry WHERE token = ?",
        )
        .bind(token.as_str())
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let row = RegistryRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(row.into_entry()?))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, entry: &RegistryEntry) -> Result<(), RepositoryError> {
        let cols = EntryColumns::from_entry(entry)?;

        sqlx::query(
            r#"INSERT INTO build_registry (token, run_id, view, status, revision, updated_at)
               VALUES (?, ?, ?, ?, ?, ?)
               ON CONFLICT (token) DO UPDATE SET
                   run_id = excluded.run_id,
                   view = excluded.view,
                   status = excluded.status,
                   revision = excluded.revision,
                   updated_at = excluded.updated_at"#,
        )
        .bind(entry.token.as_str())
        .bind(cols.run_id)
        .bind(&cols.view)
        .bind(&cols.status)
        .bind(cols.revision)
        .bind(&cols.updated_at)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn compare_and_swap(
        &self,
        expected_revision: Option<u64>,
        entry: &RegistryEntry,
    ) -> Result<bool, RepositoryError> {
        let cols = EntryColumns::from_entry(entry)?;

        let result = match expected_revision {
            None => {
                sqlx::query(
                    r#"INSERT INTO build_registry (token, run_id, view, status, revision, updated_at)
                       VALUES (?, ?, ?, ?, ?, ?)
                       ON CONFLICT (token) DO NOTHING"#,
                )
                .bind(entry.token.as_str())
                .bind(cols.run_id)
                .bind(&cols.view)
                .bind(&cols.status)
                .bind(cols.revision)
                .bind(&cols.updated_at)
                .execute(&self.pool.writer)
                .await
            }
            Some(expected) => {
                let expected = i64::try_from(expected)
                    .map_err(|e| RepositoryError::Query(format!("revision out of range: {e}")))?;
                sqlx::query(
                    r#"UPDATE build_registry
                       SET run_id = ?, view = ?, status = ?, revision = ?, updated_at = ?
                       WHERE token = ? AND revision = ?"#,
                )
                .bind(cols.run_id)
                .bind(&cols.view)
                .bind(&cols.status)
                .bind(cols.revision)
                .bind(&cols.updated_at)
                .bind(entry.token.as_str())
                .bind(expected)
                .execute(&self.pool.writer)
                .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }
}
