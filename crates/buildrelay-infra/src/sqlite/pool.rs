//! Connections to the registry database.
//!
//! The database holds one table, `build_registry`, which caches the last
//! known status per correlation token. Status polls read it concurrently;
//! every compare-and-swap goes through a single writer connection so two
//! racing updates for the same token are applied one after the other.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

/// Concurrent status lookups served by the read side.
const READ_CONNECTIONS: u32 = 8;

/// How long a statement waits on a locked database before failing.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Reader and writer pools over one file-backed registry database.
///
/// `sqlite::memory:` is not supported: each pool would open its own empty
/// database.
#[derive(Clone)]
pub struct RegistryDb {
    pub reader: SqlitePool,
    pub writer: SqlitePool,
}

impl RegistryDb {
    /// Open the registry at `database_url`, creating the file and the
    /// `build_registry` table if missing.
    pub async fn open(database_url: &str) -> Result<Self, sqlx::Error> {
        let options = connect_options(database_url)?;

        let writer = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options.clone())
            .await?;
        // Schema must exist before the read-only side connects.
        sqlx::migrate!("../../migrations").run(&writer).await?;

        let reader = SqlitePoolOptions::new()
            .max_connections(READ_CONNECTIONS)
            .connect_with(options.read_only(true))
            .await?;

        tracing::debug!(database_url, "registry database opened");
        Ok(Self { reader, writer })
    }
}

fn connect_options(database_url: &str) -> Result<SqliteConnectOptions, sqlx::Error> {
    Ok(SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT))
}
