// Database module - SQLx-based SQLite access
//
// DatabaseManager owns the connection pool and hands out prepared statements.
// Statements collect their bindings and are executed in one shot; a binding
// failure poisons the statement so it can no longer be executed.

mod statement;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{Either, Executor, Statement};

pub use statement::{DataType, ExecuteOutcome, PreparedStatement, RowExt, SqlValue};
pub(crate) use statement::json_type_name;

/// Path that selects a private in-memory database
pub const MEMORY_PATH: &str = ":memory:";

/// Errors raised by the database layer
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("failed to open database '{path}': {source}")]
    Open {
        path: String,
        #[source]
        source: sqlx::Error,
    },
    #[error("failed to prepare statement: {0}")]
    Prepare(#[source] sqlx::Error),
    #[error("parameter index {0} is out of range (indexes start at 1)")]
    BadIndex(usize),
    #[error("parameter {index} ('{key}') expected {expected}, got {found}")]
    TypeMismatch {
        index: usize,
        key: String,
        expected: DataType,
        found: String,
    },
    #[error("parameter {0} was never bound")]
    Unbound(usize),
    #[error("previous error prevents further modification: {0}")]
    Poisoned(Box<DatabaseError>),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, DatabaseError>;

/// Embedded SQLite database handle
#[derive(Clone, Debug)]
pub struct DatabaseManager {
    pool: SqlitePool,
    path: String,
}

impl DatabaseManager {
    /// Open (or create) the database at `path` with default pool sizing.
    pub async fn open(path: &str) -> Result<Self> {
        Self::open_with(path, 5).await
    }

    /// Open (or create) the database at `path`.
    /// `":memory:"` gives a private in-memory database held on one connection
    /// for the lifetime of the manager.
    pub async fn open_with(path: &str, max_connections: u32) -> Result<Self> {
        let open_err = |source| DatabaseError::Open { path: path.to_string(), source };

        let pool = if path == MEMORY_PATH {
            let options = SqliteConnectOptions::from_str("sqlite::memory:")
                .map_err(open_err)?
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>)
                .connect_with(options)
                .await
                .map_err(open_err)?
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .foreign_keys(true);
            SqlitePoolOptions::new()
                .max_connections(max_connections.max(1))
                .connect_with(options)
                .await
                .map_err(open_err)?
        };

        tracing::info!("Opened database {}", path);
        Ok(DatabaseManager { pool, path: path.to_string() })
    }

    /// Execute a raw statement, returning the number of rows affected
    pub async fn execute_query(&self, sql: &str) -> Result<u64> {
        tracing::trace!("execute_query: {}", sql);
        let result = sqlx::query(sql).execute(&self.pool).await.inspect_err(|e| {
            tracing::error!("Error in execute_query: {}", e);
        })?;
        Ok(result.rows_affected())
    }

    /// Create `table_name` with the given column schema if it does not exist
    pub async fn create_table_if_not_exists(&self, table_name: &str, table_schema: &str) -> Result<()> {
        let sql = format!("CREATE TABLE IF NOT EXISTS {} ({});", table_name, table_schema);
        self.execute_query(&sql).await?;
        tracing::debug!("Ensured table {}", table_name);
        Ok(())
    }

    /// Prepare a statement. The SQL is checked against the live schema here,
    /// so a typo or missing table fails before anything is bound.
    pub async fn prepare(&self, sql: &str) -> Result<PreparedStatement<'_>> {
        let statement = (&self.pool).prepare(sql).await.map_err(|e| {
            tracing::error!("Failed to prepare statement: {}", e);
            DatabaseError::Prepare(e)
        })?;
        let placeholders = match statement.parameters() {
            Some(Either::Left(types)) => types.len(),
            Some(Either::Right(count)) => count,
            None => 0,
        };
        Ok(PreparedStatement::new(self, sql, placeholders))
    }

    /// Check whether a table exists in the schema
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        self.prepare("SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?);")
            .await?
            .bind_text(1, table_name)
            .fetch_boolean()
            .await
    }

    /// Close the pool, waiting for connections to be released
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("Closed database {}", self.path);
    }

    /// Get the database path this manager was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Get the underlying pool (for advanced usage)
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
