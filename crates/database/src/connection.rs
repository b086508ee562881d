//! Opening the catalogue database
//!
//! File databases run in WAL mode with a busy timeout, so an importer and a
//! reader can share one file. In-memory databases hold a single connection
//! for the lifetime of the pool.

use folio_core::AppError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type DbPool = Pool<Sqlite>;

/// SQLITE_BUSY and SQLITE_LOCKED primary result codes
const BUSY_CODES: [&str; 2] = ["5", "6"];

/// Catalogue database settings
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: PathBuf,
    pub max_connections: u32,
    pub enable_wal: bool,
    pub create_if_missing: bool,
    /// How long a writer waits for a lock held by another connection
    pub busy_timeout: Duration,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("folio.db"),
            max_connections: 8,
            enable_wal: true,
            create_if_missing: true,
            busy_timeout: Duration::from_secs(10),
        }
    }
}

impl DatabaseConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }

    pub fn with_max_connections(mut self, max: u32) -> Self {
        self.max_connections = max.max(1);
        self
    }

    pub fn with_wal(mut self, enable: bool) -> Self {
        self.enable_wal = enable;
        self
    }

    pub fn with_create_if_missing(mut self, create: bool) -> Self {
        self.create_if_missing = create;
        self
    }

    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

/// Opens a pool on a database file
///
/// Does not touch the schema; see [`open`].
pub async fn connect(config: DatabaseConfig) -> Result<DbPool, AppError> {
    if !config.create_if_missing && !database_exists(&config.path) {
        return Err(AppError::FileNotFound { path: config.path });
    }
    if let Some(parent) = config.path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let mut options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(config.create_if_missing)
        .busy_timeout(config.busy_timeout)
        .foreign_keys(true);
    if config.enable_wal {
        options = options
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);
    }

    log::debug!("Opening database {}", config.path.display());
    SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .connect_with(options)
        .await
        .map_err(|e| connect_error(&config.path, e))
}

/// Opens a database file and brings its schema up to date
pub async fn open(config: DatabaseConfig) -> Result<DbPool, AppError> {
    let pool = connect(config).await?;
    crate::migrations::run_migrations(&pool).await?;
    Ok(pool)
}

/// Opens a single-connection in-memory database
///
/// The connection is never recycled, so the database lives as long as the pool.
pub async fn connect_in_memory() -> Result<DbPool, AppError> {
    let options = SqliteConnectOptions::new()
        .in_memory(true)
        .journal_mode(SqliteJournalMode::Memory)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .map_err(|e| AppError::database("Failed to open in-memory database", e))
}

#[cfg(test)]
pub async fn create_test_db() -> Result<DbPool, AppError> {
    connect_in_memory().await
}

pub async fn close(pool: DbPool) {
    pool.close().await;
}

pub fn database_exists(path: impl AsRef<Path>) -> bool {
    path.as_ref().is_file()
}

/// True when the error means another connection holds the lock
pub fn is_busy(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => db
            .code()
            .map(|code| BUSY_CODES.contains(&code.as_ref()))
            .unwrap_or(false),
        _ => false,
    }
}

fn connect_error(path: &Path, err: sqlx::Error) -> AppError {
    if is_busy(&err) {
        AppError::DatabaseLocked {
            operation: format!("open {}", path.display()),
        }
    } else {
        AppError::database(format!("Failed to open {}", path.display()), err)
    }
}
