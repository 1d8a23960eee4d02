/*!
 * Shared SQLite handle for the translation cache.
 *
 * One `rusqlite::Connection` sits behind a mutex and every query runs on the
 * blocking pool, so async translators never stall a runtime worker on disk
 * I/O. Several processes may share one cache file; a writer that finds the
 * file locked waits up to `BUSY_TIMEOUT` before the write is reported failed
 * (and dropped by the cache layer).
 */

use anyhow::{Context, Result};
use log::{debug, info};
use parking_lot::Mutex;
use rusqlite::Connection;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::schema;

/// Cache file name inside the data directory
const CACHE_FILENAME: &str = "cache.db";

/// Directory under the user data directory
const CACHE_DIRNAME: &str = "mtgate";

/// How long a statement waits on a lock held by another process
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Where the cache database lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLocation {
    /// A file shared across runs
    File(PathBuf),
    /// Private to this handle, gone when it drops
    Memory,
}

impl fmt::Display for CacheLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::File(path) => write!(f, "{}", path.display()),
            Self::Memory => write!(f, ":memory:"),
        }
    }
}

/// Cloneable handle to the cache database
#[derive(Clone)]
pub struct DatabaseConnection {
    location: CacheLocation,
    connection: Arc<Mutex<Connection>>,
}

impl fmt::Debug for DatabaseConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConnection")
            .field("location", &self.location)
            .finish()
    }
}

impl DatabaseConnection {
    /// Open the cache in the user data directory
    pub fn new_default() -> Result<Self> {
        Self::new(Self::default_database_path()?)
    }

    /// Open or create the cache file at `db_path`, creating parent directories
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create cache directory {}", parent.display()))?;
        }

        info!("Opening translation cache at {}", db_path.display());
        let conn = Connection::open(&db_path)
            .with_context(|| format!("Failed to open cache database {}", db_path.display()))?;
        conn.busy_timeout(BUSY_TIMEOUT)
            .context("Failed to set cache busy timeout")?;
        schema::initialize_schema(&conn)?;

        Ok(Self::wrap(CacheLocation::File(db_path), conn))
    }

    /// Cache that disappears with the last clone of this handle
    pub fn new_in_memory() -> Result<Self> {
        debug!("Creating in-memory translation cache");
        let conn = Connection::open_in_memory().context("Failed to create in-memory cache")?;
        schema::initialize_schema(&conn)?;
        Ok(Self::wrap(CacheLocation::Memory, conn))
    }

    fn wrap(location: CacheLocation, conn: Connection) -> Self {
        Self {
            location,
            connection: Arc::new(Mutex::new(conn)),
        }
    }

    /// `<data dir>/mtgate/cache.db`
    pub fn default_database_path() -> Result<PathBuf> {
        let base_dir = dirs::data_local_dir()
            .or_else(dirs::data_dir)
            .or_else(|| dirs::home_dir().map(|h| h.join(".local").join("share")))
            .ok_or_else(|| anyhow::anyhow!("Could not determine a data directory for the cache"))?;

        Ok(base_dir.join(CACHE_DIRNAME).join(CACHE_FILENAME))
    }

    /// Where this cache lives
    pub fn location(&self) -> &CacheLocation {
        &self.location
    }

    /// Run `f` on the blocking pool with exclusive use of the connection
    pub async fn execute_async<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.connection.clone();
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .context("Cache database task panicked")?
    }

    /// Size of the cache file; zero in memory
    pub fn file_size(&self) -> u64 {
        match &self.location {
            CacheLocation::File(path) => std::fs::metadata(path).map(|m| m.len()).unwrap_or(0),
            CacheLocation::Memory => 0,
        }
    }

    /// Rebuild the file after large deletions; returns the bytes reclaimed
    pub async fn compact(&self) -> Result<u64> {
        let before = self.file_size();
        self.execute_async(|conn| {
            conn.execute_batch("VACUUM; PRAGMA wal_checkpoint(TRUNCATE);")?;
            Ok(())
        })
        .await?;
        let reclaimed = before.saturating_sub(self.file_size());
        debug!("Compacted {} ({} bytes reclaimed)", self.location, reclaimed);
        Ok(reclaimed)
    }
}
