//! Bounded pool of SQLite connections.
//!
//! Connections are opened lazily up to `max_size` and handed out as
//! [`PooledConnection`] guards that return themselves on drop. When every
//! connection is checked out, `get` blocks until one comes back, so it
//! must be called from a blocking context (`spawn_blocking`).

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::Connection;
use tracing::debug;

use crate::error::{ListingError, PersistenceStep, Result};

/// How long a connection waits on a locked database before failing
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared handle to the connection pool
#[derive(Clone)]
pub struct DbPool {
    path: PathBuf,
    shared: Arc<PoolShared>,
}

struct PoolShared {
    state: Mutex<PoolState>,
    cvar: Condvar,
    max_size: usize,
}

struct PoolState {
    idle: Vec<Connection>,
    created: usize,
}

/// A checked-out connection
pub struct PooledConnection {
    conn: ManuallyDrop<Connection>,
    shared: Arc<PoolShared>,
}

impl DbPool {
    /// Open a pool for the database at `path`.
    ///
    /// One connection is opened eagerly so a bad path fails here rather
    /// than on the first request. The database is switched to WAL mode.
    pub fn open(path: impl Into<PathBuf>, max_size: usize) -> Result<Self> {
        let path = path.into();
        let max_size = max_size.max(1);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ListingError::storage(parent, e))?;
        }

        let conn = open_connection(&path)?;
        let mode: String = conn
            .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))
            .map_err(|e| ListingError::persistence(PersistenceStep::Checkout, e))?;

        debug!(path = %path.display(), max_size, journal_mode = %mode, "Opened database pool");

        Ok(Self {
            path,
            shared: Arc::new(PoolShared {
                state: Mutex::new(PoolState {
                    idle: vec![conn],
                    created: 1,
                }),
                cvar: Condvar::new(),
                max_size,
            }),
        })
    }

    /// Path of the underlying database file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maximum number of connections
    pub fn max_size(&self) -> usize {
        self.shared.max_size
    }

    /// Number of connections opened so far
    pub fn created(&self) -> usize {
        self.shared.lock().created
    }

    /// Number of connections sitting idle
    pub fn idle(&self) -> usize {
        self.shared.lock().idle.len()
    }

    /// Check out a connection, blocking while the pool is exhausted
    pub fn get(&self) -> Result<PooledConnection> {
        let mut state = self.shared.lock();
        loop {
            if let Some(conn) = state.idle.pop() {
                return Ok(self.wrap(conn));
            }

            if state.created < self.shared.max_size {
                state.created += 1;
                drop(state);

                return match open_connection(&self.path) {
                    Ok(conn) => Ok(self.wrap(conn)),
                    Err(e) => {
                        self.shared.lock().created -= 1;
                        self.shared.cvar.notify_one();
                        Err(e)
                    }
                };
            }

            state = self
                .shared
                .cvar
                .wait(state)
                .unwrap_or_else(|poisoned| poisoned.into_inner());
        }
    }

    fn wrap(&self, conn: Connection) -> PooledConnection {
        PooledConnection {
            conn: ManuallyDrop::new(conn),
            shared: Arc::clone(&self.shared),
        }
    }
}

impl std::fmt::Debug for DbPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbPool")
            .field("path", &self.path)
            .field("max_size", &self.shared.max_size)
            .finish()
    }
}

impl PoolShared {
    // A panic while holding the lock leaves the free list intact, so
    // poisoning is ignored.
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Self::Target {
        &self.conn
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.conn
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        // SAFETY: `conn` is never touched again after this point.
        let conn = unsafe { ManuallyDrop::take(&mut self.conn) };
        self.shared.lock().idle.push(conn);
        self.shared.cvar.notify_one();
    }
}

fn open_connection(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| ListingError::persistence(PersistenceStep::Checkout, e))?;
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(|e| ListingError::persistence(PersistenceStep::Checkout, e))?;
    conn.busy_timeout(BUSY_TIMEOUT)
        .map_err(|e| ListingError::persistence(PersistenceStep::Checkout, e))?;
    Ok(conn)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_connections_are_reused() {
        let temp = TempDir::new().unwrap();
        let pool = DbPool::open(temp.path().join("test.sqlite3"), 4).unwrap();

        {
            let _conn = pool.get().unwrap();
            assert_eq!(pool.idle(), 0);
        }
        assert_eq!(pool.idle(), 1);

        let _a = pool.get().unwrap();
        let _b = pool.get().unwrap();
        assert_eq!(pool.created(), 2);
    }

    #[test]
    fn test_returned_connection_is_handed_out_again() {
        let temp = TempDir::new().unwrap();
        let pool = DbPool::open(temp.path().join("test.sqlite3"), 1).unwrap();

        {
            let conn = pool.get().unwrap();
            conn.execute_batch("CREATE TEMP TABLE scratch (x INTEGER)")
                .unwrap();
        }

        // TEMP tables are per-connection, so this only succeeds on the same one
        let conn = pool.get().unwrap();
        conn.execute("INSERT INTO scratch (x) VALUES (1)", []).unwrap();
        assert_eq!(pool.created(), 1);
        assert_eq!(pool.idle(), 0);
    }

    #[test]
    fn test_foreign_keys_enabled() {
        let temp = TempDir::new().unwrap();
        let pool = DbPool::open(temp.path().join("test.sqlite3"), 1).unwrap();
        let conn = pool.get().unwrap();

        let enabled: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(enabled, 1);
    }

    #[test]
    fn test_exhausted_pool_waits_for_return() {
        let temp = TempDir::new().unwrap();
        let pool = DbPool::open(temp.path().join("test.sqlite3"), 1).unwrap();

        let held = pool.get().unwrap();
        let waiter = {
            let pool = pool.clone();
            std::thread::spawn(move || pool.get().map(|_| ()).is_ok())
        };

        std::thread::sleep(Duration::from_millis(50));
        drop(held);

        assert!(waiter.join().unwrap());
        assert_eq!(pool.created(), 1);
    }

    #[test]
    fn test_creates_parent_directory() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("db.sqlite3");
        let pool = DbPool::open(&path, 1).unwrap();
        assert_eq!(pool.path(), path.as_path());
        assert!(path.exists());
    }
}
