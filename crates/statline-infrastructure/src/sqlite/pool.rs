use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OpenFlags};
use statline_core::executor::ExecutionError;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// A bounded pool of read-only SQLite connections.
///
/// At most `size` connections are checked out at once; callers wait on the
/// semaphore beyond that. Idle connections are reused.
pub struct ReadOnlyPool {
    path: PathBuf,
    busy_timeout: Duration,
    idle: Mutex<Vec<Connection>>,
    permits: Arc<Semaphore>,
    size: usize,
}

impl std::fmt::Debug for ReadOnlyPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadOnlyPool")
            .field("path", &self.path)
            .field("size", &self.size)
            .finish()
    }
}

impl ReadOnlyPool {
    /// Opens one connection eagerly so a missing database fails at startup.
    pub fn open(
        path: impl AsRef<Path>,
        size: usize,
        busy_timeout: Duration,
    ) -> Result<Arc<Self>, ExecutionError> {
        let path = path.as_ref().to_path_buf();
        let size = size.max(1);
        let first = open_read_only(&path, busy_timeout)?;
        Ok(Arc::new(Self {
            path,
            busy_timeout,
            idle: Mutex::new(vec![first]),
            permits: Arc::new(Semaphore::new(size)),
            size,
        }))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }

    pub async fn get(self: &Arc<Self>) -> Result<PooledConnection, ExecutionError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ExecutionError::Permanent("connection pool closed".into()))?;
        let reused = self.lock_idle().pop();
        let connection = match reused {
            Some(connection) => connection,
            None => open_read_only(&self.path, self.busy_timeout)?,
        };
        Ok(PooledConnection {
            connection: Some(connection),
            pool: Arc::clone(self),
            _permit: permit,
        })
    }

    fn lock_idle(&self) -> MutexGuard<'_, Vec<Connection>> {
        self.idle.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Opens with `SQLITE_OPEN_READ_ONLY` and sets `query_only`.
pub(crate) fn open_read_only(path: &Path, busy_timeout: Duration) -> Result<Connection, ExecutionError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
        | OpenFlags::SQLITE_OPEN_URI;
    let connection = Connection::open_with_flags(path, flags).map_err(|e| {
        ExecutionError::Transient(format!("cannot open {}: {}", path.display(), e))
    })?;
    connection
        .pragma_update(None, "query_only", true)
        .and_then(|_| connection.busy_timeout(busy_timeout))
        .map_err(|e| ExecutionError::Permanent(format!("cannot configure connection: {}", e)))?;
    Ok(connection)
}

/// A checked-out connection; returned to the pool on drop.
pub struct PooledConnection {
    connection: Option<Connection>,
    pool: Arc<ReadOnlyPool>,
    _permit: OwnedSemaphorePermit,
}

impl Deref for PooledConnection {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        // only `drop` takes the connection
        self.connection.as_ref().expect("connection present until drop")
    }
}

impl DerefMut for PooledConnection {
    fn deref_mut(&mut self) -> &mut Connection {
        self.connection.as_mut().expect("connection present until drop")
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        if let Some(connection) = self.connection.take() {
            self.pool.lock_idle().push(connection);
        }
    }
}
