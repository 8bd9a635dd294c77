//! SQLite statistics store: a read-only connection pool and the executor.

mod executor;
mod pool;

pub use executor::SqliteQueryExecutor;
pub use pool::{PooledConnection, ReadOnlyPool};
