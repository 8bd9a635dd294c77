use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ErrorCode, InterruptHandle, TransactionBehavior};
use statline_core::executor::{ExecutionError, QueryExecutor};
use statline_core::query::ValidatedQuery;
use statline_core::result::{ResultSet, Scalar};

use super::ReadOnlyPool;

/// Executes validated queries on the read-only pool.
///
/// Each query runs on a blocking thread inside a deferred transaction that
/// is always rolled back. On timeout the connection is interrupted.
#[derive(Debug, Clone)]
pub struct SqliteQueryExecutor {
    pool: Arc<ReadOnlyPool>,
}

impl SqliteQueryExecutor {
    pub fn new(pool: Arc<ReadOnlyPool>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for SqliteQueryExecutor {
    async fn execute(
        &self,
        query: &ValidatedQuery,
        timeout: Duration,
        row_cap: usize,
    ) -> Result<ResultSet, ExecutionError> {
        let started = Instant::now();
        let mut connection = self.pool.get().await?;
        let statement = Arc::new(RunningStatement::new(connection.get_interrupt_handle()));
        let sql = query.sql().to_string();
        let running = Arc::clone(&statement);
        let task = tokio::task::spawn_blocking(move || {
            let out = run_sql(&mut connection, &sql, row_cap);
            // Cleared before the guard returns the connection to the pool.
            running.finish();
            drop(connection);
            out
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(Ok(Ok(results))) => {
                tracing::debug!(
                    target: "statline::executor",
                    rows = results.len(),
                    truncated = results.truncated,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "[Execute] query finished"
                );
                Ok(results)
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(join)) => Err(ExecutionError::Permanent(format!(
                "query task failed: {}",
                join
            ))),
            Err(_) => {
                let interrupted = statement.interrupt_if_running();
                tracing::warn!(
                    target: "statline::executor",
                    failure = "timeout",
                    timeout_ms = timeout.as_millis() as u64,
                    interrupted,
                    "[Execute] statement timed out"
                );
                Err(ExecutionError::Timeout(timeout))
            }
        }
    }
}

/// Interrupt handle that only fires while its statement is still running.
///
/// Once the blocking task has finished, the connection may already belong
/// to the next caller, so a late timeout must leave it alone.
pub(crate) struct RunningStatement {
    handle: InterruptHandle,
    running: Mutex<bool>,
}

impl RunningStatement {
    pub(crate) fn new(handle: InterruptHandle) -> Self {
        Self {
            handle,
            running: Mutex::new(true),
        }
    }

    pub(crate) fn finish(&self) {
        *self.lock() = false;
    }

    /// Returns whether the interrupt was sent.
    pub(crate) fn interrupt_if_running(&self) -> bool {
        let running = self.lock();
        if *running {
            self.handle.interrupt();
        }
        *running
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, bool> {
        self.running.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Runs one statement and collects at most `row_cap` rows.
pub(crate) fn run_sql(
    connection: &mut Connection,
    sql: &str,
    row_cap: usize,
) -> Result<ResultSet, ExecutionError> {
    let tx = connection
        .transaction_with_behavior(TransactionBehavior::Deferred)
        .map_err(classify)?;
    let results = {
        let mut stmt = tx.prepare(sql).map_err(classify)?;
        if !stmt.readonly() {
            return Err(ExecutionError::Permanent(
                "statement is not read-only".into(),
            ));
        }
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut rows = stmt.query([]).map_err(classify)?;
        let mut out = Vec::new();
        let mut truncated = false;
        while let Some(row) = rows.next().map_err(classify)? {
            if out.len() == row_cap {
                truncated = true;
                break;
            }
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(scalar(row.get_ref(i).map_err(classify)?));
            }
            out.push(values);
        }
        ResultSet::new(columns, out, truncated)
    };
    tx.rollback().map_err(classify)?;
    Ok(results)
}

fn scalar(value: ValueRef<'_>) -> Scalar {
    match value {
        ValueRef::Null => Scalar::Null,
        ValueRef::Integer(v) => Scalar::Integer(v),
        ValueRef::Real(v) => Scalar::Real(v),
        ValueRef::Text(bytes) => Scalar::Text(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => Scalar::Text(format!("<{} bytes>", bytes.len())),
    }
}

fn classify(error: rusqlite::Error) -> ExecutionError {
    match error.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen) => {
            ExecutionError::Transient(error.to_string())
        }
        _ => ExecutionError::Permanent(error.to_string()),
    }
}
