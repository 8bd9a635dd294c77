//! Execution of validated queries against the statistics store.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::query::ValidatedQuery;
use crate::result::ResultSet;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    /// Busy or locked database, dropped connection. Worth one retry.
    #[error("transient database error: {0}")]
    Transient(String),

    #[error("database error: {0}")]
    Permanent(String),

    #[error("statement exceeded {0:?}")]
    Timeout(Duration),
}

impl ExecutionError {
    pub fn is_transient(&self) -> bool {
        matches!(self, ExecutionError::Transient(_))
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ExecutionError::Timeout(_))
    }
}

/// Runs a [`ValidatedQuery`] under a read-only, time-boxed session.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    /// Executes the query.
    ///
    /// # Arguments
    ///
    /// * `query` - A query accepted by the validator
    /// * `timeout` - Statement timeout
    /// * `row_cap` - Maximum rows returned; `truncated` is set when more exist
    ///
    /// # Returns
    ///
    /// * `Ok(ResultSet)` - Rows in query order, possibly empty
    /// * `Err(ExecutionError)` - Classified failure
    async fn execute(
        &self,
        query: &ValidatedQuery,
        timeout: Duration,
        row_cap: usize,
    ) -> Result<ResultSet, ExecutionError>;
}

/// Retries a transient failure exactly once after a fixed backoff.
pub struct RetryingExecutor {
    inner: Arc<dyn QueryExecutor>,
    backoff: Duration,
}

impl RetryingExecutor {
    pub fn new(inner: Arc<dyn QueryExecutor>, backoff: Duration) -> Self {
        Self { inner, backoff }
    }
}

#[async_trait]
impl QueryExecutor for RetryingExecutor {
    async fn execute(
        &self,
        query: &ValidatedQuery,
        timeout: Duration,
        row_cap: usize,
    ) -> Result<ResultSet, ExecutionError> {
        match self.inner.execute(query, timeout, row_cap).await {
            Err(ExecutionError::Transient(first)) => {
                tracing::warn!(
                    target: "statline::executor",
                    error = %first,
                    backoff_ms = self.backoff.as_millis() as u64,
                    "[Executor] transient failure, retrying once"
                );
                tokio::time::sleep(self.backoff).await;
                match self.inner.execute(query, timeout, row_cap).await {
                    Err(ExecutionError::Transient(second)) => Err(ExecutionError::Permanent(
                        format!("still failing after retry: {}", second),
                    )),
                    other => other,
                }
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::catalog::SchemaCatalog;
    use crate::query::{QueryValidator, ValidatorLimits};
    use crate::result::Scalar;

    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
        error: ExecutionError,
    }

    #[async_trait]
    impl QueryExecutor for Flaky {
        async fn execute(
            &self,
            _query: &ValidatedQuery,
            _timeout: Duration,
            _row_cap: usize,
        ) -> Result<ResultSet, ExecutionError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(ResultSet::new(
                    vec!["wins".into()],
                    vec![vec![Scalar::Integer(18)]],
                    false,
                ))
            }
        }
    }

    fn query() -> ValidatedQuery {
        QueryValidator::new(
            Arc::new(SchemaCatalog::builtin().unwrap()),
            ValidatorLimits::default(),
        )
        .validate_sql("SELECT name FROM teams")
        .unwrap()
    }

    fn flaky(failures: usize, error: ExecutionError) -> Arc<Flaky> {
        Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures,
            error,
        })
    }

    #[tokio::test]
    async fn one_transient_failure_is_absorbed() {
        let inner = flaky(1, ExecutionError::Transient("busy".into()));
        let executor = RetryingExecutor::new(inner.clone(), Duration::from_millis(1));
        let rows = executor
            .execute(&query(), Duration::from_secs(1), 10)
            .await
            .unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn second_transient_failure_is_permanent() {
        let inner = flaky(5, ExecutionError::Transient("busy".into()));
        let executor = RetryingExecutor::new(inner.clone(), Duration::from_millis(1));
        let err = executor
            .execute(&query(), Duration::from_secs(1), 10)
            .await
            .unwrap_err();
        assert!(matches!(err, ExecutionError::Permanent(_)));
        assert_eq!(inner.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn timeouts_are_not_retried() {
        let inner = flaky(5, ExecutionError::Timeout(Duration::from_millis(50)));
        let executor = RetryingExecutor::new(inner.clone(), Duration::from_millis(1));
        let err = executor
            .execute(&query(), Duration::from_secs(1), 10)
            .await
            .unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(inner.calls.load(Ordering::SeqCst), 1);
    }
}
