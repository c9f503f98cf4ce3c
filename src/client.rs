//! Client façade: acquire, run one operation, give the connection back.

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

use crate::config::GatewayConfig;
use crate::observability::metrics;
use crate::pool::{PoolError, PoolManager, Pooled};
use crate::resilience::timeouts::{with_deadline, Elapsed};
use crate::upstream::{Connection, Connector, ProtocolError};

/// Why an operation produced no result.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no upstream connection available: {0}")]
    Unavailable(#[source] PoolError),

    #[error("operation failed: {0}")]
    Operation(#[source] ProtocolError),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("operation panicked: {0}")]
    Panicked(String),
}

type Request<C> = <<C as Connector>::Conn as Connection>::Request;
type Response<C> = <<C as Connector>::Conn as Connection>::Response;

enum Lease {
    Pooled,
    OneShot,
}

/// Runs operations against whichever upstream server the pool hands out.
pub struct Client<C: Connector> {
    pool: PoolManager<C>,
    operation_timeout: Option<Duration>,
    degraded_fallback: bool,
}

impl<C: Connector> Clone for Client<C> {
    fn clone(&self) -> Self {
        Self {
            pool: self.pool.clone(),
            operation_timeout: self.operation_timeout,
            degraded_fallback: self.degraded_fallback,
        }
    }
}

impl<C: Connector> Client<C> {
    pub fn new(pool: PoolManager<C>) -> Self {
        Self {
            pool,
            operation_timeout: Some(Duration::from_secs(30)),
            degraded_fallback: true,
        }
    }

    pub fn from_config(pool: PoolManager<C>, config: &GatewayConfig) -> Self {
        Self::new(pool)
            .with_operation_timeout(config.timeouts.operation())
            .with_degraded_fallback(config.client.degraded_fallback)
    }

    /// `None` disables the deadline.
    pub fn with_operation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_degraded_fallback(mut self, enabled: bool) -> Self {
        self.degraded_fallback = enabled;
        self
    }

    pub fn pool(&self) -> &PoolManager<C> {
        &self.pool
    }

    /// Run `op` on a checked-out connection.
    ///
    /// Operation errors do not count against the server's health. A
    /// connection whose operation timed out, panicked or broke the session
    /// is disconnected instead of returned to the pool.
    pub async fn call<T, F>(&self, op: F) -> Result<T, ClientError>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut C::Conn) -> BoxFuture<'c, Result<T, ProtocolError>> + Send,
    {
        let started = Instant::now();
        let (mut conn, lease) = match self.pool.acquire().await {
            Ok(conn) => (conn, Lease::Pooled),
            Err(e) => match self.degraded_connection().await {
                Some(conn) => (conn, Lease::OneShot),
                None => {
                    metrics::record_operation("unavailable", started);
                    return Err(ClientError::Unavailable(e));
                }
            },
        };

        let result = with_deadline(
            self.operation_timeout,
            AssertUnwindSafe(op(&mut *conn)).catch_unwind(),
        )
        .await;

        let (outcome, reusable) = match result {
            Ok(Ok(Ok(value))) => {
                self.pool.record_success(conn.server());
                (Ok(value), true)
            }
            Ok(Ok(Err(e))) => {
                let reusable = !matches!(e, ProtocolError::Io(_) | ProtocolError::Closed);
                tracing::warn!(server = %conn.server(), error = %e, "Upstream operation failed");
                (Err(ClientError::Operation(e)), reusable)
            }
            Ok(Err(panic)) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::error!(server = %conn.server(), error = %message, "Upstream operation panicked");
                (Err(ClientError::Panicked(message)), false)
            }
            Err(Elapsed(limit)) => {
                tracing::warn!(
                    server = %conn.server(),
                    timeout_ms = limit.as_millis() as u64,
                    "Upstream operation timed out, discarding connection"
                );
                (Err(ClientError::Timeout(limit)), false)
            }
        };

        metrics::record_operation(if outcome.is_ok() { "ok" } else { "error" }, started);

        match lease {
            Lease::Pooled if reusable => self.pool.release(conn).await,
            Lease::Pooled | Lease::OneShot => self.pool.discard(conn).await,
        }

        outcome
    }

    /// [`call`](Self::call), logging the failure and returning `None`.
    pub async fn run_with_connection<T, F>(&self, op: F) -> Option<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut C::Conn) -> BoxFuture<'c, Result<T, ProtocolError>> + Send,
    {
        match self.call(op).await {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(error = %e, "No data returned from upstream");
                None
            }
        }
    }

    /// Send one request and return its response.
    pub async fn execute(&self, request: Request<C>) -> Result<Response<C>, ClientError> {
        self.call(move |conn| conn.execute(request)).await
    }

    /// A throwaway connection to the current primary, for when the pool has
    /// nothing to offer. The caller always disconnects it.
    async fn degraded_connection(&self) -> Option<Pooled<C>> {
        if !self.degraded_fallback {
            return None;
        }
        let server = self.pool.current_server()?;
        match self.pool.open(&server).await {
            Ok(conn) => {
                self.pool.record_success(&server);
                tracing::warn!(server = %server, "Pool exhausted, using one-shot connection");
                Some(conn)
            }
            Err(e) => {
                tracing::debug!(server = %server, error = %e, "One-shot connection failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthState;
    use crate::pool::{PoolSettings, ServerDescriptor};
    use crate::upstream::mock::{MockConnection, MockConnector};

    fn server() -> ServerDescriptor {
        ServerDescriptor::new("10.0.0.1", 7709).with_name("s1")
    }

    fn client(mock: &MockConnector) -> Client<MockConnector> {
        let pool = PoolManager::new(mock.clone(), vec![server()], PoolSettings::default());
        Client::new(pool).with_operation_timeout(Some(Duration::from_secs(5)))
    }

    #[tokio::test]
    async fn execute_returns_response_and_releases() {
        let mock = MockConnector::new();
        let client = client(&mock);

        let response = client.execute("quote".to_string()).await.unwrap();

        assert_eq!(response, "10.0.0.1:7709/quote");
        assert_eq!(client.pool().idle_count(&server().key()), 1);
    }

    #[tokio::test]
    async fn operation_error_keeps_server_healthy() {
        let mock = MockConnector::new();
        let client = client(&mock);

        let err = client.execute("fail".to_string()).await.unwrap_err();

        assert!(matches!(err, ClientError::Operation(ProtocolError::Malformed(_))));
        assert_eq!(client.pool().health_state(&server().key()), HealthState::Healthy);
        assert_eq!(client.pool().idle_count(&server().key()), 1);
    }

    #[tokio::test]
    async fn broken_session_is_discarded() {
        let mock = MockConnector::new();
        let client = client(&mock);

        let err = client.execute("close".to_string()).await.unwrap_err();

        assert!(matches!(err, ClientError::Operation(ProtocolError::Closed)));
        assert_eq!(client.pool().idle_count(&server().key()), 0);
        assert_eq!(mock.open(), 0);
        assert_eq!(mock.stats().disconnects(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn timed_out_connection_is_discarded() {
        let mock = MockConnector::new();
        let client = client(&mock);

        let err = client.execute("hang".to_string()).await.unwrap_err();

        assert!(matches!(err, ClientError::Timeout(d) if d == Duration::from_secs(5)));
        assert_eq!(client.pool().idle_count(&server().key()), 0);
        assert_eq!(mock.open(), 0);
    }

    #[tokio::test]
    async fn panicking_operation_is_contained() {
        let mock = MockConnector::new();
        let client = client(&mock);

        fn explode(_conn: &mut MockConnection) -> BoxFuture<'_, Result<(), ProtocolError>> {
            Box::pin(async { panic!("decoder bug") })
        }

        let err = client.call(explode).await.unwrap_err();

        assert!(matches!(err, ClientError::Panicked(ref msg) if msg == "decoder bug"));
        assert_eq!(mock.open(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn degraded_fallback_uses_one_shot_connection() {
        let mock = MockConnector::new();
        let client = client(&mock);
        mock.fail_next_connects(3);

        let response = client.execute("quote".to_string()).await.unwrap();

        assert_eq!(response, "10.0.0.1:7709/quote");
        assert_eq!(client.pool().idle_count(&server().key()), 0);
        assert_eq!(mock.open(), 0);
        assert_eq!(client.pool().health_state(&server().key()), HealthState::Healthy);
    }

    #[tokio::test(start_paused = true)]
    async fn unavailable_without_fallback() {
        let mock = MockConnector::new();
        let client = client(&mock).with_degraded_fallback(false);
        mock.fail_next_connects(3);

        let err = client.execute("quote".to_string()).await.unwrap_err();
        assert!(matches!(err, ClientError::Unavailable(PoolError::Exhausted { .. })));
        assert_eq!(mock.stats().connect_attempts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn run_with_connection_flattens_failure() {
        let mock = MockConnector::new();
        mock.set_reachable(&server(), false);
        let client = client(&mock);

        let result = client
            .run_with_connection(|conn| conn.execute("quote".to_string()))
            .await;
        assert!(result.is_none());
    }
}
