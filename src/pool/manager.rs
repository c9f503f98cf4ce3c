//! Multi-server pool orchestration.
//!
//! # Responsibilities
//! - Own the registered server list, the pinned primary and health records
//! - Hand out connections: reuse a probed idle one, or open a fresh one
//! - Retry and fail over across servers in candidate order
//! - Take connections back, disconnecting what the pool cannot hold
//!
//! # Locking
//! Server list, primary index and health registry live behind one mutex,
//! never held across an await. Each server's idle queue has its own lock.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{self, Instant};

use crate::config::GatewayConfig;
use crate::health::registry::{HealthPolicy, HealthRegistry, HealthState, ServerHealth};
use crate::observability::metrics;
use crate::pool::connection::PooledConnection;
use crate::pool::failover;
use crate::pool::idle::IdlePool;
use crate::pool::server::{ServerDescriptor, ServerKey};
use crate::pool::status::{PoolStatus, ServerStatus, ServerSummary, ServerTestReport, TestOutcome};
use crate::resilience::backoff::RetryPolicy;
use crate::resilience::timeouts::connect_with_timeout;
use crate::upstream::{Connection, Connector, ProtocolError};

/// A checked-out connection produced by connector `C`.
pub type Pooled<C> = PooledConnection<<C as Connector>::Conn>;

/// Why the pool could not produce a connection.
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("no upstream servers registered")]
    NoServers,

    #[error("all servers unavailable ({attempted} tried)")]
    Exhausted {
        attempted: usize,
        #[source]
        last_error: Option<ProtocolError>,
    },
}

/// Tuning for a [`PoolManager`].
#[derive(Debug, Clone)]
pub struct PoolSettings {
    pub max_connections_per_server: usize,
    pub retry: RetryPolicy,
    pub connect_timeout: Duration,
    pub warmup_connections: usize,
    pub health: HealthPolicy,
}

impl PoolSettings {
    pub fn from_config(config: &GatewayConfig) -> Self {
        Self {
            max_connections_per_server: config.pool.max_connections_per_server,
            retry: RetryPolicy::new(
                config.pool.retry_times,
                Duration::from_millis(config.pool.retry_backoff_ms),
            ),
            connect_timeout: config.timeouts.connect(),
            warmup_connections: config.pool.warmup_connections,
            health: HealthPolicy {
                unhealthy_threshold: config.health.unhealthy_threshold,
                recovery_time: config.health.recovery_time(),
            },
        }
    }
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_connections_per_server: 5,
            retry: RetryPolicy::default(),
            connect_timeout: Duration::from_secs(3),
            warmup_connections: 2,
            health: HealthPolicy::default(),
        }
    }
}

struct PoolState<T> {
    servers: Vec<ServerDescriptor>,
    primary: usize,
    pools: HashMap<ServerKey, Arc<IdlePool<T>>>,
    health: HealthRegistry,
}

impl<T> PoolState<T> {
    /// Returns false if the server was already registered.
    fn register(&mut self, server: ServerDescriptor, capacity: usize) -> bool {
        if self.servers.contains(&server) {
            return false;
        }
        let key = server.key();
        self.health.register(key.clone());
        self.pools
            .entry(key)
            .or_insert_with(|| Arc::new(IdlePool::new(capacity)));
        self.servers.push(server);
        true
    }

    fn index_of(&self, key: &ServerKey) -> Option<usize> {
        self.servers.iter().position(|s| s.matches(key))
    }

    fn primary(&self) -> Option<&ServerDescriptor> {
        self.servers.get(self.primary)
    }
}

struct Shared<C: Connector> {
    connector: C,
    settings: PoolSettings,
    state: Mutex<PoolState<C::Conn>>,
}

/// Health-aware connection pool over a set of redundant upstream servers.
///
/// Cheap to clone; clones share the same pool.
pub struct PoolManager<C: Connector> {
    shared: Arc<Shared<C>>,
}

impl<C: Connector> Clone for PoolManager<C> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<C: Connector> PoolManager<C> {
    /// Create a pool over `servers`; the first one starts as primary.
    /// Duplicate descriptors are ignored.
    pub fn new(connector: C, servers: Vec<ServerDescriptor>, settings: PoolSettings) -> Self {
        let mut state = PoolState {
            servers: Vec::with_capacity(servers.len()),
            primary: 0,
            pools: HashMap::new(),
            health: HealthRegistry::new(settings.health),
        };
        for server in servers {
            let name = server.to_string();
            if !state.register(server, settings.max_connections_per_server) {
                tracing::warn!(server = %name, "Duplicate server ignored");
            }
        }

        tracing::info!(
            servers = state.servers.len(),
            max_connections_per_server = settings.max_connections_per_server,
            retry_times = settings.retry.attempts,
            "Connection pool created"
        );

        Self {
            shared: Arc::new(Shared {
                connector,
                settings,
                state: Mutex::new(state),
            }),
        }
    }

    /// Create a pool from a validated configuration.
    pub fn from_config(connector: C, config: &GatewayConfig) -> Self {
        let pool = Self::new(
            connector,
            config.server_descriptors(),
            PoolSettings::from_config(config),
        );
        if let Some(primary) = config.primary_server() {
            pool.set_primary(primary);
        }
        pool
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.shared.settings
    }

    pub fn connector(&self) -> &C {
        &self.shared.connector
    }

    // --- Acquire / release ---

    /// Check out a connection, failing over across servers as needed.
    ///
    /// Blocks at most for the retry backoff of each candidate plus its
    /// connect timeouts. Never leaves a failed attempt's session open.
    pub async fn acquire(&self) -> Result<Pooled<C>, PoolError> {
        let candidates = self.candidates();
        if candidates.is_empty() {
            metrics::record_acquire("exhausted");
            return Err(PoolError::NoServers);
        }

        let attempted = candidates.len();
        let mut last_error = None;

        for server in candidates {
            if let Some(conn) = self.take_idle(&server).await {
                metrics::record_acquire("reused");
                return Ok(conn);
            }

            match self.connect_with_retries(&server).await {
                Ok(conn) => {
                    self.record_success(&server);
                    self.pin(&server);
                    metrics::record_acquire("created");
                    return Ok(conn);
                }
                Err(e) => {
                    tracing::warn!(
                        server = %server,
                        attempts = self.shared.settings.retry.attempts,
                        error = %e,
                        "Server unreachable, failing over"
                    );
                    self.record_failure(&server);
                    last_error = Some(e);
                }
            }
        }

        tracing::error!(attempted, "All upstream servers unavailable");
        metrics::record_acquire("exhausted");
        Err(PoolError::Exhausted {
            attempted,
            last_error,
        })
    }

    /// Return a connection to its server's pool.
    ///
    /// Liveness is not re-checked here; the next acquire probes it. A full
    /// pool, a reset since checkout or an unknown server closes it instead.
    pub async fn release(&self, conn: Pooled<C>) {
        let server = conn.server().clone();
        let Some(pool) = self.idle_pool(&server.key()) else {
            self.discard(conn).await;
            return;
        };

        match pool.try_put(conn) {
            Ok(()) => {
                metrics::record_idle_connections(&server.display_name(), pool.len());
            }
            Err(rejected) => {
                tracing::debug!(
                    server = %server,
                    connection_id = %rejected.id(),
                    "Pool full or reset, closing connection"
                );
                self.discard(rejected).await;
            }
        }
    }

    /// Close a connection without returning it to any pool.
    pub async fn discard(&self, mut conn: Pooled<C>) {
        conn.disconnect().await;
    }

    async fn take_idle(&self, server: &ServerDescriptor) -> Option<Pooled<C>> {
        let pool = self.idle_pool(&server.key())?;
        let mut conn = pool.try_take()?;
        metrics::record_idle_connections(&server.display_name(), pool.len());

        if conn.probe().await {
            self.record_success(server);
            tracing::debug!(server = %server, connection_id = %conn.id(), "Reusing idle connection");
            return Some(conn);
        }

        tracing::debug!(
            server = %server,
            connection_id = %conn.id(),
            "Idle connection failed probe, discarding"
        );
        metrics::record_probe_failure(&server.display_name());
        conn.disconnect().await;
        None
    }

    async fn connect_with_retries(
        &self,
        server: &ServerDescriptor,
    ) -> Result<Pooled<C>, ProtocolError> {
        let retry = self.shared.settings.retry;
        let mut attempt = 1;
        loop {
            match self.open(server).await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    tracing::debug!(server = %server, attempt, error = %e, "Connect attempt failed");
                    match retry.delay_after(attempt) {
                        Some(delay) => {
                            time::sleep(delay).await;
                            attempt += 1;
                        }
                        None => return Err(e),
                    }
                }
            }
        }
    }

    /// Open one session to `server`. Does not touch health records.
    pub(crate) async fn open(&self, server: &ServerDescriptor) -> Result<Pooled<C>, ProtocolError> {
        // Read before connecting so a reset during the handshake marks it stale.
        let generation = self
            .idle_pool(&server.key())
            .map_or(0, |pool| pool.generation());

        let name = server.display_name();
        match connect_with_timeout(
            &self.shared.connector,
            server,
            self.shared.settings.connect_timeout,
        )
        .await
        {
            Ok(conn) => {
                metrics::record_connection_opened(&name);
                let pooled = PooledConnection::new(conn, server.clone(), generation);
                tracing::debug!(server = %server, connection_id = %pooled.id(), "Opened upstream connection");
                Ok(pooled)
            }
            Err(e) => {
                metrics::record_connect_failure(&name);
                Err(e)
            }
        }
    }

    // --- Health ---

    pub(crate) fn record_success(&self, server: &ServerDescriptor) {
        self.shared.state.lock().health.record_success(&server.key());
        metrics::record_server_health(&server.display_name(), HealthState::Healthy);
    }

    pub(crate) fn record_failure(&self, server: &ServerDescriptor) {
        let key = server.key();
        let state = {
            let mut guard = self.shared.state.lock();
            guard.health.record_failure(&key);
            guard.health.state(&key)
        };
        metrics::record_server_health(&server.display_name(), state);
    }

    pub fn health_state(&self, key: &ServerKey) -> HealthState {
        self.shared.state.lock().health.state(key)
    }

    pub fn health(&self, key: &ServerKey) -> Option<ServerHealth> {
        self.shared.state.lock().health.get(key).cloned()
    }

    pub fn is_available(&self, key: &ServerKey) -> bool {
        self.shared.state.lock().health.is_available(key)
    }

    pub(crate) fn recovery_due(&self, key: &ServerKey) -> bool {
        self.shared.state.lock().health.recovery_due(key)
    }

    // --- Server list ---

    /// Candidate servers for the next acquisition, best first.
    pub fn candidates(&self) -> Vec<ServerDescriptor> {
        let state = self.shared.state.lock();
        failover::candidates(&state.servers, state.primary, &state.health)
    }

    pub fn servers(&self) -> Vec<ServerDescriptor> {
        self.shared.state.lock().servers.clone()
    }

    pub fn current_server(&self) -> Option<ServerDescriptor> {
        self.shared.state.lock().primary().cloned()
    }

    /// Register a server at the end of the failover order.
    /// Returns false if it was already registered.
    pub fn add_server(&self, server: ServerDescriptor) -> bool {
        let name = server.to_string();
        let added = self
            .shared
            .state
            .lock()
            .register(server, self.shared.settings.max_connections_per_server);
        if added {
            tracing::info!(server = %name, "Server registered");
        }
        added
    }

    /// Pin `server` as primary, registering it first if needed.
    /// Returns true if the server was newly registered.
    pub fn set_primary(&self, server: ServerDescriptor) -> bool {
        let name = server.to_string();
        let key = server.key();
        let added = {
            let mut state = self.shared.state.lock();
            let added = state.register(server, self.shared.settings.max_connections_per_server);
            if let Some(index) = state.index_of(&key) {
                state.primary = index;
            }
            added
        };
        tracing::info!(server = %name, added, "Primary server set");
        added
    }

    /// Sticky pinning: a server that just produced a fresh connection
    /// becomes the default for later acquisitions.
    fn pin(&self, server: &ServerDescriptor) {
        let mut state = self.shared.state.lock();
        let Some(index) = state.index_of(&server.key()) else {
            return;
        };
        if index != state.primary {
            let previous = state.primary().map(ToString::to_string).unwrap_or_default();
            state.primary = index;
            tracing::info!(from = %previous, to = %server, "Failed over to new primary server");
        }
    }

    /// Register any new servers, pin `primary`, and reset every pool.
    ///
    /// A list that adds nothing and keeps the current primary leaves the
    /// pools untouched. Returns whether anything changed.
    pub async fn apply_server_list(
        &self,
        servers: Vec<ServerDescriptor>,
        primary: Option<ServerDescriptor>,
    ) -> bool {
        let unchanged = {
            let state = self.shared.state.lock();
            let registered = servers
                .iter()
                .all(|server| state.index_of(&server.key()).is_some());
            let same_primary = match &primary {
                Some(primary) => state.primary().map(ServerDescriptor::key) == Some(primary.key()),
                None => true,
            };
            registered && same_primary
        };
        if unchanged {
            tracing::debug!("Server list unchanged, keeping pools");
            return false;
        }

        let added = servers
            .into_iter()
            .filter(|server| self.add_server(server.clone()))
            .count();
        if let Some(primary) = primary {
            self.set_primary(primary);
        }
        let closed = self.reset_all().await;
        tracing::info!(added, closed, "Applied server list");
        true
    }

    // --- Idle pools ---

    pub(crate) fn idle_pool(&self, key: &ServerKey) -> Option<Arc<IdlePool<C::Conn>>> {
        self.shared.state.lock().pools.get(key).cloned()
    }

    pub fn idle_count(&self, key: &ServerKey) -> usize {
        self.idle_pool(key).map_or(0, |pool| pool.len())
    }

    fn pools_snapshot(&self) -> Vec<(ServerDescriptor, Arc<IdlePool<C::Conn>>)> {
        let state = self.shared.state.lock();
        state
            .servers
            .iter()
            .filter_map(|s| state.pools.get(&s.key()).map(|p| (s.clone(), Arc::clone(p))))
            .collect()
    }

    /// Disconnect every idle connection of one server. Connections checked
    /// out at this point are closed when released. Returns how many closed.
    pub async fn reset_pool(&self, key: &ServerKey) -> usize {
        let target = self
            .pools_snapshot()
            .into_iter()
            .find(|(server, _)| server.matches(key));
        match target {
            Some((server, pool)) => Self::drain_pool(&server, &pool).await,
            None => 0,
        }
    }

    /// [`reset_pool`](Self::reset_pool) for every server.
    pub async fn reset_all(&self) -> usize {
        let mut closed = 0;
        for (server, pool) in self.pools_snapshot() {
            closed += Self::drain_pool(&server, &pool).await;
        }
        closed
    }

    /// Close all idle connections, for process shutdown.
    pub async fn close_all(&self) -> usize {
        let closed = self.reset_all().await;
        tracing::info!(closed, "Closed all idle connections");
        closed
    }

    async fn drain_pool(server: &ServerDescriptor, pool: &IdlePool<C::Conn>) -> usize {
        let drained = pool.drain();
        let count = drained.len();
        for mut conn in drained {
            conn.disconnect().await;
        }
        metrics::record_idle_connections(&server.display_name(), 0);
        tracing::info!(server = %server, closed = count, "Pool reset");
        count
    }

    // --- Reporting ---

    pub fn status(&self) -> PoolStatus {
        let state = self.shared.state.lock();
        let servers = state
            .servers
            .iter()
            .enumerate()
            .map(|(index, server)| {
                let key = server.key();
                let health = state.health.get(&key);
                ServerStatus {
                    name: server.display_name(),
                    host: server.host.clone(),
                    port: server.port,
                    health_status: health.map_or(HealthState::Unknown, |h| h.state),
                    fail_count: health.map_or(0, |h| h.consecutive_failures),
                    idle_pool_size: state.pools.get(&key).map_or(0, |p| p.len()),
                    is_current: index == state.primary,
                }
            })
            .collect();

        PoolStatus {
            current_server: state.primary().map(ServerSummary::from),
            max_connections_per_server: self.shared.settings.max_connections_per_server,
            retry_times: self.shared.settings.retry.attempts,
            servers,
        }
    }

    /// Open and immediately close a throwaway session to `server`.
    /// Leaves health records and idle pools untouched.
    pub async fn test_server(&self, server: &ServerDescriptor) -> ServerTestReport {
        let started = Instant::now();
        let result = connect_with_timeout(
            &self.shared.connector,
            server,
            self.shared.settings.connect_timeout,
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let (reason, error) = match result {
            Ok(mut conn) => {
                conn.disconnect().await;
                (TestOutcome::Ok, None)
            }
            Err(e) => {
                let reason = match &e {
                    ProtocolError::Timeout(_) => TestOutcome::Timeout,
                    ProtocolError::Handshake(_) => TestOutcome::HandshakeFailed,
                    _ => TestOutcome::ConnectFailed,
                };
                (reason, Some(e.to_string()))
            }
        };

        tracing::info!(server = %server, latency_ms, reason = ?reason, "Server test finished");
        ServerTestReport {
            server: ServerSummary::from(server),
            success: reason == TestOutcome::Ok,
            latency_ms,
            reason,
            error,
        }
    }
}
