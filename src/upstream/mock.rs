//! In-memory connector for unit tests.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::pool::server::{ServerDescriptor, ServerKey};
use crate::upstream::{Connection, Connector, ProtocolError};

#[derive(Debug, Default)]
pub struct MockStats {
    pub connect_attempts: AtomicUsize,
    pub connects: AtomicUsize,
    pub disconnects: AtomicUsize,
    pub probes: AtomicUsize,
    pub executes: AtomicUsize,
}

impl MockStats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    pub fn connect_attempts(&self) -> usize {
        self.connect_attempts.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Default)]
struct MockInner {
    unreachable: Mutex<HashSet<ServerKey>>,
    attempts: Mutex<HashMap<ServerKey, usize>>,
    probe_fails: AtomicBool,
    failing_connects: AtomicUsize,
    panic_on_connect: AtomicBool,
    stats: MockStats,
}

/// Connector whose servers are all reachable until told otherwise.
#[derive(Debug, Clone, Default)]
pub struct MockConnector {
    inner: Arc<MockInner>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_reachable(&self, server: &ServerDescriptor, reachable: bool) {
        let mut unreachable = self.inner.unreachable.lock();
        if reachable {
            unreachable.remove(&server.key());
        } else {
            unreachable.insert(server.key());
        }
    }

    pub fn fail_probes(&self, fail: bool) {
        self.inner.probe_fails.store(fail, Ordering::SeqCst);
    }

    /// Refuse the next `count` connect attempts regardless of server.
    pub fn fail_next_connects(&self, count: usize) {
        self.inner.failing_connects.store(count, Ordering::SeqCst);
    }

    pub fn panic_on_connect(&self, panic: bool) {
        self.inner.panic_on_connect.store(panic, Ordering::SeqCst);
    }

    pub fn stats(&self) -> &MockStats {
        &self.inner.stats
    }

    pub fn attempts_for(&self, server: &ServerDescriptor) -> usize {
        self.inner
            .attempts
            .lock()
            .get(&server.key())
            .copied()
            .unwrap_or(0)
    }

    /// Connections opened and not yet disconnected.
    pub fn open(&self) -> usize {
        self.stats().connects() - self.stats().disconnects()
    }
}

#[async_trait]
impl Connector for MockConnector {
    type Conn = MockConnection;

    async fn connect(
        &self,
        server: &ServerDescriptor,
        _timeout: Duration,
    ) -> Result<MockConnection, ProtocolError> {
        let inner = &self.inner;
        inner.stats.connect_attempts.fetch_add(1, Ordering::SeqCst);
        *inner.attempts.lock().entry(server.key()).or_insert(0) += 1;

        if inner.panic_on_connect.load(Ordering::SeqCst) {
            panic!("mock connector panic");
        }
        let forced = inner
            .failing_connects
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if forced || inner.unreachable.lock().contains(&server.key()) {
            return Err(ProtocolError::Connect {
                address: server.address(),
                source: std::io::Error::from(std::io::ErrorKind::ConnectionRefused),
            });
        }

        inner.stats.connects.fetch_add(1, Ordering::SeqCst);
        Ok(MockConnection {
            server: server.key(),
            inner: Arc::clone(inner),
            open: true,
        })
    }
}

#[derive(Debug)]
pub struct MockConnection {
    server: ServerKey,
    inner: Arc<MockInner>,
    open: bool,
}

impl MockConnection {
    pub fn server(&self) -> &ServerKey {
        &self.server
    }
}

#[async_trait]
impl Connection for MockConnection {
    type Request = String;
    type Response = String;

    async fn probe(&mut self) -> bool {
        self.inner.stats.probes.fetch_add(1, Ordering::SeqCst);
        self.open && !self.inner.probe_fails.load(Ordering::SeqCst)
    }

    async fn execute(&mut self, request: String) -> Result<String, ProtocolError> {
        self.inner.stats.executes.fetch_add(1, Ordering::SeqCst);
        if !self.open {
            return Err(ProtocolError::Closed);
        }
        match request.as_str() {
            "fail" => Err(ProtocolError::Malformed("mock failure".into())),
            "close" => Err(ProtocolError::Closed),
            "hang" => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(String::new())
            }
            _ => Ok(format!("{}/{}", self.server, request)),
        }
    }

    async fn disconnect(&mut self) {
        if self.open {
            self.open = false;
            self.inner.stats.disconnects.fetch_add(1, Ordering::SeqCst);
        }
    }
}
