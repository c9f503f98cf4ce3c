//! Shared utilities for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use market_gateway::config::{GatewayConfig, ServerConfig};

/// Framed upstream server on localhost.
///
/// Heartbeats are answered with an empty frame; any other frame `p` is
/// answered with `"<name>:<p>"`.
pub struct MockUpstream {
    pub name: &'static str,
    pub addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    tasks: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl MockUpstream {
    pub async fn start(name: &'static str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let tasks: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::new(Mutex::new(Vec::new()));

        let accept_task = {
            let accepted = Arc::clone(&accepted);
            let tasks = Arc::clone(&tasks);
            tokio::spawn(async move {
                while let Ok((socket, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    tasks.lock().push(tokio::spawn(serve(name, socket)));
                }
            })
        };
        tasks.lock().push(accept_task);

        Self {
            name,
            addr,
            accepted,
            tasks,
        }
    }

    /// TCP connections accepted so far.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Stop listening and drop every open session.
    pub fn stop(&self) {
        for task in self.tasks.lock().drain(..) {
            task.abort();
        }
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            name: Some(self.name.to_string()),
            host: self.addr.ip().to_string(),
            port: self.addr.port(),
        }
    }
}

impl Drop for MockUpstream {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn serve(name: &'static str, mut socket: TcpStream) {
    loop {
        let mut header = [0u8; 4];
        if socket.read_exact(&mut header).await.is_err() {
            return;
        }
        let mut body = vec![0u8; u32::from_be_bytes(header) as usize];
        if socket.read_exact(&mut body).await.is_err() {
            return;
        }

        let reply = if body.is_empty() {
            Vec::new()
        } else {
            let mut reply = format!("{name}:").into_bytes();
            reply.extend_from_slice(&body);
            reply
        };
        let len = (reply.len() as u32).to_be_bytes();
        if socket.write_all(&len).await.is_err() || socket.write_all(&reply).await.is_err() {
            return;
        }
    }
}

/// A localhost port with nothing listening on it.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Gateway config over `servers` with fast retries and no maintainer.
pub fn config_for(servers: Vec<ServerConfig>) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.servers = servers;
    config.pool.retry_backoff_ms = 20;
    config.pool.warmup_connections = 1;
    config.health.enabled = false;
    config.timeouts.connect_secs = 1;
    config.timeouts.probe_secs = 1;
    config.timeouts.operation_secs = 5;
    config
}
