//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use control_plane::config::{ControlPlaneConfig, ServiceConfig};
use control_plane::ServiceName;
use tokio::net::TcpListener;

/// A fake dependency: a TCP listener that accepts and drops connections.
pub struct FakeDependency {
    pub addr: SocketAddr,
    task: tokio::task::JoinHandle<()>,
}

impl FakeDependency {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                drop(socket);
            }
        });
        Self { addr, task }
    }

    /// Stop accepting; later connects are refused.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
    }
}

/// An address nothing listens on.
pub async fn closed_address() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

pub fn service(name: ServiceName, addr: SocketAddr, order: i32) -> ServiceConfig {
    ServiceConfig {
        name,
        address: addr.to_string(),
        startup_order: order,
        requires: Vec::new(),
        required: true,
        connect_timeout_secs: 1,
    }
}

/// Config with short timeouts and a loop interval long enough that only
/// explicit cycles run during a test.
pub fn fast_config(services: Vec<ServiceConfig>) -> ControlPlaneConfig {
    let mut config = ControlPlaneConfig::default();
    config.health.interval_secs = 60;
    config.health.timeout_secs = 1;
    config.health.stop_grace_secs = 2;
    config.health.optimistic_boot = false;
    config.services = services;
    config
}

/// A switchable health signal for closure-based checks.
#[derive(Clone, Default)]
pub struct Toggle(Arc<AtomicBool>);

impl Toggle {
    pub fn new(initial: bool) -> Self {
        Self(Arc::new(AtomicBool::new(initial)))
    }

    pub fn set(&self, value: bool) {
        self.0.store(value, Ordering::SeqCst);
    }

    pub fn get(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
