//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use axum::{body::Body, extract::Request, routing::any, Router};
use container_router::config::{InstanceConfig, RouterConfig};
use container_router::workload::{app, WorkloadState};
use container_router::{HttpServer, Shutdown};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });
    addr
}

/// Start the placeholder workload on an ephemeral port.
pub async fn start_workload() -> SocketAddr {
    serve(app(WorkloadState::default())).await
}

/// Start a backend that answers `"<tag> <METHOD> <path?query>"`.
pub async fn start_echo_backend(tag: &'static str) -> SocketAddr {
    serve(Router::new().fallback(any(move |request: Request<Body>| async move {
        let target = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_default();
        format!("{} {} {}", tag, request.method(), target)
    })))
    .await
}

/// Start a backend that waits `delay` before answering.
pub async fn start_slow_backend(delay: Duration) -> SocketAddr {
    serve(Router::new().fallback(any(move || async move {
        tokio::time::sleep(delay).await;
        "slow"
    })))
    .await
}

/// An address nothing is listening on.
pub async fn closed_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

pub fn instance(name: &str, addr: SocketAddr) -> InstanceConfig {
    InstanceConfig {
        name: name.into(),
        address: addr.to_string(),
        max_connections: 10,
    }
}

/// A running router.
pub struct RunningRouter {
    pub addr: SocketAddr,
    pub config_updates: mpsc::UnboundedSender<RouterConfig>,
    shutdown: Shutdown,
}

impl RunningRouter {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for RunningRouter {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start the router with `config` on an ephemeral port.
pub async fn start_router(config: RouterConfig) -> RunningRouter {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let (config_updates, updates_rx) = mpsc::unbounded_channel();
    let server = HttpServer::new(config);
    let server_shutdown = shutdown.subscribe();

    tokio::spawn(async move {
        let _ = server.run(listener, updates_rx, server_shutdown).await;
    });

    RunningRouter {
        addr,
        config_updates,
        shutdown,
    }
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
