//! HTTP gateway for UnityPilot.
//!
//! Serves the prompt form, a JSON query endpoint and health checks, and
//! hands every query to a [`QueryRunner`].
//!
//! Built on Axum.

pub mod api_v1;
pub mod cookie;
pub mod frontend;

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde::Serialize;
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{info, warn};
use unitypilot_agent::{QueryRunner, QueryService};
use unitypilot_config::AppConfig;

use crate::cookie::CookieSigner;

/// Shared application state for the gateway.
pub struct GatewayState {
    pub runner: Arc<dyn QueryRunner>,
    pub cookies: CookieSigner,
}

impl GatewayState {
    pub fn new(runner: Arc<dyn QueryRunner>, cookies: CookieSigner) -> Self {
        Self { runner, cookies }
    }
}

/// Build the Axum router with all gateway routes.
///
/// Layers applied:
/// - Request body size limit
/// - HTTP trace logging
pub fn build_router(state: Arc<GatewayState>, max_body_bytes: usize) -> Router {
    Router::new()
        .route("/", get(frontend::index_handler).post(frontend::submit_handler))
        .route("/v1/query", post(api_v1::query_handler))
        .route("/health", get(health_handler))
        .route("/health/test-host", get(test_host_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
pub async fn start(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let secret_key = config.secret_key()?;
    let service = QueryService::from_config(&config)?;
    let state = Arc::new(GatewayState::new(
        Arc::new(service),
        CookieSigner::new(&secret_key, config.secure_cookies()),
    ));

    let addr = format!("{}:{}", config.host(), config.port());
    let app = build_router(state, config.gateway.max_body_bytes);

    info!(
        addr = %addr,
        environment = %config.environment,
        vendor = config.model.vendor.as_str(),
        "Gateway starting"
    );
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Host identity ---

/// This machine's host name.
fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| std::fs::read_to_string("/proc/sys/kernel/hostname").ok())
        .or_else(|| std::fs::read_to_string("/etc/hostname").ok())
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Resolve `host` to an address, preferring IPv4.
async fn host_ip(host: &str) -> String {
    match tokio::net::lookup_host((host, 0)).await {
        Ok(addrs) => {
            let addrs: Vec<IpAddr> = addrs.map(|a| a.ip()).collect();
            addrs
                .iter()
                .find(|ip| ip.is_ipv4())
                .or_else(|| addrs.first())
                .map(ToString::to_string)
                .unwrap_or_else(|| "127.0.0.1".to_string())
        }
        Err(e) => {
            warn!(host = %host, error = %e, "Could not resolve host name");
            "127.0.0.1".to_string()
        }
    }
}

// --- Handlers ---

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    host: String,
    ip: String,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct HostResponse {
    host: String,
    ip: String,
}

async fn health_handler() -> Json<HealthResponse> {
    let host = host_name();
    let ip = host_ip(&host).await;
    Json(HealthResponse {
        status: "Up",
        host,
        ip,
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn test_host_handler() -> Json<HostResponse> {
    let host = host_name();
    let ip = host_ip(&host).await;
    Json(HostResponse { host, ip })
}
