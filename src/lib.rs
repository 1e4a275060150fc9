use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use serde_json::Value;
use tokio::sync::mpsc::UnboundedSender;

pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod stdio;

use engine::{Dispatcher, Registry};
use mcp::inflight::InFlightRequests;

#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Arc<Dispatcher>,
    /// Requests that `notifications/cancelled` can reach. Only session-bound
    /// transports carry one; stateless HTTP has none.
    pub in_flight: Option<InFlightRequests>,
    pub server_name: Arc<str>,
    /// Set by transports that can push notifications to the client.
    pub outbound: Option<UnboundedSender<Value>>,
}

impl AppState {
    pub fn new(registry: Registry, server_name: impl Into<String>, max_concurrency: usize) -> Self {
        let dispatcher = Dispatcher::new(Arc::new(registry)).with_max_concurrency(max_concurrency);
        Self {
            dispatcher: Arc::new(dispatcher),
            in_flight: None,
            server_name: Arc::<str>::from(server_name.into()),
            outbound: None,
        }
    }

    pub fn with_outbound(mut self, outbound: UnboundedSender<Value>) -> Self {
        self.outbound = Some(outbound);
        self
    }

    pub fn with_in_flight(mut self, in_flight: InFlightRequests) -> Self {
        self.in_flight = Some(in_flight);
        self
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route("/mcp", post(http::handlers::mcp_endpoint))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}
