//! Axum HTTP handlers for the web server
//!
//! Serves the MCP JSON-RPC endpoint (single messages and batches) plus health
//! and discovery metadata.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::engine::Category;
use crate::mcp::rpc::{json_rpc_error, INVALID_REQUEST};
use crate::mcp::server::handle_json_rpc_value;
use crate::AppState;

const PARSE_ERROR: i32 = -32700;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: String,
    pub version: &'static str,
    pub mcp_endpoint: &'static str,
    pub transport: &'static str,
    pub capabilities: CapabilityCounts,
}

#[derive(Debug, Serialize)]
pub struct CapabilityCounts {
    pub tools: usize,
    pub resources: usize,
    pub prompts: usize,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub async fn discovery(State(state): State<AppState>) -> Json<DiscoveryResponse> {
    let registry = state.dispatcher.registry();
    Json(DiscoveryResponse {
        name: state.server_name.to_string(),
        version: env!("CARGO_PKG_VERSION"),
        mcp_endpoint: "/mcp",
        transport: "http",
        capabilities: CapabilityCounts {
            tools: registry.len(Category::Tool),
            resources: registry.len(Category::Resource),
            prompts: registry.len(Category::Prompt),
        },
    })
}

pub async fn mcp_endpoint(State(state): State<AppState>, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, PARSE_ERROR, "Parse error")),
            )
                .into_response()
        }
    };

    if let Some(batch) = payload.as_array() {
        if batch.is_empty() {
            return (
                StatusCode::OK,
                Json(vec![json_rpc_error(None, INVALID_REQUEST, "Invalid Request")]),
            )
                .into_response();
        }

        let mut responses = Vec::new();
        for item in batch {
            if let Some(response) = handle_json_rpc_value(&state, item.clone()).await {
                responses.push(response);
            }
        }

        if responses.is_empty() {
            return StatusCode::NO_CONTENT.into_response();
        }

        return (StatusCode::OK, Json(Value::Array(responses))).into_response();
    }

    match handle_json_rpc_value(&state, payload).await {
        Some(response) => (StatusCode::OK, Json(response)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}
