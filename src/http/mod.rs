//! HTTP transport for the Model Context Protocol
//!
//! Routes `/mcp` plus the health and discovery endpoints.

pub mod handlers;
