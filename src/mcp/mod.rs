//! Model Context Protocol (MCP) server handling and JSON-RPC implementations
//!
//! Protocol-level concerns: JSON-RPC validation and formatting, negotiation,
//! routing to the capability engine, progress notifications and cancellation.

pub mod capabilities;
pub mod inflight;
pub mod notify;
pub mod rpc;
pub mod server;
