//! MCP (Model Context Protocol) server.
//!
//! JSON-RPC 2.0 handling shared by two transports: newline-delimited
//! stdio and HTTP with server-sent events.

pub mod protocol;
pub mod sse;
pub mod stdio;

pub use protocol::McpHandler;
