//! Unity MCP tool session for UnityPilot.
//!
//! The agent's tools are not implemented here: they live in the Unity MCP
//! server, an external process that exposes Unity Editor operations over the
//! Model Context Protocol. This crate launches that server, speaks MCP to it
//! and adapts its tool listing and call results to the core tool types.

pub mod catalog;
pub mod session;

pub use catalog::{descriptor_from_mcp, output_from_mcp};
pub use session::{McpServerCommand, McpToolSession, StdioConnector};
