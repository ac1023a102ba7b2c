//! JSON-RPC protocol types (MCP tool surface, version 2024-11-05)

mod messages;

pub use messages::*;

/// Protocol version advertised by the stdio transport
pub const PROTOCOL_VERSION: &str = "2024-11-05";
