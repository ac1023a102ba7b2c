//! The stdio transport for the tool surface (`tools/list`/`tools/call`).
//! The HTTP transport lives in `gateway::router` as an axum `Router`
//! rather than under this module — it has no line-framing concerns of
//! its own to abstract.

mod stdio;

pub use stdio::StdioTransport;
