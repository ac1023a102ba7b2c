//! The HTTP surface: axum router plus the bootstrap sequence that wires
//! config into a running [`Gateway`].

mod router;
mod server;

pub use router::{AppState, create_router};
pub use server::Gateway;
