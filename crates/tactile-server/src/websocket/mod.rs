//! WebSocket transport: accept loop, per-client tasks and the connection
//! registry.

pub mod connection;
pub mod server;

pub use connection::{ClientConnection, ConnectionRegistry};
pub use server::WebSocketServer;
