//! Delivery layer for the Tandem conversation engine.
//!
//! Hosts the WebSocket and HTTP endpoints, fans turn events out to a user's
//! live connections, and keeps connections healthy with a periodic
//! heartbeat. Transport errors surface only for malformed input; a failed
//! turn still arrives as a normal-shaped event.
//!
//! # Main types
//!
//! - [`ConnectionManager`] — User-keyed registry of live connections.
//! - [`GatewayServer`] — Builds the axum router.
//! - [`envelope`] — Converts delivery events to wire shapes.

pub mod connection;
pub mod envelope;
pub mod server;

pub use connection::{Connection, ConnectionManager};
pub use server::GatewayServer;
