//! Gateway: HTTP surface and process lifecycle.
//!
//! Serves the health endpoint and the Telegram webhook on one port, runs the
//! inbound dispatch loop, and owns graceful shutdown.

mod server;

pub use server::run_gateway;
