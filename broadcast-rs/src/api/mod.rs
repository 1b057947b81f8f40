//! Inbound HTTP surface
//!
//! Thin axum layer over the engine: authorize, submit, status, cancel, and
//! history. Caller identity arrives in the `X-Owner-Id` header; full
//! authentication lives outside the engine.

pub mod handlers;
pub mod server;

pub use handlers::AppState;
pub use server::ApiServer;
