//! Action log API crate - axum HTTP server for reading the log and
//! ingesting host change events.
//!
//! Public endpoints expose published action records to build tooling.
//! Authenticated endpoints accept batches of change events, one request
//! lifetime per batch, and trigger garbage collection.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod rate_limit;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
