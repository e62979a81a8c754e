//! JSON API over HTTP.
//!
//! Routes are nested under `/api/` and wrapped by CORS, session
//! resolution and access logging. The router is composable:
//! `api_router()` returns a `Router` that any axum server can mount.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;

pub use error::ApiError;
pub use router::api_router;
pub use server::{serve, start_api_server, ApiServer, ServerError};
pub use types::ApiContext;
