//! API endpoint handlers, one module per feature area.
//!
//! Handlers lock the connection, call the domain module and serialize
//! its view models. The guard is always dropped before any `.await`.

pub mod auth;
pub mod cart;
pub mod health;
pub mod news;
pub mod scoreboard;
pub mod search;
pub mod shop;

use serde::Serialize;
use uuid::Uuid;

use crate::api::error::ApiError;

/// Body returned by DELETE handlers.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub status: &'static str,
    pub id: String,
}

impl Deleted {
    pub fn new(id: impl ToString) -> Self {
        Self {
            status: "deleted",
            id: id.to_string(),
        }
    }
}

/// Path segment as UUID; anything else is a 404 for `what`.
pub(crate) fn parse_uuid(raw: &str, what: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::NotFound(format!("{what} not found")))
}
