//! Request and response bodies of the REST routes

use serde::{Deserialize, Serialize};

use crate::core::Pagination;

/// Body of `POST /users`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateUserRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
}

/// Body of `POST /cards`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCardRequest {
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub card_number: String,
    #[serde(default)]
    pub card_type: String,
}

/// Query string of `GET /users/{id}/transactions`
///
/// Values are kept raw so that invalid input falls back to the defaults
/// instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageQuery {
    pub limit: Option<String>,
    pub offset: Option<String>,
}

impl PageQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination::from_raw(self.limit.as_deref(), self.offset.as_deref())
    }
}

/// Body of `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub version: String,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            service: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}
