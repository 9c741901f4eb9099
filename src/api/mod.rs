//! HTTP API of the card ledger
//!
//! # Routes
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | GET | /health | Health check |
//! | POST | /users | Register an account |
//! | GET | /users/{id} | Get an account |
//! | GET | /users/{id}/transactions | Paginated transactions, newest first |
//! | GET | /users/{id}/summary | Summary of completed transactions |
//! | POST | /cards | Register a card |
//! | GET | /cards/{card_number} | Get the active card |
//! | POST | /cards/{card_number}/deactivate | Deactivate the active card |
//! | POST | /transactions | Process a card payment synchronously |
//! | POST | /transactions/async | Publish a card payment to the stream |
//! | GET | /transactions/{id} | Get a transaction |
//! | POST | /graphql | Typed GraphQL-style operations |

pub mod dto;
pub mod error;
pub mod graphql;
pub mod handlers;
pub mod state;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

pub use error::{ApiError, ApiErrorResponse};
pub use state::AppState;

/// Create the router with every route and request tracing
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Accounts
        .route("/users", post(handlers::create_user))
        .route("/users/{id}", get(handlers::get_user))
        .route("/users/{id}/transactions", get(handlers::user_transactions))
        .route("/users/{id}/summary", get(handlers::user_summary))
        // Cards
        .route("/cards", post(handlers::create_card))
        .route("/cards/{card_number}", get(handlers::get_card))
        .route(
            "/cards/{card_number}/deactivate",
            post(handlers::deactivate_card),
        )
        // Transactions
        .route("/transactions", post(handlers::process_transaction))
        .route("/transactions/async", post(handlers::publish_transaction))
        .route("/transactions/{id}", get(handlers::get_transaction))
        .route("/graphql", post(graphql::graphql))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}
