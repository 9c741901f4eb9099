//! REST handlers
//!
//! - `GET /health`
//! - `POST /users`, `GET /users/{id}`
//! - `GET /users/{id}/transactions`, `GET /users/{id}/summary`
//! - `POST /cards`, `GET /cards/{card_number}`, `POST /cards/{card_number}/deactivate`
//! - `POST /transactions`, `POST /transactions/async`, `GET /transactions/{id}`

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use super::dto::{CreateCardRequest, CreateUserRequest, HealthResponse, PageQuery};
use super::error::ApiErrorResponse;
use super::state::AppState;
use crate::core::{LedgerPipeline, TransactionPage};
use crate::stream::RecordPosition;
use crate::types::{Account, Card, CardPayload, LedgerError, Transaction, TransactionSummary};

type ApiResult<T> = Result<T, ApiErrorResponse>;

pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// POST /users
///
/// - `201 Created` with the account
/// - `400 Bad Request` when name or email is missing
/// - `409 Conflict` when the email is already registered
pub async fn create_user(
    State(state): State<AppState>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Account>)> {
    let Json(request) = body?;
    let account = state
        .registry
        .register_account(&request.name, &request.email)?;
    Ok((StatusCode::CREATED, Json(account)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Account>> {
    Ok(Json(state.registry.get_account(&id)?))
}

/// POST /cards
///
/// - `201 Created` with the card
/// - `404 Not Found` when the user does not exist
/// - `409 Conflict` when an active card already carries the number
pub async fn create_card(
    State(state): State<AppState>,
    body: Result<Json<CreateCardRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Card>)> {
    let Json(request) = body?;
    let card = state.registry.register_card(
        &request.user_id,
        &request.card_number,
        &request.card_type,
    )?;
    Ok((StatusCode::CREATED, Json(card)))
}

pub async fn get_card(
    State(state): State<AppState>,
    Path(card_number): Path<String>,
) -> ApiResult<Json<Card>> {
    Ok(Json(state.registry.get_active_card(&card_number)?))
}

pub async fn deactivate_card(
    State(state): State<AppState>,
    Path(card_number): Path<String>,
) -> ApiResult<Json<Card>> {
    Ok(Json(state.registry.deactivate_card(&card_number)?))
}

/// POST /transactions
///
/// Runs the payload through the pipeline and answers with the settled
/// transaction. A payment that fails settlement is still `201 Created`, with
/// `status: "failed"`.
pub async fn process_transaction(
    State(state): State<AppState>,
    body: Result<Json<CardPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Transaction>)> {
    let Json(payload) = body?;
    let transaction = run_pipeline(Arc::clone(&state.pipeline), payload).await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

/// POST /transactions/async
///
/// Publishes the payload to the payment topic; `202 Accepted` with the
/// record position.
pub async fn publish_transaction(
    State(state): State<AppState>,
    body: Result<Json<CardPayload>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<RecordPosition>)> {
    let Json(payload) = body?;
    let position = state.producer.publish(&payload)?;
    Ok((StatusCode::ACCEPTED, Json(position)))
}

pub async fn get_transaction(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Transaction>> {
    Ok(Json(state.queries.get_transaction(&id)?))
}

/// GET /users/{id}/transactions?limit=&offset=
pub async fn user_transactions(
    State(state): State<AppState>,
    Path(id): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> ApiResult<Json<TransactionPage>> {
    // An unparseable query string falls back to the default page
    let page = query.map(|Query(query)| query).unwrap_or_default();
    Ok(Json(state.queries.user_transactions(&id, page.pagination())?))
}

/// GET /users/{id}/summary
pub async fn user_summary(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<TransactionSummary>> {
    Ok(Json(state.queries.user_summary(&id)?))
}

/// Run the pipeline on its own task
///
/// A client disconnect drops the handler future; the spawned task still
/// finishes settlement and the final status write.
pub(crate) async fn run_pipeline(
    pipeline: Arc<LedgerPipeline>,
    payload: CardPayload,
) -> Result<Transaction, LedgerError> {
    tokio::spawn(async move { pipeline.process(payload).await })
        .await
        .map_err(|e| LedgerError::storage(format!("pipeline task aborted: {}", e)))?
}
