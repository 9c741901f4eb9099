//! GraphQL-style operation endpoint
//!
//! `POST /graphql` accepts an envelope naming one operation and its
//! variables:
//!
//! ```json
//! {"operation": "processTransaction",
//!  "variables": {"card_number": "4111-1111-1111-1111", "amount": 2500,
//!                "merchant_name": "Coffee Shop", "mcc": "5812"}}
//! ```
//!
//! The variables deserialize into one typed argument struct per operation,
//! so malformed arguments are rejected at the boundary (`400`). Ledger
//! errors are reported GraphQL-style: `200` with an `errors` array.
//!
//! | Operation            | Arguments                                   |
//! |----------------------|---------------------------------------------|
//! | `user`               | `id`                                        |
//! | `card`               | `card_number`                               |
//! | `transactions`       | `user_id`, `limit` = 10, `offset` = 0       |
//! | `userSummary`        | `user_id`                                   |
//! | `createUser`         | `name`, `email`                             |
//! | `createCard`         | `user_id`, `card_number`, `card_type`       |
//! | `processTransaction` | `card_number`, `amount`, `merchant_name`, optional `merchant_city`, `merchant_country`, `mcc` |

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ApiErrorResponse;
use super::handlers::run_pipeline;
use super::state::AppState;
use crate::core::builder::{category_for_mcc, DEFAULT_CATEGORY};
use crate::core::Pagination;
use crate::types::{CardPayload, LedgerError};

/// Operation envelope with typed variables
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "operation", content = "variables", rename_all = "camelCase")]
pub enum Operation {
    User(UserArgs),
    Card(CardArgs),
    Transactions(TransactionsArgs),
    UserSummary(UserSummaryArgs),
    CreateUser(CreateUserArgs),
    CreateCard(CreateCardArgs),
    ProcessTransaction(ProcessTransactionArgs),
}

impl Operation {
    /// Field name the result is reported under in `data`
    pub fn name(&self) -> &'static str {
        match self {
            Operation::User(_) => "user",
            Operation::Card(_) => "card",
            Operation::Transactions(_) => "transactions",
            Operation::UserSummary(_) => "userSummary",
            Operation::CreateUser(_) => "createUser",
            Operation::CreateCard(_) => "createCard",
            Operation::ProcessTransaction(_) => "processTransaction",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserArgs {
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CardArgs {
    pub card_number: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TransactionsArgs {
    pub user_id: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserSummaryArgs {
    pub user_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateUserArgs {
    pub name: String,
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CreateCardArgs {
    pub user_id: String,
    pub card_number: String,
    pub card_type: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProcessTransactionArgs {
    pub card_number: String,
    pub amount: i64,
    pub merchant_name: String,
    pub merchant_city: Option<String>,
    pub merchant_country: Option<String>,

    /// Merchant-category code, mapped to a spending category
    pub mcc: Option<String>,
}

impl ProcessTransactionArgs {
    /// Payload timestamped `now`, category mapped from the MCC
    pub fn into_payload(self) -> CardPayload {
        let category = self
            .mcc
            .as_deref()
            .map_or(DEFAULT_CATEGORY, category_for_mcc)
            .to_string();

        CardPayload {
            card_number: self.card_number,
            amount: self.amount,
            merchant_name: self.merchant_name,
            merchant_city: self.merchant_city,
            merchant_country: self.merchant_country,
            category,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// One entry of the `errors` array
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLError {
    pub message: String,
    pub extensions: ErrorExtensions,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorExtensions {
    pub code: String,
}

/// Response body: `data` on success, `errors` on failure
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphQLResponse {
    pub data: Option<Value>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<GraphQLError>,
}

impl GraphQLResponse {
    fn data(operation: &str, value: Value) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(operation.to_string(), value);
        Self {
            data: Some(Value::Object(data)),
            errors: Vec::new(),
        }
    }

    fn error(e: &LedgerError) -> Self {
        Self {
            data: None,
            errors: vec![GraphQLError {
                message: e.to_string(),
                extensions: ErrorExtensions {
                    code: e.code().to_string(),
                },
            }],
        }
    }
}

/// POST /graphql
pub async fn graphql(
    State(state): State<AppState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Json<GraphQLResponse>, ApiErrorResponse> {
    let Json(envelope) = body?;
    let operation: Operation = serde_json::from_value(envelope)
        .map_err(|e| ApiErrorResponse::bad_request(format!("invalid operation: {}", e)))?;

    let name = operation.name();
    let response = match execute(&state, operation).await {
        Ok(value) => GraphQLResponse::data(name, value),
        Err(e) => GraphQLResponse::error(&e),
    };
    Ok(Json(response))
}

/// Execute one operation against the ledger
pub async fn execute(state: &AppState, operation: Operation) -> Result<Value, LedgerError> {
    let value = match operation {
        Operation::User(args) => serde_json::to_value(state.registry.get_account(&args.id)?)?,
        Operation::Card(args) => {
            serde_json::to_value(state.registry.get_active_card(&args.card_number)?)?
        }
        Operation::Transactions(args) => {
            let page = Pagination::from_values(args.limit, args.offset);
            let page = state.queries.user_transactions(&args.user_id, page)?;
            serde_json::to_value(page.transactions)?
        }
        Operation::UserSummary(args) => {
            serde_json::to_value(state.queries.user_summary(&args.user_id)?)?
        }
        Operation::CreateUser(args) => {
            serde_json::to_value(state.registry.register_account(&args.name, &args.email)?)?
        }
        Operation::CreateCard(args) => serde_json::to_value(state.registry.register_card(
            &args.user_id,
            &args.card_number,
            &args.card_type,
        )?)?,
        Operation::ProcessTransaction(args) => {
            let transaction =
                run_pipeline(Arc::clone(&state.pipeline), args.into_payload()).await?;
            serde_json::to_value(transaction)?
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_deserializes_typed_args() {
        let operation: Operation = serde_json::from_value(json!({
            "operation": "transactions",
            "variables": {"user_id": "acc-1", "limit": 5}
        }))
        .unwrap();

        assert_eq!(
            operation,
            Operation::Transactions(TransactionsArgs {
                user_id: "acc-1".to_string(),
                limit: Some(5),
                offset: None,
            })
        );
        assert_eq!(operation.name(), "transactions");
    }

    #[test]
    fn test_wrong_argument_type_is_rejected() {
        let result = serde_json::from_value::<Operation>(json!({
            "operation": "processTransaction",
            "variables": {"card_number": "4111", "amount": "lots", "merchant_name": "Shop"}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_operation_is_rejected() {
        let result = serde_json::from_value::<Operation>(json!({
            "operation": "dropTables",
            "variables": {}
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_process_args_map_mcc() {
        let args = ProcessTransactionArgs {
            card_number: "4111".to_string(),
            amount: 2500,
            merchant_name: "Fuel Stop".to_string(),
            merchant_city: Some("Austin".to_string()),
            merchant_country: None,
            mcc: Some("5541".to_string()),
        };

        let payload = args.into_payload();
        assert_eq!(payload.category, "gas");
        assert_eq!(payload.merchant_city.as_deref(), Some("Austin"));
        assert!(chrono::DateTime::parse_from_rfc3339(&payload.timestamp).is_ok());
    }

    #[test]
    fn test_process_args_default_category() {
        let args = ProcessTransactionArgs {
            card_number: "4111".to_string(),
            amount: 2500,
            merchant_name: "Shop".to_string(),
            merchant_city: None,
            merchant_country: None,
            mcc: None,
        };
        assert_eq!(args.into_payload().category, "general");
    }
}
