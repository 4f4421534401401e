//! API Routes
//!
//! HTTP endpoint definitions. Handlers only translate between JSON and
//! engine commands; all rules live in the engine.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{Account, AccountType, OperationContext, Transaction};
use crate::engine::{
    CreateAccountCommand, LedgerEngine, MovementCommand, ReconciliationReport, TransferCommand,
    TransferResult,
};
use crate::error::{AppError, AppResult};
use crate::notify::EventNotifier;
use crate::store::LedgerRepository;

/// Shared engine handle used as router state
pub type SharedEngine<S, N> = Arc<LedgerEngine<S, N>>;

// =========================================================================
// Request/Response types
// =========================================================================

#[derive(Debug, Deserialize)]
pub struct CreateAccountRequest {
    pub owner_name: String,
    #[serde(default)]
    pub account_type: AccountType,
    /// Decimal string; omitted means zero
    #[serde(default)]
    pub initial_deposit: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub id: Uuid,
    pub account_number: String,
    pub owner_name: String,
    pub balance: Decimal,
    pub account_type: AccountType,
    pub created_at: DateTime<Utc>,
}

impl From<Account> for AccountResponse {
    fn from(account: Account) -> Self {
        Self {
            id: account.id,
            account_number: account.account_number,
            owner_name: account.owner_name,
            balance: account.balance,
            account_type: account.account_type,
            created_at: account.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MovementRequest {
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransferRequest {
    pub from_account_number: String,
    pub to_account_number: String,
    pub amount: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TransactionListResponse {
    pub account_number: String,
    pub transactions: Vec<Transaction>,
}

#[derive(Debug, Serialize)]
pub struct ReconciliationResponse {
    #[serde(flatten)]
    pub report: ReconciliationReport,
    pub consistent: bool,
}

fn parse_decimal(field: &str, raw: &str) -> AppResult<Decimal> {
    Decimal::from_str(raw.trim())
        .map_err(|_| AppError::InvalidRequest(format!("Invalid {field}: {raw}")))
}

// =========================================================================
// API Router
// =========================================================================

/// Create the API router
pub fn create_router<S, N>() -> Router<SharedEngine<S, N>>
where
    S: LedgerRepository + 'static,
    N: EventNotifier + 'static,
{
    Router::new()
        .route("/accounts", post(create_account::<S, N>))
        // literal segment wins over the :account_number capture
        .route("/accounts/transfer", post(transfer::<S, N>))
        .route("/accounts/:account_number", get(get_account::<S, N>))
        .route(
            "/accounts/:account_number/transactions",
            get(list_transactions::<S, N>),
        )
        .route("/accounts/:account_number/deposit", post(deposit::<S, N>))
        .route("/accounts/:account_number/withdraw", post(withdraw::<S, N>))
        .route(
            "/accounts/:account_number/reconciliation",
            get(reconcile::<S, N>),
        )
}

// =========================================================================
// POST /accounts
// =========================================================================

/// Open an account
async fn create_account<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<CreateAccountRequest>, JsonRejection>,
) -> AppResult<(StatusCode, Json<AccountResponse>)> {
    let Json(request) = payload?;

    let initial_deposit = match request.initial_deposit.as_deref() {
        Some(raw) => parse_decimal("initial_deposit", raw)?,
        None => Decimal::ZERO,
    };
    let command = CreateAccountCommand::new(request.owner_name, request.account_type)
        .with_initial_deposit(initial_deposit);

    let account = engine.create_account(command, &context).await?;

    Ok((StatusCode::CREATED, Json(account.into())))
}

// =========================================================================
// GET /accounts/:account_number
// =========================================================================

async fn get_account<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Path(account_number): Path<String>,
) -> AppResult<Json<AccountResponse>> {
    let account = engine.get_account(&account_number).await?;
    Ok(Json(account.into()))
}

// =========================================================================
// GET /accounts/:account_number/transactions
// =========================================================================

async fn list_transactions<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Path(account_number): Path<String>,
) -> AppResult<Json<TransactionListResponse>> {
    let transactions = engine.list_transactions(&account_number).await?;
    Ok(Json(TransactionListResponse {
        account_number,
        transactions,
    }))
}

// =========================================================================
// POST /accounts/:account_number/deposit, /withdraw
// =========================================================================

fn movement_command(request: MovementRequest) -> AppResult<MovementCommand> {
    let command = MovementCommand::new(parse_decimal("amount", &request.amount)?);
    Ok(match request.description {
        Some(description) => command.with_description(description),
        None => command,
    })
}

async fn deposit<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Extension(context): Extension<OperationContext>,
    Path(account_number): Path<String>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> AppResult<Json<Transaction>> {
    let Json(request) = payload?;
    let entry = engine
        .deposit(&account_number, movement_command(request)?, &context)
        .await?;
    Ok(Json(entry))
}

async fn withdraw<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Extension(context): Extension<OperationContext>,
    Path(account_number): Path<String>,
    payload: Result<Json<MovementRequest>, JsonRejection>,
) -> AppResult<Json<Transaction>> {
    let Json(request) = payload?;
    let entry = engine
        .withdraw(&account_number, movement_command(request)?, &context)
        .await?;
    Ok(Json(entry))
}

// =========================================================================
// POST /accounts/transfer
// =========================================================================

async fn transfer<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Extension(context): Extension<OperationContext>,
    payload: Result<Json<TransferRequest>, JsonRejection>,
) -> AppResult<Json<TransferResult>> {
    let Json(request) = payload?;

    let command = TransferCommand::new(
        request.from_account_number,
        request.to_account_number,
        parse_decimal("amount", &request.amount)?,
    );
    let command = match request.description {
        Some(description) => command.with_description(description),
        None => command,
    };

    let result = engine.transfer(command, &context).await?;
    Ok(Json(result))
}

// =========================================================================
// GET /accounts/:account_number/reconciliation
// =========================================================================

async fn reconcile<S: LedgerRepository, N: EventNotifier>(
    State(engine): State<SharedEngine<S, N>>,
    Path(account_number): Path<String>,
) -> AppResult<Json<ReconciliationResponse>> {
    let report = engine.reconcile(&account_number).await?;
    Ok(Json(ReconciliationResponse {
        consistent: report.is_consistent(),
        report,
    }))
}
