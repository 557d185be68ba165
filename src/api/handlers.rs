//! Request handlers. Each one is a thin adapter over the ledger or store.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use super::response::ApiResult;
use super::server::AppState;
use crate::error::LedgerError;
use crate::ledger::{CashReceipt, CashRequest, TradeReceipt, TradeRequest};
use crate::models::{AmountConfig, Instrument, Portfolio, ProfileUpdate, Transaction, TransactionKind, User};

const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// Query parameters for transaction history
#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// Query parameters for amount presets
#[derive(Debug, Deserialize)]
pub struct AmountQuery {
    pub kind: Option<String>,
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn buy(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<TradeReceipt> {
    let Json(order) = payload?;
    Ok(Json(state.ledger.buy(&order).await?))
}

pub async fn sell(
    State(state): State<AppState>,
    payload: Result<Json<TradeRequest>, JsonRejection>,
) -> ApiResult<TradeReceipt> {
    let Json(order) = payload?;
    Ok(Json(state.ledger.sell(&order).await?))
}

pub async fn deposit(
    State(state): State<AppState>,
    payload: Result<Json<CashRequest>, JsonRejection>,
) -> ApiResult<CashReceipt> {
    let Json(request) = payload?;
    Ok(Json(state.ledger.deposit(&request).await?))
}

pub async fn withdraw(
    State(state): State<AppState>,
    payload: Result<Json<CashRequest>, JsonRejection>,
) -> ApiResult<CashReceipt> {
    let Json(request) = payload?;
    Ok(Json(state.ledger.withdraw(&request).await?))
}

pub async fn portfolio(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<Portfolio> {
    Ok(Json(state.ledger.db().get_portfolio(user_id).await?))
}

pub async fn get_user(State(state): State<AppState>, Path(user_id): Path<i64>) -> ApiResult<User> {
    Ok(Json(state.ledger.db().get_user(user_id).await?))
}

pub async fn update_user(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    payload: Result<Json<ProfileUpdate>, JsonRejection>,
) -> ApiResult<User> {
    let Json(update) = payload?;
    let user = state.ledger.db().update_profile(user_id, &update).await?;
    tracing::info!(user_id, "Profile updated");
    Ok(Json(user))
}

pub async fn transactions(
    State(state): State<AppState>,
    Path(user_id): Path<i64>,
    query: Result<Query<HistoryQuery>, QueryRejection>,
) -> ApiResult<Vec<Transaction>> {
    let Query(query) = query?;
    let limit = query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    Ok(Json(state.ledger.db().list_transactions(user_id, limit).await?))
}

pub async fn list_instruments(State(state): State<AppState>) -> ApiResult<Vec<Instrument>> {
    Ok(Json(state.ledger.db().list_instruments().await?))
}

pub async fn get_instrument(
    State(state): State<AppState>,
    Path(instrument_id): Path<i64>,
) -> ApiResult<Instrument> {
    Ok(Json(state.ledger.db().get_instrument(instrument_id).await?))
}

pub async fn list_amounts(
    State(state): State<AppState>,
    query: Result<Query<AmountQuery>, QueryRejection>,
) -> ApiResult<Vec<AmountConfig>> {
    let Query(query) = query?;
    let kind = query
        .kind
        .as_deref()
        .map(str::parse::<TransactionKind>)
        .transpose()
        .map_err(LedgerError::InvalidArgument)?;
    Ok(Json(state.ledger.db().list_amount_configs(kind).await?))
}
