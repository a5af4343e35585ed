//! Credit balance and creator wallet handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use vgen_models::{CreatorWallet, CreditLedgerEntry};

use crate::error::ApiResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceResponse {
    pub user_id: String,
    /// Sum of completed entries
    pub balance: i64,
    /// Balance minus pending debits
    pub available: i64,
}

#[derive(Debug, Deserialize)]
pub struct PurchaseRequest {
    pub amount: i64,
}

pub async fn get_balance(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> ApiResult<Json<BalanceResponse>> {
    let snapshot = state.service.settlement().balance(&user_id).await?;
    Ok(Json(BalanceResponse {
        user_id,
        balance: snapshot.balance,
        available: snapshot.available(),
    }))
}

/// Record purchased credits. Stands in for the billing checkout.
pub async fn purchase_credits(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(request): Json<PurchaseRequest>,
) -> ApiResult<(StatusCode, Json<CreditLedgerEntry>)> {
    let entry = state
        .service
        .settlement()
        .purchase(&user_id, request.amount)
        .await?;
    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn get_creator_wallet(
    State(state): State<AppState>,
    Path(creator_id): Path<String>,
) -> ApiResult<Json<CreatorWallet>> {
    let wallet = state.service.settlement().wallet(&creator_id).await?;
    Ok(Json(wallet))
}
