//! 余额、提现与提现记录

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use super::{JsonBody, parse_json};
use crate::dto::{ApiResponse, BalanceDto, WithdrawRequest, WithdrawalDto};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::state::AppState;

/// GET /api/user/balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<BalanceDto>> {
    let balance = state.ledger.balance(user.user_id).await?;
    Ok(Json(balance.into()))
}

/// POST /api/user/balance/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthUser,
    payload: JsonBody<WithdrawRequest>,
) -> Result<Json<ApiResponse<WithdrawalDto>>> {
    let req = parse_json(payload)?;
    let entry = state
        .ledger
        .withdraw(user.user_id, &req.order, req.sum)
        .await?;

    Ok(Json(ApiResponse::success(WithdrawalDto::from(&entry))))
}

/// GET /api/user/withdrawals
///
/// 无提现记录时返回 204
pub async fn list_withdrawals(State(state): State<AppState>, user: AuthUser) -> Result<Response> {
    let withdrawals = state.ledger.list_withdrawals(user.user_id).await?;
    if withdrawals.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<WithdrawalDto> = withdrawals.iter().map(WithdrawalDto::from).collect();
    Ok(Json(body).into_response())
}
