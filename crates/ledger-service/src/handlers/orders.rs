//! 订单提交与查询

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::dto::{ApiResponse, OrderDto};
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::service::SubmitOutcome;
use crate::state::AppState;

/// POST /api/user/orders
///
/// 请求体为纯文本订单号。新订单返回 202，本人重复提交返回 200。
pub async fn submit_order(
    State(state): State<AppState>,
    user: AuthUser,
    body: String,
) -> Result<Response> {
    let number = body.trim().to_string();
    let outcome = state.ledger.submit_order(user.user_id, &number).await?;

    let response = match outcome {
        SubmitOutcome::Accepted => (
            StatusCode::ACCEPTED,
            Json(ApiResponse::success_with_message(number, "订单已受理")),
        ),
        SubmitOutcome::AlreadySubmitted => (
            StatusCode::OK,
            Json(ApiResponse::success_with_message(number, "订单此前已提交")),
        ),
    };
    Ok(response.into_response())
}

/// GET /api/user/orders
///
/// 按提交时间升序返回，无订单时返回 204
pub async fn list_orders(State(state): State<AppState>, user: AuthUser) -> Result<Response> {
    let orders = state.ledger.list_orders(user.user_id).await?;
    if orders.is_empty() {
        return Ok(StatusCode::NO_CONTENT.into_response());
    }

    let body: Vec<OrderDto> = orders.iter().map(OrderDto::from).collect();
    Ok(Json(body).into_response())
}
