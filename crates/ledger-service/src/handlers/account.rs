//! 注册与登录
//!
//! 成功后 Token 同时通过 `Authorization` 响应头与 `jwt` Cookie 下发

use axum::{
    Json,
    extract::State,
    http::header,
    response::IntoResponse,
};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::Cookie;
use validator::Validate;

use super::{JsonBody, parse_json};
use crate::dto::{ApiResponse, CredentialsRequest, TokenResponse};
use crate::error::Result;
use crate::middleware::JWT_COOKIE;
use crate::service::IssuedToken;
use crate::state::AppState;

/// POST /api/user/register
pub async fn register(
    State(state): State<AppState>,
    payload: JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse> {
    let req = parse_json(payload)?;
    req.validate()?;

    let issued = state.accounts.register(&req.login, &req.password).await?;
    Ok(token_response(issued, "注册成功"))
}

/// POST /api/user/login
pub async fn login(
    State(state): State<AppState>,
    payload: JsonBody<CredentialsRequest>,
) -> Result<impl IntoResponse> {
    let req = parse_json(payload)?;
    req.validate()?;

    let issued = state.accounts.login(&req.login, &req.password).await?;
    Ok(token_response(issued, "登录成功"))
}

fn token_response(issued: IssuedToken, message: &'static str) -> impl IntoResponse {
    let cookie = Cookie::build((JWT_COOKIE, issued.token.clone()))
        .path("/")
        .http_only(true)
        .build();

    (
        CookieJar::new().add(cookie),
        [(header::AUTHORIZATION, format!("Bearer {}", issued.token))],
        Json(ApiResponse::success_with_message(
            TokenResponse {
                token: issued.token,
                expires_at: issued.expires_at,
            },
            message,
        )),
    )
}
