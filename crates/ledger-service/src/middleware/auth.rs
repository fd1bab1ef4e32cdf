//! JWT 认证中间件
//!
//! 接受 `Authorization: Bearer` 请求头或名为 `jwt` 的 Cookie，
//! 验证通过后将当前用户注入请求扩展

use axum::{
    body::Body,
    extract::{FromRequestParts, State},
    http::{Request, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::extract::CookieJar;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};

use crate::error::LedgerError;
use crate::state::AppState;

/// 登录后下发 Token 的 Cookie 名
pub const JWT_COOKIE: &str = "jwt";

/// 已认证的当前用户
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: i64,
    pub login: String,
}

/// 认证中间件，挂在需要登录的路由上
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let Some(token) = extract_token(&request) else {
        return LedgerError::Unauthorized("缺少认证 Token".to_string()).into_response();
    };

    let user = state
        .jwt
        .verify_token(&token)
        .and_then(|claims| {
            Ok(AuthUser {
                user_id: claims.user_id()?,
                login: claims.login,
            })
        });

    match user {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// 请求头优先，其次 Cookie
fn extract_token(request: &Request<Body>) -> Option<String> {
    if let Some(Authorization(bearer)) = request.headers().typed_get::<Authorization<Bearer>>() {
        return Some(bearer.token().to_string());
    }

    CookieJar::from_headers(request.headers())
        .get(JWT_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .filter(|token| !token.is_empty())
}

impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = LedgerError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or_else(|| LedgerError::Unauthorized("未登录".to_string()))
    }
}
