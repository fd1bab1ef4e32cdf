//! HTTP 请求处理器模块

pub mod account;
pub mod balance;
pub mod health;
pub mod orders;

use axum::Json;
use axum::extract::rejection::JsonRejection;

use crate::error::LedgerError;

/// 保留解析失败信息的 JSON 请求体
pub(crate) type JsonBody<T> = std::result::Result<Json<T>, JsonRejection>;

/// JSON 请求体解析失败统一按 400 处理
pub(crate) fn parse_json<T>(payload: JsonBody<T>) -> Result<T, LedgerError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| LedgerError::Validation(rejection.body_text()))
}
