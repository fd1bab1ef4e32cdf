//! 积分账本服务错误类型定义
//!
//! 包含校验、冲突、认证以及系统错误，并负责映射为 HTTP 响应

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::validation::ValidationError;

/// 积分账本服务错误类型
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    // 认证错误
    #[error("未授权: {0}")]
    Unauthorized(String),
    #[error("用户名或密码错误")]
    InvalidCredentials,
    #[error("用户不存在: {0}")]
    UserNotFound(i64),

    // 校验错误
    #[error("请求格式错误: {0}")]
    Validation(String),
    #[error("订单号格式错误: {0}")]
    MalformedOrderNumber(String),
    #[error("订单号校验失败: {0}")]
    InvalidOrderNumber(String),
    #[error("无效的金额: {0}")]
    InvalidAmount(String),

    // 冲突错误
    #[error("登录名已被占用: {0}")]
    LoginTaken(String),
    #[error("订单 {0} 已被其他用户提交")]
    OrderOwnedByAnotherUser(i64),
    #[error("订单号 {0} 已被使用")]
    OrderNumberUsed(i64),

    // 业务错误
    #[error("余额不足: 需要 {requested}，可用 {available}")]
    InsufficientFunds { requested: i64, available: i64 },

    // 系统错误
    #[error("数据库操作超时: {0}")]
    Timeout(&'static str),
    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),
    #[error("内部错误: {0}")]
    Internal(String),
}

impl LedgerError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized(_) | Self::InvalidCredentials | Self::UserNotFound(_) => {
                StatusCode::UNAUTHORIZED
            }

            Self::Validation(_) | Self::MalformedOrderNumber(_) => StatusCode::BAD_REQUEST,
            Self::InvalidOrderNumber(_) | Self::InvalidAmount(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }

            Self::LoginTaken(_) | Self::OrderOwnedByAnotherUser(_) | Self::OrderNumberUsed(_) => {
                StatusCode::CONFLICT
            }

            Self::InsufficientFunds { .. } => StatusCode::PAYMENT_REQUIRED,

            Self::Timeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Database(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::InvalidCredentials => "INVALID_CREDENTIALS",
            Self::UserNotFound(_) => "USER_NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::MalformedOrderNumber(_) => "MALFORMED_ORDER_NUMBER",
            Self::InvalidOrderNumber(_) => "INVALID_ORDER_NUMBER",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::LoginTaken(_) => "LOGIN_TAKEN",
            Self::OrderOwnedByAnotherUser(_) => "ORDER_OWNED_BY_ANOTHER_USER",
            Self::OrderNumberUsed(_) => "ORDER_NUMBER_USED",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::Timeout(_) => "TIMEOUT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for LedgerError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Database(e) => {
                tracing::error!(error = %e, "数据库操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Internal(e) => {
                tracing::error!(error = %e, "内部错误");
                "服务内部错误，请稍后重试".to_string()
            }
            Self::Timeout(op) => {
                tracing::warn!(operation = op, "数据库操作超时");
                "服务繁忙，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 订单提交路径上的校验错误映射：格式错误 400，校验位错误 422
impl From<ValidationError> for LedgerError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::Malformed(raw) => Self::MalformedOrderNumber(raw),
            ValidationError::BadChecksum(raw) => Self::InvalidOrderNumber(raw),
            ValidationError::InvalidAmount(msg) => Self::InvalidAmount(msg),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, LedgerError>;
