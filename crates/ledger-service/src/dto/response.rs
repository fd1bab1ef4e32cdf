//! 响应 DTO 定义
//!
//! 对外金额以元为单位的小数表示，订单号为字符串，时间为 RFC 3339。

use chrono::SecondsFormat;
use serde::Serialize;

use crate::models::{Balance, EntryStatus, LedgerEntry};
use crate::validation::from_minor_units;

/// 通用 API 响应包装
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: "操作成功".to_string(),
            data: Some(data),
        }
    }

    pub fn success_with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            code: "SUCCESS".to_string(),
            message: message.into(),
            data: Some(data),
        }
    }
}

/// 注册与登录成功后返回的 Token
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
    pub expires_at: i64,
}

/// 订单列表项
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderDto {
    pub number: String,
    pub status: EntryStatus,
    /// 仅 PROCESSED 订单返回
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accrual: Option<f64>,
    pub uploaded_at: String,
}

impl From<&LedgerEntry> for OrderDto {
    fn from(entry: &LedgerEntry) -> Self {
        let accrual = (entry.status == EntryStatus::Processed).then(|| from_minor_units(entry.change));
        Self {
            number: entry.order_id.to_string(),
            status: entry.status,
            accrual,
            uploaded_at: entry.change_date.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}

/// 余额
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BalanceDto {
    pub current: f64,
    pub withdrawn: f64,
}

impl From<Balance> for BalanceDto {
    fn from(balance: Balance) -> Self {
        Self {
            current: from_minor_units(balance.current),
            withdrawn: from_minor_units(balance.withdrawn),
        }
    }
}

/// 提现记录
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WithdrawalDto {
    pub order: String,
    pub sum: f64,
    pub processed_at: String,
}

impl From<&LedgerEntry> for WithdrawalDto {
    fn from(entry: &LedgerEntry) -> Self {
        Self {
            order: entry.order_id.to_string(),
            sum: from_minor_units(entry.change.abs()),
            processed_at: entry.change_date.to_rfc3339_opts(SecondsFormat::Secs, false),
        }
    }
}
