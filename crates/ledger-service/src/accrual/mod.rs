//! 积分计算系统（accrual）客户端
//!
//! 按订单号查询计算结论，带有限次数的重试与限流冷却。

mod client;

pub use client::AccrualClient;

use async_trait::async_trait;
use serde::Deserialize;

use crate::models::{AccrualReport, AccrualStatus};
use crate::validation::{OrderNumber, to_minor_units};

/// 计算系统调用错误
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AccrualError {
    #[error("请求计算系统失败: {0}")]
    Transport(String),
    #[error("计算系统限流")]
    RateLimited,
    #[error("计算系统返回非预期状态码: {0}")]
    UnexpectedStatus(u16),
    #[error("计算系统响应无法解析: {0}")]
    Decode(String),
    #[error("客户端配置错误: {0}")]
    Configuration(String),
}

impl AccrualError {
    /// 用于指标标签
    pub fn outcome(&self) -> &'static str {
        match self {
            Self::Transport(_) => "transport_error",
            Self::RateLimited => "rate_limited",
            Self::UnexpectedStatus(_) => "unexpected_status",
            Self::Decode(_) => "decode_error",
            Self::Configuration(_) => "configuration_error",
        }
    }
}

/// 订单结论的查询方
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AccrualResolver: Send + Sync {
    /// 查询单个订单；重试耗尽时返回最后一次错误
    async fn resolve(&self, order_id: i64) -> Result<AccrualReport, AccrualError>;
}

/// 计算系统响应体
#[derive(Debug, Clone, Deserialize)]
pub struct AccrualPayload {
    pub order: String,
    pub status: AccrualStatus,
    #[serde(default)]
    pub accrual: Option<f64>,
}

impl AccrualPayload {
    /// 校验响应中的订单号并换算金额
    ///
    /// 订单号必须通过 Luhn 校验且与请求的订单一致。
    pub fn into_report(self, requested: i64) -> Result<AccrualReport, AccrualError> {
        let order = OrderNumber::parse(&self.order)
            .map_err(|e| AccrualError::Decode(e.to_string()))?;
        if order.value() != requested {
            return Err(AccrualError::Decode(format!(
                "响应订单号 {} 与请求 {} 不一致",
                order, requested
            )));
        }

        let accrual = match self.accrual {
            Some(value) => to_minor_units(value).map_err(|e| AccrualError::Decode(e.to_string()))?,
            None => 0,
        };

        Ok(AccrualReport {
            order_id: requested,
            status: self.status,
            accrual,
        })
    }
}
