//! 服务层
//!
//! 协调仓储层完成订单提交、提现与账户认证。请求链路上的每次数据库操作
//! 都带有超时，避免数据库无响应时耗尽请求处理能力。

pub mod account_service;
pub mod ledger_service;

pub use account_service::{AccountService, IssuedToken};
pub use ledger_service::{LedgerService, SubmitOutcome};

use std::future::Future;
use std::time::Duration;

use crate::error::{LedgerError, Result};

/// 为数据库操作加上超时，超时映射为 `LedgerError::Timeout`
pub(crate) async fn with_deadline<T>(
    limit: Duration,
    operation: &'static str,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::time::timeout(limit, fut)
        .await
        .map_err(|_| LedgerError::Timeout(operation))?
}
