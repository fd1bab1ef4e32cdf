//! 仓储 Trait 定义
//!
//! 服务层与对账 Worker 依赖抽象而非具体实现，支持 mock 与内存实现测试

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ApplyResult, Balance, ClaimedOrder, InsertOutcome, LedgerEntry, NewLedgerEntry, Resolution,
    User,
};

/// 账本仓储接口（请求链路使用）
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerRepositoryTrait: Send + Sync {
    /// 查询订单号的所属用户
    async fn lookup_owner(&self, order_id: i64) -> Result<Option<i64>>;

    /// 写入账本记录，订单号已存在时返回其所属用户
    async fn insert_entry(&self, entry: NewLedgerEntry) -> Result<InsertOutcome>;

    /// 提现：余额不足时在写入前拒绝
    async fn withdraw(&self, user_id: i64, order_id: i64, amount: i64) -> Result<LedgerEntry>;

    async fn get_balance(&self, user_id: i64) -> Result<Balance>;
    async fn list_orders(&self, user_id: i64) -> Result<Vec<LedgerEntry>>;
    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>>;
}

/// 用户仓储接口
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepositoryTrait: Send + Sync {
    /// 创建用户，登录名已存在时返回 None
    async fn create_user(&self, login: &str, password_hash: &str) -> Result<Option<User>>;
    async fn find_by_login(&self, login: &str) -> Result<Option<User>>;
}

/// 对账批次的领取方
#[async_trait]
pub trait ReconciliationStore: Send + Sync {
    type Batch: ClaimedBatch + 'static;

    /// 领取最多 `limit` 条未终结的订单，返回的批次持有这些行直到提交或回滚
    async fn claim(&self, limit: i64) -> Result<Self::Batch>;
}

/// 已领取的对账批次
///
/// 同一批次内每个订单最多写入一次；未提交即被丢弃等同于回滚。
#[async_trait]
pub trait ClaimedBatch: Send {
    fn orders(&self) -> &[ClaimedOrder];

    /// 写入一条对账结果（订单状态、金额以及用户余额缓存）
    async fn apply(&mut self, resolution: &Resolution) -> Result<ApplyResult>;

    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}
