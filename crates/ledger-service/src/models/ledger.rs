//! 账本记录模型

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::{AccrualStatus, EntryStatus, EntryType};

/// 账本记录（一次积分变动）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct LedgerEntry {
    pub id: i64,
    pub order_id: i64,
    pub user_id: i64,
    /// 变动金额（分），提现为负数
    pub change: i64,
    pub entry_type: EntryType,
    pub status: EntryStatus,
    pub change_date: DateTime<Utc>,
}

impl LedgerEntry {
    /// 对余额的贡献
    pub fn settled_amount(&self) -> i64 {
        self.status.settled_amount(self.change)
    }
}

/// 待写入的账本记录
#[derive(Debug, Clone, PartialEq)]
pub struct NewLedgerEntry {
    pub order_id: i64,
    pub user_id: i64,
    pub change: i64,
    pub entry_type: EntryType,
    pub status: EntryStatus,
}

impl NewLedgerEntry {
    /// 新提交的订单：金额为 0，等待对账
    pub fn top_up(order_id: i64, user_id: i64) -> Self {
        Self {
            order_id,
            user_id,
            change: 0,
            entry_type: EntryType::TopUp,
            status: EntryStatus::New,
        }
    }
}

/// 订单写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    /// 订单号已存在，附带其所属用户
    AlreadyOwned(i64),
}

/// 用户余额（分）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Balance {
    pub current: i64,
    /// 已提现总额，正数
    pub withdrawn: i64,
}

/// 被对账批次锁定的订单
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::FromRow)]
pub struct ClaimedOrder {
    pub order_id: i64,
    pub user_id: i64,
    pub status: EntryStatus,
    pub change: i64,
}

/// 积分计算系统对单个订单的结论（金额已换算为分）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualReport {
    pub order_id: i64,
    pub status: AccrualStatus,
    pub accrual: i64,
}

/// 写回账本的对账结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub order_id: i64,
    pub status: EntryStatus,
    pub amount: i64,
}

impl Resolution {
    /// 终态使用计算系统给出的金额，处理中状态保留原金额
    pub fn from_report(claimed: &ClaimedOrder, report: &AccrualReport) -> Self {
        let amount = if report.status.is_terminal() {
            report.accrual
        } else {
            claimed.change
        };

        Self {
            order_id: claimed.order_id,
            status: report.status.into(),
            amount,
        }
    }

    /// 相对于原记录的余额变化
    pub fn balance_delta(&self, previous: &ClaimedOrder) -> i64 {
        self.status.settled_amount(self.amount) - previous.status.settled_amount(previous.change)
    }
}

/// 单条对账结果的写入情况
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyResult {
    Applied,
    /// 不属于本批次或本批次已写入过
    Skipped,
}
