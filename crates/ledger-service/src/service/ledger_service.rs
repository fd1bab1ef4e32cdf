//! 订单提交、提现与余额查询

use std::sync::Arc;
use std::time::Duration;

use points_shared::observability::metrics;
use tracing::{info, instrument};

use super::with_deadline;
use crate::error::{LedgerError, Result};
use crate::models::{Balance, InsertOutcome, LedgerEntry, NewLedgerEntry};
use crate::repository::LedgerRepositoryTrait;
use crate::validation::{OrderNumber, to_minor_units};

/// 订单提交结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// 新订单已登记，等待对账
    Accepted,
    /// 本人此前已提交过该订单
    AlreadySubmitted,
}

/// 账本服务
pub struct LedgerService {
    repo: Arc<dyn LedgerRepositoryTrait>,
    query_timeout: Duration,
}

impl LedgerService {
    pub fn new(repo: Arc<dyn LedgerRepositoryTrait>, query_timeout: Duration) -> Self {
        Self {
            repo,
            query_timeout,
        }
    }

    /// 提交订单号
    ///
    /// 订单号已属于本人视为幂等成功，属于他人返回冲突。
    /// 并发提交同一订单号时由唯一约束兜底，同样按归属判定。
    #[instrument(skip(self))]
    pub async fn submit_order(&self, user_id: i64, raw: &str) -> Result<SubmitOutcome> {
        let order = OrderNumber::parse(raw).inspect_err(|_| {
            metrics::record_order_submission("rejected");
        })?;

        let owner = with_deadline(
            self.query_timeout,
            "lookup_owner",
            self.repo.lookup_owner(order.value()),
        )
        .await?;

        let outcome = match owner {
            Some(owner) => Self::ownership(order, user_id, owner),
            None => {
                let inserted = with_deadline(
                    self.query_timeout,
                    "insert_entry",
                    self.repo
                        .insert_entry(NewLedgerEntry::top_up(order.value(), user_id)),
                )
                .await?;

                match inserted {
                    InsertOutcome::Inserted => {
                        info!(order_id = order.value(), user_id, "订单已登记");
                        Ok(SubmitOutcome::Accepted)
                    }
                    InsertOutcome::AlreadyOwned(owner) => Self::ownership(order, user_id, owner),
                }
            }
        };

        metrics::record_order_submission(match &outcome {
            Ok(SubmitOutcome::Accepted) => "accepted",
            Ok(SubmitOutcome::AlreadySubmitted) => "duplicate",
            Err(_) => "conflict",
        });
        outcome
    }

    fn ownership(order: OrderNumber, user_id: i64, owner: i64) -> Result<SubmitOutcome> {
        if owner == user_id {
            Ok(SubmitOutcome::AlreadySubmitted)
        } else {
            Err(LedgerError::OrderOwnedByAnotherUser(order.value()))
        }
    }

    /// 提现
    ///
    /// 提现订单号不合法（格式或校验位）一律按 422 处理；金额必须为正数。
    #[instrument(skip(self))]
    pub async fn withdraw(&self, user_id: i64, order: &str, sum: f64) -> Result<LedgerEntry> {
        let order = OrderNumber::parse(order)
            .map_err(|e| LedgerError::InvalidOrderNumber(e.to_string()))?;
        let amount = to_minor_units(sum)?;
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount(sum.to_string()));
        }

        let result = with_deadline(
            self.query_timeout,
            "withdraw",
            self.repo.withdraw(user_id, order.value(), amount),
        )
        .await;

        metrics::record_withdrawal(match &result {
            Ok(_) => "success",
            Err(LedgerError::InsufficientFunds { .. }) => "insufficient_funds",
            Err(LedgerError::OrderNumberUsed(_)) => "order_used",
            Err(_) => "error",
        });

        let entry = result?;
        info!(order_id = entry.order_id, user_id, amount, "提现完成");
        Ok(entry)
    }

    pub async fn balance(&self, user_id: i64) -> Result<Balance> {
        with_deadline(
            self.query_timeout,
            "get_balance",
            self.repo.get_balance(user_id),
        )
        .await
    }

    pub async fn list_orders(&self, user_id: i64) -> Result<Vec<LedgerEntry>> {
        with_deadline(
            self.query_timeout,
            "list_orders",
            self.repo.list_orders(user_id),
        )
        .await
    }

    pub async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>> {
        with_deadline(
            self.query_timeout,
            "list_withdrawals",
            self.repo.list_withdrawals(user_id),
        )
        .await
    }
}
