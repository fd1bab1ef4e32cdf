//! 对账批次的领取与写回
//!
//! 领取使用 `FOR UPDATE SKIP LOCKED`，并发的领取互不等待、互不重叠。
//! 领取事务在整个对账周期内保持打开，对账结果以流的方式写入同一事务，
//! 全部写入后提交；周期被取消或写入失败时整体回滚，行锁随之释放。
//!
//! 用户余额缓存的调整在批次内按用户累计，提交前才写入 `users`，
//! 因此对账等待积分系统期间不会持有用户行锁，提现不会被阻塞。

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{mpsc, watch};
use tracing::{debug, instrument, warn};

use super::ledger_repo::LedgerRepository;
use super::traits::{ClaimedBatch, ReconciliationStore};
use crate::error::Result;
use crate::models::{ApplyResult, ClaimedOrder, Resolution};

/// PostgreSQL 实现的对账批次领取方
#[derive(Clone)]
pub struct PgReconciliationStore {
    pool: PgPool,
}

impl PgReconciliationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReconciliationStore for PgReconciliationStore {
    type Batch = PgClaimedBatch;

    #[instrument(skip(self))]
    async fn claim(&self, limit: i64) -> Result<PgClaimedBatch> {
        let mut tx = self.pool.begin().await?;

        let orders = sqlx::query_as::<_, ClaimedOrder>(
            r#"
            SELECT order_id, user_id, status, change
            FROM ledger_entries
            WHERE status NOT IN ('PROCESSED', 'INVALID')
              AND entry_type = 'top_up'
            ORDER BY change_date ASC
            LIMIT $1
            FOR UPDATE SKIP LOCKED
            "#,
        )
        .bind(limit)
        .fetch_all(&mut *tx)
        .await?;

        debug!(claimed = orders.len(), "对账批次已领取");

        Ok(PgClaimedBatch::new(tx, orders))
    }
}

/// 持有领取事务的对账批次
pub struct PgClaimedBatch {
    tx: Transaction<'static, Postgres>,
    orders: Vec<ClaimedOrder>,
    /// 尚未写入结果的订单
    pending: HashMap<i64, ClaimedOrder>,
    /// 按用户累计、提交前写入的余额缓存调整
    balance_deltas: BTreeMap<i64, i64>,
}

impl PgClaimedBatch {
    fn new(tx: Transaction<'static, Postgres>, orders: Vec<ClaimedOrder>) -> Self {
        let pending = orders.iter().map(|o| (o.order_id, *o)).collect();
        Self {
            tx,
            orders,
            pending,
            balance_deltas: BTreeMap::new(),
        }
    }
}

#[async_trait]
impl ClaimedBatch for PgClaimedBatch {
    fn orders(&self) -> &[ClaimedOrder] {
        &self.orders
    }

    async fn apply(&mut self, resolution: &Resolution) -> Result<ApplyResult> {
        let Some(previous) = self.pending.remove(&resolution.order_id) else {
            warn!(order_id = resolution.order_id, "对账结果不属于本批次或已写入，忽略");
            return Ok(ApplyResult::Skipped);
        };

        sqlx::query("UPDATE ledger_entries SET status = $2, change = $3 WHERE order_id = $1")
            .bind(resolution.order_id)
            .bind(resolution.status)
            .bind(resolution.amount)
            .execute(&mut *self.tx)
            .await?;

        let delta = resolution.balance_delta(&previous);
        if delta != 0 {
            *self.balance_deltas.entry(previous.user_id).or_insert(0) += delta;
        }

        debug!(
            order_id = resolution.order_id,
            status = resolution.status.as_str(),
            amount = resolution.amount,
            delta,
            "对账结果已写入"
        );

        Ok(ApplyResult::Applied)
    }

    async fn commit(mut self) -> Result<()> {
        // 按用户 ID 顺序加锁，与其他批次的提交不会互相死锁
        for (user_id, delta) in std::mem::take(&mut self.balance_deltas) {
            LedgerRepository::adjust_cached_balance(&mut self.tx, user_id, delta).await?;
        }
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// 批次写回结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// 结果流关闭，批次已提交
    Committed { applied: usize, skipped: usize },
    /// 收到停机信号，批次已回滚
    Cancelled,
}

/// 消费结果流并写入批次
///
/// 发送端全部关闭后提交；停机信号到达时回滚，不做部分提交。
/// 写入失败时回滚并返回错误。
pub async fn apply_resolutions<B: ClaimedBatch>(
    mut batch: B,
    mut resolutions: mpsc::Receiver<Resolution>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<ApplyOutcome> {
    let mut applied = 0;
    let mut skipped = 0;

    loop {
        tokio::select! {
            biased;

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    batch.rollback().await?;
                    return Ok(ApplyOutcome::Cancelled);
                }
            }

            next = resolutions.recv() => match next {
                Some(resolution) => match batch.apply(&resolution).await {
                    Ok(ApplyResult::Applied) => applied += 1,
                    Ok(ApplyResult::Skipped) => skipped += 1,
                    Err(e) => {
                        if let Err(rollback_err) = batch.rollback().await {
                            warn!(error = %rollback_err, "对账批次回滚失败");
                        }
                        return Err(e);
                    }
                },
                None => {
                    batch.commit().await?;
                    return Ok(ApplyOutcome::Committed { applied, skipped });
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntryStatus;
    use crate::repository::memory::InMemoryLedger;

    fn order(order_id: i64, user_id: i64) -> ClaimedOrder {
        ClaimedOrder {
            order_id,
            user_id,
            status: EntryStatus::New,
            change: 0,
        }
    }

    fn processed(order_id: i64, amount: i64) -> Resolution {
        Resolution {
            order_id,
            status: EntryStatus::Processed,
            amount,
        }
    }

    #[tokio::test]
    async fn test_commit_when_channel_closes() {
        let ledger = InMemoryLedger::with_entries([order(18, 11), order(182, 11)]);
        let batch = ledger.claim(10).await.unwrap();
        let (tx, rx) = mpsc::channel(4);
        let (_stop, mut shutdown) = watch::channel(false);

        tx.send(processed(18, 50000)).await.unwrap();
        tx.send(processed(182, 1000)).await.unwrap();
        drop(tx);

        let outcome = apply_resolutions(batch, rx, &mut shutdown).await.unwrap();

        assert_eq!(
            outcome,
            ApplyOutcome::Committed {
                applied: 2,
                skipped: 0
            }
        );
        assert_eq!(ledger.balance(11), 51000);
        assert!(!ledger.is_locked(18));
    }

    #[tokio::test]
    async fn test_duplicate_and_foreign_resolutions_skipped() {
        let ledger = InMemoryLedger::with_entries([order(18, 11), order(1826, 2)]);
        let batch = ledger.claim(1).await.unwrap();
        let (tx, rx) = mpsc::channel(4);
        let (_stop, mut shutdown) = watch::channel(false);

        tx.send(processed(18, 500)).await.unwrap();
        tx.send(processed(18, 700)).await.unwrap();
        tx.send(processed(1826, 900)).await.unwrap();
        drop(tx);

        let outcome = apply_resolutions(batch, rx, &mut shutdown).await.unwrap();

        assert_eq!(
            outcome,
            ApplyOutcome::Committed {
                applied: 1,
                skipped: 2
            }
        );
        assert_eq!(ledger.entry(18).unwrap().change, 500);
        assert_eq!(ledger.balance(11), 500);
        assert_eq!(ledger.entry(1826).unwrap().status, EntryStatus::New);
        assert_eq!(ledger.balance(2), 0);
    }

    #[tokio::test]
    async fn test_shutdown_rolls_back_everything() {
        let ledger = InMemoryLedger::with_entries([order(18, 11), order(182, 11)]);
        let batch = ledger.claim(10).await.unwrap();
        let (tx, rx) = mpsc::channel(4);
        let (stop, mut shutdown) = watch::channel(false);

        let apply = tokio::spawn(async move { apply_resolutions(batch, rx, &mut shutdown).await });

        tx.send(processed(18, 500)).await.unwrap();
        tokio::task::yield_now().await;
        stop.send(true).unwrap();

        let outcome = apply.await.unwrap().unwrap();

        assert_eq!(outcome, ApplyOutcome::Cancelled);
        assert_eq!(ledger.entry(18).unwrap().status, EntryStatus::New);
        assert_eq!(ledger.balance(11), 0);
        assert!(!ledger.is_locked(18));
        assert!(!ledger.is_locked(182));
    }

    #[tokio::test]
    async fn test_apply_failure_rolls_back() {
        let ledger = InMemoryLedger::with_entries([order(18, 11)]);
        ledger.fail_on_apply();
        let batch = ledger.claim(10).await.unwrap();
        let (tx, rx) = mpsc::channel(4);
        let (_stop, mut shutdown) = watch::channel(false);

        tx.send(processed(18, 500)).await.unwrap();
        drop(tx);

        assert!(apply_resolutions(batch, rx, &mut shutdown).await.is_err());
        assert_eq!(ledger.balance(11), 0);
        assert!(!ledger.is_locked(18));
    }
}
