//! 积分账本仓储
//!
//! 提供订单提交、提现以及余额与流水查询的数据访问

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use super::traits::LedgerRepositoryTrait;
use crate::error::{LedgerError, Result};
use crate::models::{
    Balance, EntryStatus, EntryType, InsertOutcome, LedgerEntry, NewLedgerEntry,
};

const ENTRY_COLUMNS: &str = "id, order_id, user_id, change, entry_type, status, change_date";

/// 积分账本仓储
///
/// 余额以账本中 PROCESSED 记录之和为准，users.balance 仅作缓存，
/// 且只在与账本写入相同的事务中更新
pub struct LedgerRepository {
    pool: PgPool,
}

impl LedgerRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// 在事务中查询订单所属用户
    pub async fn owner_in_tx(conn: &mut PgConnection, order_id: i64) -> Result<Option<i64>> {
        let owner = sqlx::query_scalar::<_, i64>(
            "SELECT user_id FROM ledger_entries WHERE order_id = $1",
        )
        .bind(order_id)
        .fetch_optional(conn)
        .await?;

        Ok(owner)
    }

    /// 在事务中按账本计算当前余额
    pub async fn settled_balance_in_tx(conn: &mut PgConnection, user_id: i64) -> Result<i64> {
        let current = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COALESCE(SUM(change), 0)::BIGINT
            FROM ledger_entries
            WHERE user_id = $1 AND status = 'PROCESSED'
            "#,
        )
        .bind(user_id)
        .fetch_one(conn)
        .await?;

        Ok(current)
    }

    /// 在事务中调整用户余额缓存
    pub async fn adjust_cached_balance(
        conn: &mut PgConnection,
        user_id: i64,
        delta: i64,
    ) -> Result<()> {
        if delta == 0 {
            return Ok(());
        }

        sqlx::query("UPDATE users SET balance = balance + $2 WHERE id = $1")
            .bind(user_id)
            .bind(delta)
            .execute(conn)
            .await?;

        Ok(())
    }

    async fn list_by_type(&self, user_id: i64, entry_type: EntryType) -> Result<Vec<LedgerEntry>> {
        let entries = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            SELECT {ENTRY_COLUMNS}
            FROM ledger_entries
            WHERE user_id = $1 AND entry_type = $2
            ORDER BY change_date ASC, id ASC
            "#
        ))
        .bind(user_id)
        .bind(entry_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }
}

#[async_trait]
impl LedgerRepositoryTrait for LedgerRepository {
    async fn lookup_owner(&self, order_id: i64) -> Result<Option<i64>> {
        let mut conn = self.pool.acquire().await?;
        Self::owner_in_tx(&mut conn, order_id).await
    }

    #[instrument(skip(self), fields(order_id = entry.order_id, user_id = entry.user_id))]
    async fn insert_entry(&self, entry: NewLedgerEntry) -> Result<InsertOutcome> {
        let mut tx = self.pool.begin().await?;

        if let Some(owner) = Self::owner_in_tx(&mut tx, entry.order_id).await? {
            tx.rollback().await?;
            return Ok(InsertOutcome::AlreadyOwned(owner));
        }

        // 并发提交同一订单号时，唯一约束让后到者什么也不写
        let inserted = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO ledger_entries (order_id, user_id, change, entry_type, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(entry.order_id)
        .bind(entry.user_id)
        .bind(entry.change)
        .bind(entry.entry_type)
        .bind(entry.status)
        .fetch_optional(&mut *tx)
        .await?;

        if inserted.is_none() {
            tx.rollback().await?;
            let owner = self.lookup_owner(entry.order_id).await?.ok_or_else(|| {
                LedgerError::Internal(format!("订单 {} 写入冲突但未找到记录", entry.order_id))
            })?;
            debug!(owner, "订单号在并发提交中已被写入");
            return Ok(InsertOutcome::AlreadyOwned(owner));
        }

        let delta = entry.status.settled_amount(entry.change);
        Self::adjust_cached_balance(&mut tx, entry.user_id, delta).await?;

        tx.commit().await?;
        Ok(InsertOutcome::Inserted)
    }

    #[instrument(skip(self))]
    async fn withdraw(&self, user_id: i64, order_id: i64, amount: i64) -> Result<LedgerEntry> {
        let mut tx = self.pool.begin().await?;

        // 锁定用户行，串行化同一用户的并发提现
        let locked = sqlx::query_scalar::<_, i64>("SELECT id FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        if locked.is_none() {
            tx.rollback().await?;
            return Err(LedgerError::UserNotFound(user_id));
        }

        let available = Self::settled_balance_in_tx(&mut tx, user_id).await?;
        if available < amount {
            tx.rollback().await?;
            return Err(LedgerError::InsufficientFunds {
                requested: amount,
                available,
            });
        }

        let entry = sqlx::query_as::<_, LedgerEntry>(&format!(
            r#"
            INSERT INTO ledger_entries (order_id, user_id, change, entry_type, status)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (order_id) DO NOTHING
            RETURNING {ENTRY_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(user_id)
        .bind(-amount)
        .bind(EntryType::Withdraw)
        .bind(EntryStatus::Processed)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(entry) = entry else {
            tx.rollback().await?;
            return Err(LedgerError::OrderNumberUsed(order_id));
        };

        Self::adjust_cached_balance(&mut tx, user_id, entry.settled_amount()).await?;

        tx.commit().await?;
        Ok(entry)
    }

    async fn get_balance(&self, user_id: i64) -> Result<Balance> {
        let balance = sqlx::query_as::<_, Balance>(
            r#"
            SELECT COALESCE(SUM(change), 0)::BIGINT AS current,
                   COALESCE(-SUM(change) FILTER (WHERE change < 0), 0)::BIGINT AS withdrawn
            FROM ledger_entries
            WHERE user_id = $1 AND status = 'PROCESSED'
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(balance)
    }

    async fn list_orders(&self, user_id: i64) -> Result<Vec<LedgerEntry>> {
        self.list_by_type(user_id, EntryType::TopUp).await
    }

    async fn list_withdrawals(&self, user_id: i64) -> Result<Vec<LedgerEntry>> {
        self.list_by_type(user_id, EntryType::Withdraw).await
    }
}
