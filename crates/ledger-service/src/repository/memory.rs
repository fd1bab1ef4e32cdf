//! 内存实现的对账账本，供 Worker 与写回逻辑的单元测试使用
//!
//! 语义与 PostgreSQL 实现一致：领取跳过已锁定的行，提交前的写入对外不可见，
//! 批次被丢弃等同于回滚。

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::traits::{ClaimedBatch, ReconciliationStore};
use crate::error::{LedgerError, Result};
use crate::models::{ApplyResult, ClaimedOrder, Resolution};

#[derive(Default)]
struct State {
    entries: BTreeMap<i64, ClaimedOrder>,
    balances: HashMap<i64, i64>,
    locked: HashSet<i64>,
    fail_apply: bool,
    claims: usize,
}

#[derive(Clone, Default)]
pub struct InMemoryLedger {
    state: Arc<Mutex<State>>,
}

impl InMemoryLedger {
    pub fn with_entries(entries: impl IntoIterator<Item = ClaimedOrder>) -> Self {
        let ledger = Self::default();
        {
            let mut state = ledger.lock();
            for entry in entries {
                let settled = entry.status.settled_amount(entry.change);
                *state.balances.entry(entry.user_id).or_default() += settled;
                state.entries.insert(entry.order_id, entry);
            }
        }
        ledger
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn entry(&self, order_id: i64) -> Option<ClaimedOrder> {
        self.lock().entries.get(&order_id).copied()
    }

    pub fn balance(&self, user_id: i64) -> i64 {
        self.lock().balances.get(&user_id).copied().unwrap_or_default()
    }

    /// 账本中 PROCESSED 记录之和
    pub fn settled_sum(&self, user_id: i64) -> i64 {
        self.lock()
            .entries
            .values()
            .filter(|e| e.user_id == user_id)
            .map(|e| e.status.settled_amount(e.change))
            .sum()
    }

    pub fn is_locked(&self, order_id: i64) -> bool {
        self.lock().locked.contains(&order_id)
    }

    pub fn claim_count(&self) -> usize {
        self.lock().claims
    }

    pub fn fail_on_apply(&self) {
        self.lock().fail_apply = true;
    }
}

#[async_trait]
impl ReconciliationStore for InMemoryLedger {
    type Batch = InMemoryBatch;

    async fn claim(&self, limit: i64) -> Result<InMemoryBatch> {
        let mut state = self.lock();
        state.claims += 1;

        let limit = usize::try_from(limit).unwrap_or_default();
        let orders: Vec<ClaimedOrder> = state
            .entries
            .values()
            .filter(|e| !e.status.is_terminal() && !state.locked.contains(&e.order_id))
            .take(limit)
            .copied()
            .collect();

        for order in &orders {
            state.locked.insert(order.order_id);
        }

        Ok(InMemoryBatch {
            ledger: self.clone(),
            pending: orders.iter().map(|o| (o.order_id, *o)).collect(),
            orders,
            staged: Vec::new(),
            finished: false,
        })
    }
}

pub struct InMemoryBatch {
    ledger: InMemoryLedger,
    orders: Vec<ClaimedOrder>,
    pending: HashMap<i64, ClaimedOrder>,
    staged: Vec<(ClaimedOrder, Resolution)>,
    finished: bool,
}

impl InMemoryBatch {
    fn release(&mut self) {
        let mut state = self.ledger.lock();
        for order in &self.orders {
            state.locked.remove(&order.order_id);
        }
        self.finished = true;
    }
}

#[async_trait]
impl ClaimedBatch for InMemoryBatch {
    fn orders(&self) -> &[ClaimedOrder] {
        &self.orders
    }

    async fn apply(&mut self, resolution: &Resolution) -> Result<ApplyResult> {
        if self.ledger.lock().fail_apply {
            return Err(LedgerError::Internal("模拟写入失败".to_string()));
        }

        match self.pending.remove(&resolution.order_id) {
            Some(previous) => {
                self.staged.push((previous, *resolution));
                Ok(ApplyResult::Applied)
            }
            None => Ok(ApplyResult::Skipped),
        }
    }

    async fn commit(mut self) -> Result<()> {
        {
            let mut state = self.ledger.lock();
            for (previous, resolution) in &self.staged {
                *state.balances.entry(previous.user_id).or_default() +=
                    resolution.balance_delta(previous);
                if let Some(entry) = state.entries.get_mut(&resolution.order_id) {
                    entry.status = resolution.status;
                    entry.change = resolution.amount;
                }
            }
        }
        self.release();
        Ok(())
    }

    async fn rollback(mut self) -> Result<()> {
        self.release();
        Ok(())
    }
}

impl Drop for InMemoryBatch {
    fn drop(&mut self) {
        if !self.finished {
            self.release();
        }
    }
}
