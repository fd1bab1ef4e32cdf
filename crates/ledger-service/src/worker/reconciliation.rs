//! 订单对账 Worker
//!
//! 定时领取未终结的订单，逐个向积分计算系统查询结论，并把结果写回领取时的同一事务：
//! `IDLE → CLAIMING → RESOLVING → COMMITTING → IDLE`，领取为空时直接回到 `IDLE`。
//!
//! 查询与写回是生产者/消费者关系：查询任务每得到一个结论就通过有界 channel
//! 交给写回循环，不等整批查询完成。停机信号到达时正在进行的批次整体回滚。

use std::sync::Arc;
use std::time::{Duration, Instant};

use points_shared::config::WorkerConfig;
use points_shared::observability::metrics;
use tokio::sync::{mpsc, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use crate::accrual::AccrualResolver;
use crate::error::{LedgerError, Result};
use crate::models::{ClaimedOrder, Resolution};
use crate::repository::{ApplyOutcome, ClaimedBatch, ReconciliationStore, apply_resolutions};

const WORKER_NAME: &str = "reconciliation_worker";

/// 查询任务与写回循环之间的 channel 容量
const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// 轮询间隔下限，`interval` 不接受零间隔
const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// 一轮对账的结束方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// 没有待对账的订单
    Idle,
    Committed,
    /// 停机信号到达，批次已回滚
    Cancelled,
    /// 领取或写回出错，批次已回滚
    Failed,
}

impl CycleOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Committed => "committed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
        }
    }
}

/// 一轮对账的统计
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleReport {
    pub claimed: usize,
    pub applied: usize,
    pub skipped: usize,
    /// 重试耗尽、本轮未得到结论的订单数
    pub unresolved: usize,
    pub outcome: CycleOutcome,
}

impl CycleReport {
    fn empty(outcome: CycleOutcome) -> Self {
        Self {
            claimed: 0,
            applied: 0,
            skipped: 0,
            unresolved: 0,
            outcome,
        }
    }
}

/// 对账 Worker
pub struct ReconciliationWorker<S, A> {
    store: Arc<S>,
    resolver: Arc<A>,
    poll_interval: Duration,
    /// 每轮领取的最大订单数
    rows_per_cycle: i64,
    channel_capacity: usize,
}

impl<S, A> ReconciliationWorker<S, A>
where
    S: ReconciliationStore + 'static,
    A: AccrualResolver + 'static,
{
    pub fn new(store: Arc<S>, resolver: Arc<A>, config: &WorkerConfig) -> Self {
        let poll_interval = config.poll_interval();
        if poll_interval < MIN_POLL_INTERVAL {
            warn!(
                configured = ?poll_interval,
                "轮询间隔过小，使用下限 {:?}",
                MIN_POLL_INTERVAL
            );
        }

        Self {
            store,
            resolver,
            poll_interval: poll_interval.max(MIN_POLL_INTERVAL),
            rows_per_cycle: config.rows_per_cycle,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }

    /// 主循环：每个 tick 执行一轮对账，直到收到停机信号
    ///
    /// 首个 tick 立即触发；某轮耗时超过间隔时顺延，不会连续补跑。
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            poll_interval = ?self.poll_interval,
            rows_per_cycle = self.rows_per_cycle,
            "对账 Worker 已启动"
        );

        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }

                _ = ticker.tick() => {
                    let started = Instant::now();
                    let report = match self.run_cycle(&mut shutdown).await {
                        Ok(report) => report,
                        Err(e) => {
                            error!(error = %e, "对账周期失败，等待下一个 tick 重试");
                            CycleReport::empty(CycleOutcome::Failed)
                        }
                    };

                    if report.outcome != CycleOutcome::Idle {
                        info!(
                            outcome = report.outcome.as_str(),
                            claimed = report.claimed,
                            applied = report.applied,
                            skipped = report.skipped,
                            unresolved = report.unresolved,
                            "对账周期结束"
                        );
                    }

                    metrics::record_reconciliation_cycle(
                        report.outcome.as_str(),
                        report.claimed,
                        report.applied,
                        report.unresolved,
                        started.elapsed().as_secs_f64(),
                    );
                    metrics::set_worker_last_run(WORKER_NAME);
                }
            }
        }

        info!("对账 Worker 已停止");
    }

    /// 执行一轮对账
    ///
    /// 领取或写回出错时批次已回滚，错误返回给调用方记录。
    pub async fn run_cycle(&self, shutdown: &mut watch::Receiver<bool>) -> Result<CycleReport> {
        let batch = self.store.claim(self.rows_per_cycle).await?;
        let orders = batch.orders().to_vec();

        if orders.is_empty() {
            batch.commit().await?;
            return Ok(CycleReport::empty(CycleOutcome::Idle));
        }

        let claimed = orders.len();
        debug!(claimed, "开始查询对账结论");

        let (tx, rx) = mpsc::channel(self.channel_capacity);
        let producer = tokio::spawn(resolve_orders(self.resolver.clone(), orders, tx));

        match apply_resolutions(batch, rx, shutdown).await {
            Ok(ApplyOutcome::Committed { applied, skipped }) => {
                // 写回循环在发送端全部关闭后才提交，此时查询任务已结束
                let unresolved = producer
                    .await
                    .map_err(|e| LedgerError::Internal(format!("对账查询任务异常退出: {}", e)))?;
                Ok(CycleReport {
                    claimed,
                    applied,
                    skipped,
                    unresolved,
                    outcome: CycleOutcome::Committed,
                })
            }
            Ok(ApplyOutcome::Cancelled) => {
                producer.abort();
                warn!(claimed, "收到停机信号，对账批次已回滚");
                Ok(CycleReport {
                    claimed,
                    applied: 0,
                    skipped: 0,
                    unresolved: 0,
                    outcome: CycleOutcome::Cancelled,
                })
            }
            Err(e) => {
                producer.abort();
                Err(e)
            }
        }
    }
}

/// 顺序查询批次内的订单，把结论交给写回循环，返回未得到结论的订单数
///
/// 每个订单只查询一次；写回循环提前退出时停止查询。
async fn resolve_orders<A: AccrualResolver>(
    resolver: Arc<A>,
    orders: Vec<ClaimedOrder>,
    tx: mpsc::Sender<Resolution>,
) -> usize {
    let mut unresolved = 0;

    for order in orders {
        match resolver.resolve(order.order_id).await {
            Ok(report) => {
                let resolution = Resolution::from_report(&order, &report);
                if tx.send(resolution).await.is_err() {
                    debug!(order_id = order.order_id, "写回循环已退出，停止查询");
                    break;
                }
            }
            Err(e) => {
                warn!(
                    order_id = order.order_id,
                    error = %e,
                    "重试耗尽仍未得到结论，订单留待下一轮"
                );
                unresolved += 1;
            }
        }
    }

    unresolved
}
