//! 重试策略与执行器
//!
//! 提供线性退避，以及针对限流响应的固定冷却。
//! 错误是否重试、是否进入冷却由调用方通过 `classify` 闭包决定。

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::{info, warn};

// ---------------------------------------------------------------------------
// RetryPolicy — 重试策略配置
// ---------------------------------------------------------------------------

/// 重试策略配置
///
/// 常规失败按线性退避：第 N 次失败后等待 N * step。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// 最大执行次数（含首次执行）
    pub max_attempts: u32,
    pub step: Duration,
    /// 被判定为限流时的固定等待时间，替代常规退避
    pub cooldown: Duration,
}

impl RetryPolicy {
    /// 线性退避策略
    pub fn linear(max_attempts: u32, step: Duration, cooldown: Duration) -> Self {
        Self {
            max_attempts,
            step,
            cooldown,
        }
    }

    /// 计算第 N 次失败后的等待时间（attempt 从 1 开始）
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        self.step.saturating_mul(attempt.max(1))
    }

    /// 第 attempt 次失败后是否还有机会再试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

// ---------------------------------------------------------------------------
// RetryAction — 失败后的处理方式
// ---------------------------------------------------------------------------

/// 单次失败后的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryAction {
    /// 按退避策略等待后重试
    Retry,
    /// 按固定冷却时间等待后重试
    Cooldown,
    /// 不可重试，直接返回
    Abort,
}

// ---------------------------------------------------------------------------
// retry_with_policy — 带重试的异步执行器
// ---------------------------------------------------------------------------

/// 带重试的异步执行器
///
/// `operation` 接收当前执行序号（从 1 开始）。最后一次失败后不再等待，直接返回错误。
pub async fn retry_with_policy<F, Fut, T, E>(
    policy: &RetryPolicy,
    operation_name: &str,
    classify: impl Fn(&E) -> RetryAction,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt: u32 = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    info!(operation = operation_name, attempt, "操作在重试后成功");
                }
                return Ok(value);
            }
            Err(err) => {
                let delay = match classify(&err) {
                    RetryAction::Abort => {
                        warn!(
                            operation = operation_name,
                            attempt,
                            error = %err,
                            "操作失败且不可重试，直接返回错误"
                        );
                        return Err(err);
                    }
                    RetryAction::Cooldown => policy.cooldown,
                    RetryAction::Retry => policy.delay_for_attempt(attempt),
                };

                if !policy.should_retry(attempt) {
                    warn!(
                        operation = operation_name,
                        attempt,
                        max_attempts = policy.max_attempts,
                        error = %err,
                        "已达最大执行次数，放弃重试"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "操作失败，将在退避后重试"
                );

                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

// ---------------------------------------------------------------------------
// 单元测试
// ---------------------------------------------------------------------------
