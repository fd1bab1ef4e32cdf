//! 数据库仓储层
//!
//! - 请求链路的账本与用户读写（`LedgerRepository`、`UserRepository`）
//! - 对账批次的领取与写回（`PgReconciliationStore`、`apply_resolutions`）
//! - 定义 trait 接口以支持 mock 测试

mod ledger_repo;
mod reconciliation;
mod traits;
mod user_repo;

#[cfg(test)]
pub(crate) mod memory;

pub use ledger_repo::LedgerRepository;
pub use reconciliation::{
    ApplyOutcome, PgClaimedBatch, PgReconciliationStore, apply_resolutions,
};
pub use traits::{ClaimedBatch, LedgerRepositoryTrait, ReconciliationStore, UserRepositoryTrait};
pub use user_repo::UserRepository;

#[cfg(test)]
pub use traits::{MockLedgerRepositoryTrait, MockUserRepositoryTrait};
