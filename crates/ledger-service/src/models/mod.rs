//! 数据模型定义

pub mod enums;
pub mod ledger;
pub mod user;

pub use enums::{AccrualStatus, EntryStatus, EntryType};
pub use ledger::{
    AccrualReport, ApplyResult, Balance, ClaimedOrder, InsertOutcome, LedgerEntry,
    NewLedgerEntry, Resolution,
};
pub use user::User;
