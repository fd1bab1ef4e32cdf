//! 账本枚举类型定义
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化

use serde::{Deserialize, Serialize};

/// 账本记录状态
///
/// NEW → REGISTERED/PROCESSING → PROCESSED/INVALID，提现记录创建即为 PROCESSED
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[sqlx(type_name = "varchar", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    /// 已提交，尚未询问计算系统
    #[default]
    New,
    /// 计算系统已登记
    Registered,
    /// 计算系统处理中
    Processing,
    /// 计算系统拒绝，不计积分
    Invalid,
    /// 处理完成，金额计入余额
    Processed,
}

impl EntryStatus {
    /// 终态记录不再参与对账
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }

    /// 该状态下记录对余额的贡献
    pub fn settled_amount(self, change: i64) -> i64 {
        if self == Self::Processed { change } else { 0 }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Registered => "REGISTERED",
            Self::Processing => "PROCESSING",
            Self::Invalid => "INVALID",
            Self::Processed => "PROCESSED",
        }
    }
}

/// 账本记录类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum EntryType {
    /// 订单积分入账
    TopUp,
    /// 积分提现
    Withdraw,
}

/// 积分计算系统返回的订单状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AccrualStatus {
    Registered,
    Processing,
    Invalid,
    Processed,
}

impl AccrualStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Processed | Self::Invalid)
    }
}

impl From<AccrualStatus> for EntryStatus {
    fn from(status: AccrualStatus) -> Self {
        match status {
            AccrualStatus::Registered => Self::Registered,
            AccrualStatus::Processing => Self::Processing,
            AccrualStatus::Invalid => Self::Invalid,
            AccrualStatus::Processed => Self::Processed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(EntryStatus::Processed.is_terminal());
        assert!(EntryStatus::Invalid.is_terminal());
        assert!(!EntryStatus::New.is_terminal());
        assert!(!EntryStatus::Processing.is_terminal());
    }

    #[test]
    fn test_settled_amount() {
        assert_eq!(EntryStatus::Processed.settled_amount(500), 500);
        assert_eq!(EntryStatus::Processed.settled_amount(-300), -300);
        assert_eq!(EntryStatus::Processing.settled_amount(500), 0);
        assert_eq!(EntryStatus::Invalid.settled_amount(500), 0);
    }

    #[test]
    fn test_accrual_status_json() {
        let status: AccrualStatus = serde_json::from_str("\"PROCESSED\"").unwrap();
        assert_eq!(status, AccrualStatus::Processed);
        assert_eq!(EntryStatus::from(status), EntryStatus::Processed);
        assert!(serde_json::from_str::<AccrualStatus>("\"NEW\"").is_err());
    }

    #[test]
    fn test_entry_type_json() {
        assert_eq!(
            serde_json::to_string(&EntryType::TopUp).unwrap(),
            "\"top_up\""
        );
    }
}
