//! 用户模型

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 注册用户
///
/// `balance` 为缓存列，只在与账本写入相同的事务中更新
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub login: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub balance: i64,
    pub created_at: DateTime<Utc>,
}
