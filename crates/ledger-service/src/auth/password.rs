//! 密码处理
//!
//! 使用 bcrypt 生成与校验密码哈希

use bcrypt::{DEFAULT_COST, hash, verify};

use crate::error::LedgerError;

/// 使用默认成本因子哈希密码
pub fn hash_password(password: &str) -> Result<String, LedgerError> {
    hash_password_with_cost(password, DEFAULT_COST)
}

pub fn hash_password_with_cost(password: &str, cost: u32) -> Result<String, LedgerError> {
    hash(password, cost).map_err(|e| LedgerError::Internal(format!("密码哈希失败: {}", e)))
}

/// 比较明文密码与存储的哈希值
pub fn verify_password(password: &str, hash: &str) -> Result<bool, LedgerError> {
    verify(password, hash).map_err(|e| LedgerError::Internal(format!("密码验证失败: {}", e)))
}
