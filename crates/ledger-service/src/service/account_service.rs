//! 用户注册与登录

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, instrument, warn};

use super::with_deadline;
use crate::auth::{JwtManager, hash_password_with_cost, verify_password};
use crate::error::{LedgerError, Result};
use crate::repository::UserRepositoryTrait;

/// 签发给客户端的 Token
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub user_id: i64,
    pub token: String,
    pub expires_at: i64,
}

/// 账户服务
pub struct AccountService {
    users: Arc<dyn UserRepositoryTrait>,
    jwt: JwtManager,
    bcrypt_cost: u32,
    query_timeout: Duration,
}

impl AccountService {
    pub fn new(
        users: Arc<dyn UserRepositoryTrait>,
        jwt: JwtManager,
        bcrypt_cost: u32,
        query_timeout: Duration,
    ) -> Self {
        Self {
            users,
            jwt,
            bcrypt_cost,
            query_timeout,
        }
    }

    /// 注册并直接签发 Token
    #[instrument(skip(self, password))]
    pub async fn register(&self, login: &str, password: &str) -> Result<IssuedToken> {
        let password_hash = self.hash(password).await?;

        let user = with_deadline(
            self.query_timeout,
            "create_user",
            self.users.create_user(login, &password_hash),
        )
        .await?
        .ok_or_else(|| LedgerError::LoginTaken(login.to_string()))?;

        info!(user_id = user.id, "用户注册成功");
        self.issue(user.id, &user.login)
    }

    /// 校验密码并签发 Token
    #[instrument(skip(self, password))]
    pub async fn login(&self, login: &str, password: &str) -> Result<IssuedToken> {
        let Some(user) = with_deadline(
            self.query_timeout,
            "find_by_login",
            self.users.find_by_login(login),
        )
        .await?
        else {
            warn!("登录失败：用户不存在");
            return Err(LedgerError::InvalidCredentials);
        };

        let password = password.to_string();
        let password_hash = user.password_hash.clone();
        let matched = tokio::task::spawn_blocking(move || verify_password(&password, &password_hash))
            .await
            .map_err(|e| LedgerError::Internal(format!("密码校验任务失败: {}", e)))??;

        if !matched {
            warn!(user_id = user.id, "登录失败：密码错误");
            return Err(LedgerError::InvalidCredentials);
        }

        self.issue(user.id, &user.login)
    }

    /// bcrypt 计算较慢，放到阻塞线程池执行
    async fn hash(&self, password: &str) -> Result<String> {
        let password = password.to_string();
        let cost = self.bcrypt_cost;
        tokio::task::spawn_blocking(move || hash_password_with_cost(&password, cost))
            .await
            .map_err(|e| LedgerError::Internal(format!("密码哈希任务失败: {}", e)))?
    }

    fn issue(&self, user_id: i64, login: &str) -> Result<IssuedToken> {
        let (token, expires_at) = self.jwt.generate_token(user_id, login)?;
        Ok(IssuedToken {
            user_id,
            token,
            expires_at,
        })
    }
}
