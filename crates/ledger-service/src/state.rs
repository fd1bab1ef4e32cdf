//! 应用状态定义
//!
//! 包含 Axum 路由共享的服务与连接池

use std::sync::Arc;

use points_shared::config::AppConfig;
use points_shared::database::Database;

use crate::auth::{JwtConfig, JwtManager};
use crate::repository::{LedgerRepository, UserRepository};
use crate::service::{AccountService, LedgerService};

/// Axum 应用共享状态
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerService>,
    pub accounts: Arc<AccountService>,
    pub jwt: JwtManager,
    /// 就绪探针使用
    pub db: Database,
}

impl AppState {
    /// 基于 PostgreSQL 仓储构建状态
    pub fn new(db: Database, config: &AppConfig) -> Self {
        let jwt = JwtManager::new(JwtConfig::from(&config.auth));
        let query_timeout = config.database.query_timeout();

        let ledger = LedgerService::new(
            Arc::new(LedgerRepository::new(db.pool().clone())),
            query_timeout,
        );
        let accounts = AccountService::new(
            Arc::new(UserRepository::new(db.pool().clone())),
            jwt.clone(),
            config.auth.bcrypt_cost,
            query_timeout,
        );

        Self::with_services(db, ledger, accounts, jwt)
    }

    pub fn with_services(
        db: Database,
        ledger: LedgerService,
        accounts: AccountService,
        jwt: JwtManager,
    ) -> Self {
        Self {
            ledger: Arc::new(ledger),
            accounts: Arc::new(accounts),
            jwt,
            db,
        }
    }
}
