//! 命令行参数
//!
//! 命令行参数覆盖配置文件与 `POINTS__` 环境变量，但会被历史环境变量
//! （RUN_ADDRESS 等）再次覆盖。

use clap::Parser;
use points_shared::config::ConfigOverrides;

/// 积分账本服务
#[derive(Parser, Debug, Default)]
#[command(name = "points-ledger")]
#[command(version, about = "积分账本与订单对账服务")]
pub struct Cli {
    /// 监听地址 host:port
    #[arg(short = 'a', long = "address")]
    pub run_address: Option<String>,

    /// PostgreSQL 连接串
    #[arg(short = 'd', long = "database-uri")]
    pub database_uri: Option<String>,

    /// 积分计算系统地址
    #[arg(short = 'r', long = "accrual-address")]
    pub accrual_address: Option<String>,

    /// JWT 签名密钥
    #[arg(short = 'k', long = "key")]
    pub key: Option<String>,

    /// 每轮对账领取的订单数
    #[arg(long = "rows")]
    pub rows_per_cycle: Option<i64>,

    /// 输出 debug 级别日志
    #[arg(long)]
    pub debug: bool,
}

impl Cli {
    pub fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            run_address: self.run_address.clone(),
            database_uri: self.database_uri.clone(),
            accrual_address: self.accrual_address.clone(),
            jwt_secret: self.key.clone(),
            rows_per_cycle: self.rows_per_cycle,
        }
    }
}
