//! 积分账本服务
//!
//! 用户注册登录、提交订单号、查询余额与提现，并由后台 Worker 定期向
//! 积分计算系统对账，把计算结果写回账本。
//!
//! ## 模块结构
//!
//! - `accrual`: 积分计算系统 HTTP 客户端（带重试与限流冷却）
//! - `repository`: 账本与用户仓储，对账批次的领取与写回
//! - `worker`: 定时对账 Worker
//! - `service`: 订单提交、提现与账户服务
//! - `handlers` / `routes`: HTTP 接口
//! - `validation`: 订单号 Luhn 校验与金额换算
//!
//! ## 一致性约束
//!
//! 用户余额缓存列始终等于其 PROCESSED 账本记录之和：所有改变余额的写入
//! 都与对应账本写入在同一事务中完成。

pub mod accrual;
pub mod auth;
pub mod cli;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod service;
pub mod state;
pub mod validation;
pub mod worker;

pub use error::{LedgerError, Result};
pub use validation::{OrderNumber, ValidationError};
