//! 积分账本服务入口

use std::sync::Arc;

use clap::Parser;
use points_ledger::{
    accrual::AccrualClient, cli::Cli, repository::PgReconciliationStore, routes,
    state::AppState, worker::ReconciliationWorker,
};
use points_shared::{
    config::{AppConfig, ConfigOverrides},
    database::Database,
    observability,
};
use sqlx::migrate::Migrator;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

const SERVICE_NAME: &str = "points-ledger-service";

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // 配置优先级：配置文件 < POINTS__ 环境变量 < 命令行 < 历史环境变量
    let mut config = AppConfig::load(SERVICE_NAME)?;
    cli.overrides().apply(&mut config)?;
    ConfigOverrides::from_legacy_env()?.apply(&mut config)?;
    if cli.debug {
        config.observability.log_level = "debug".to_string();
    }
    config.validate()?;

    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    info!("Starting {} on {}", SERVICE_NAME, config.server_addr());

    let db = Database::connect(&config.database).await?;
    if let Err(e) = db.run_migrations(&MIGRATOR).await {
        error!(code = e.code(), error = %e, "数据库迁移失败");
        return Err(e.into());
    }

    // 对账 Worker 通过 watch channel 接收停机信号
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_handle = if config.worker.enabled {
        let store = Arc::new(PgReconciliationStore::new(db.pool().clone()));
        let resolver = Arc::new(AccrualClient::new(&config.accrual)?);
        let worker = ReconciliationWorker::new(store, resolver, &config.worker);
        info!(accrual = %config.accrual.base_url, "对账 Worker 已启用");
        Some(tokio::spawn(worker.run(shutdown_rx)))
    } else {
        warn!("对账 Worker 已禁用，订单状态不会更新");
        None
    };

    let app = routes::build_router(AppState::new(db.clone(), &config));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // 正在进行的对账批次会回滚，行锁随事务释放
    let _ = shutdown_tx.send(true);
    if let Some(handle) = worker_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "对账 Worker 异常退出");
        }
    }

    db.close().await;
    info!("Server shutdown complete");

    Ok(())
}

/// 监听关闭信号
///
/// 收到 SIGTERM 或 Ctrl+C 后返回，触发 axum 的优雅关闭流程。
/// 信号处理器注册失败时只记录错误，对应的信号源不再参与等待。
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "注册 Ctrl+C 处理器失败");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!(error = %e, "注册 SIGTERM 处理器失败");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown..."),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown..."),
    }
}
