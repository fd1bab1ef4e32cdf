//! Prometheus 指标模块
//!
//! 基于 metrics crate 和 metrics-exporter-prometheus 实现指标收集与导出。
//! 指标通过独立的 HTTP 端口暴露，供 Prometheus 抓取。

use anyhow::Result;
use axum::{Router, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::OnceLock;
use tokio::net::TcpListener;
use tracing::{error, info};

use super::ObservabilityConfig;

/// 全局 Prometheus handle，用于渲染指标
static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics 资源守卫
pub struct MetricsHandle {
    server_handle: tokio::task::JoinHandle<()>,
}

impl MetricsHandle {
    /// 停止指标 HTTP 服务器
    pub fn shutdown(self) {
        self.server_handle.abort();
    }
}

/// 初始化 Prometheus 指标导出
///
/// 启动一个独立的 HTTP 服务器在指定端口暴露 `/metrics` 端点。
pub async fn init(config: &ObservabilityConfig) -> Result<MetricsHandle> {
    let handle = PrometheusBuilder::new().install_recorder()?;

    let _ = PROMETHEUS_HANDLE.set(handle.clone());

    register_common_metrics(&config.service_name);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.metrics_port));
    let server_handle = start_metrics_server(addr, handle).await?;

    Ok(MetricsHandle { server_handle })
}

/// 注册指标描述，出现在 /metrics 的 HELP 注释中
fn register_common_metrics(service_name: &str) {
    metrics::describe_counter!("http_requests_total", "Total number of HTTP requests");
    metrics::describe_histogram!(
        "http_request_duration_seconds",
        "HTTP request duration in seconds"
    );

    metrics::describe_counter!(
        "order_submissions_total",
        "Order number submissions by outcome"
    );
    metrics::describe_counter!("withdrawals_total", "Withdrawal requests by outcome");

    metrics::describe_counter!(
        "accrual_requests_total",
        "Requests sent to the accrual system by outcome"
    );
    metrics::describe_counter!(
        "reconciliation_cycles_total",
        "Reconciliation cycles by outcome"
    );
    metrics::describe_counter!(
        "reconciliation_orders_total",
        "Orders touched by reconciliation, by result"
    );
    metrics::describe_histogram!(
        "reconciliation_cycle_duration_seconds",
        "Reconciliation cycle duration in seconds"
    );
    metrics::describe_gauge!(
        "worker_last_run_timestamp_seconds",
        "Unix timestamp of the last finished worker run"
    );

    metrics::counter!("service_starts_total", "service" => service_name.to_string()).increment(1);
}

/// 启动指标 HTTP 服务器
async fn start_metrics_server(
    addr: SocketAddr,
    handle: PrometheusHandle,
) -> Result<tokio::task::JoinHandle<()>> {
    let app = Router::new()
        .route("/metrics", get(move || std::future::ready(handle.render())))
        .route("/health", get(|| async { "OK" }));

    let listener = TcpListener::bind(addr).await?;
    info!("Metrics server listening on {}", addr);

    let server_handle = tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(server_handle)
}

/// 获取全局 Prometheus handle（用于自定义渲染）
pub fn get_handle() -> Option<&'static PrometheusHandle> {
    PROMETHEUS_HANDLE.get()
}

// ============================================================================
// 指标记录函数
// ============================================================================

/// 记录 HTTP 请求
#[inline]
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let status_str = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str.clone()
    )
    .increment(1);

    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "path" => path.to_string(),
        "status" => status_str
    )
    .record(duration_secs);
}

/// 记录订单号提交结果（accepted / duplicate / conflict / invalid）
#[inline]
pub fn record_order_submission(outcome: &str) {
    metrics::counter!("order_submissions_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录提现结果（processed / insufficient_funds / rejected）
#[inline]
pub fn record_withdrawal(outcome: &str) {
    metrics::counter!("withdrawals_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录一次对 accrual 系统的请求
#[inline]
pub fn record_accrual_request(outcome: &str) {
    metrics::counter!("accrual_requests_total", "outcome" => outcome.to_string()).increment(1);
}

/// 记录一轮对账
#[inline]
pub fn record_reconciliation_cycle(
    outcome: &str,
    claimed: usize,
    applied: usize,
    unresolved: usize,
    duration_secs: f64,
) {
    metrics::counter!(
        "reconciliation_cycles_total",
        "outcome" => outcome.to_string()
    )
    .increment(1);

    metrics::counter!("reconciliation_orders_total", "result" => "claimed").increment(claimed as u64);
    metrics::counter!("reconciliation_orders_total", "result" => "applied").increment(applied as u64);
    metrics::counter!("reconciliation_orders_total", "result" => "unresolved")
        .increment(unresolved as u64);

    metrics::histogram!("reconciliation_cycle_duration_seconds").record(duration_secs);
}

/// 更新 Worker 最近一次完成运行的时间
#[inline]
pub fn set_worker_last_run(worker: &str) {
    metrics::gauge!(
        "worker_last_run_timestamp_seconds",
        "worker" => worker.to_string()
    )
    .set(chrono::Utc::now().timestamp() as f64);
}
