//! 基于 reqwest 的计算系统客户端

use std::time::Duration;

use async_trait::async_trait;
use points_shared::config::AccrualConfig;
use points_shared::observability::metrics;
use points_shared::retry::{RetryAction, RetryPolicy, retry_with_policy};
use reqwest::{Client, StatusCode};
use tracing::{debug, instrument};

use super::{AccrualError, AccrualPayload, AccrualResolver};
use crate::models::AccrualReport;

/// 计算系统 HTTP 客户端
///
/// `GET {base_url}/api/orders/{order_id}`：
/// - 200 且响应可解析：立即返回
/// - 429：固定冷却后重试
/// - 其他状态码、网络错误或无法解析的响应：线性退避后重试
pub struct AccrualClient {
    client: Client,
    base_url: String,
    policy: RetryPolicy,
}

impl AccrualClient {
    pub fn new(config: &AccrualConfig) -> Result<Self, AccrualError> {
        let policy = RetryPolicy::linear(
            config.max_attempts,
            Duration::from_secs(config.backoff_step_seconds),
            Duration::from_secs(config.rate_limit_cooldown_seconds),
        );

        Self::with_policy(
            &config.base_url,
            policy,
            Duration::from_secs(config.request_timeout_seconds),
        )
    }

    pub fn with_policy(
        base_url: &str,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Result<Self, AccrualError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| AccrualError::Configuration(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            policy,
        })
    }

    fn order_url(&self, order_id: i64) -> String {
        format!("{}/api/orders/{}", self.base_url, order_id)
    }

    /// 单次请求
    async fn fetch_once(&self, order_id: i64, attempt: u32) -> Result<AccrualReport, AccrualError> {
        let response = self
            .client
            .get(self.order_url(order_id))
            .send()
            .await
            .map_err(|e| AccrualError::Transport(e.to_string()))?;

        match response.status() {
            StatusCode::OK => {}
            StatusCode::TOO_MANY_REQUESTS => return Err(AccrualError::RateLimited),
            other => return Err(AccrualError::UnexpectedStatus(other.as_u16())),
        }

        let payload = response
            .json::<AccrualPayload>()
            .await
            .map_err(|e| AccrualError::Decode(e.to_string()))?;

        let report = payload.into_report(order_id)?;
        debug!(order_id, attempt, status = ?report.status, accrual = report.accrual, "计算系统返回结论");
        Ok(report)
    }

    fn classify(err: &AccrualError) -> RetryAction {
        match err {
            AccrualError::RateLimited => RetryAction::Cooldown,
            AccrualError::Configuration(_) => RetryAction::Abort,
            _ => RetryAction::Retry,
        }
    }
}

#[async_trait]
impl AccrualResolver for AccrualClient {
    #[instrument(skip(self))]
    async fn resolve(&self, order_id: i64) -> Result<AccrualReport, AccrualError> {
        retry_with_policy(&self.policy, "accrual_resolve", Self::classify, |attempt| async move {
            let result = self.fetch_once(order_id, attempt).await;
            match &result {
                Ok(_) => metrics::record_accrual_request("ok"),
                Err(e) => metrics::record_accrual_request(e.outcome()),
            }
            result
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use axum::{
        Json, Router,
        extract::{Path, State},
        http::StatusCode as AxumStatus,
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::json;

    use crate::models::AccrualStatus;

    /// 计算系统桩：前 `failures` 次返回 `failure_status`，之后返回 `body`
    #[derive(Clone)]
    struct Stub {
        calls: Arc<AtomicU32>,
        failures: u32,
        failure_status: AxumStatus,
        body: serde_json::Value,
    }

    async fn stub_handler(State(stub): State<Stub>, Path(_order): Path<String>) -> Response {
        let n = stub.calls.fetch_add(1, Ordering::SeqCst);
        if n < stub.failures {
            return stub.failure_status.into_response();
        }
        Json(stub.body.clone()).into_response()
    }

    async fn spawn_stub(stub: Stub) -> String {
        let app = Router::new()
            .route("/api/orders/{order}", get(stub_handler))
            .with_state(stub);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn fast_client(base_url: &str) -> AccrualClient {
        let policy = RetryPolicy::linear(5, Duration::from_millis(1), Duration::from_millis(2));
        AccrualClient::with_policy(base_url, policy, Duration::from_secs(2)).unwrap()
    }

    fn stub(failures: u32, failure_status: AxumStatus, body: serde_json::Value) -> Stub {
        Stub {
            calls: Arc::new(AtomicU32::new(0)),
            failures,
            failure_status,
            body,
        }
    }

    #[tokio::test]
    async fn test_first_success_returns_immediately() {
        let stub = stub(
            0,
            AxumStatus::OK,
            json!({"order": "18", "status": "PROCESSED", "accrual": 500}),
        );
        let calls = stub.calls.clone();
        let client = fast_client(&spawn_stub(stub).await);

        let report = tokio_test::assert_ok!(client.resolve(18).await);

        assert_eq!(report.status, AccrualStatus::Processed);
        assert_eq!(report.accrual, 50000);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let stub = stub(
            2,
            AxumStatus::INTERNAL_SERVER_ERROR,
            json!({"order": "182", "status": "PROCESSING"}),
        );
        let calls = stub.calls.clone();
        let client = fast_client(&spawn_stub(stub).await);

        let report = client.resolve(182).await.unwrap();

        assert_eq!(report.status, AccrualStatus::Processing);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_rate_limited_exhausts_after_five_attempts() {
        let stub = stub(
            u32::MAX,
            AxumStatus::TOO_MANY_REQUESTS,
            json!({}),
        );
        let calls = stub.calls.clone();
        let client = fast_client(&spawn_stub(stub).await);

        let err = client.resolve(18).await.unwrap_err();

        assert_eq!(err, AccrualError::RateLimited);
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_mismatched_payload_is_retried_then_fails() {
        let stub = stub(
            0,
            AxumStatus::OK,
            json!({"order": "1826", "status": "PROCESSED", "accrual": 10}),
        );
        let calls = stub.calls.clone();
        let client = fast_client(&spawn_stub(stub).await);

        let err = client.resolve(18).await.unwrap_err();

        assert!(matches!(err, AccrualError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_unreachable_authority_is_transport_error() {
        // 绑定后立即释放端口，确保无人监听
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = fast_client(&format!("http://{}", addr));
        let err = client.resolve(18).await.unwrap_err();

        assert!(matches!(err, AccrualError::Transport(_)));
    }
}
