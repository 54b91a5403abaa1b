//! 外部投递服务
//!
//! 邮件与短信通过外部服务批量发送：一次调用携带全部收件人。
//! `LoggingTransport` 为模拟实现（仅记录日志），用于本地开发与管道验证；
//! `HttpTransport` 调用真实的 HTTP 投递接口。

use std::time::Duration;

use async_trait::async_trait;
use petadmin_shared::error::{PlatformError, Result};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

/// 投递服务回执
///
/// `success = false` 表示服务明确拒绝了本批次，不做重试。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportReceipt {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

fn default_success() -> bool {
    true
}

impl TransportReceipt {
    pub fn accepted(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: Some(message.into()),
        }
    }
}

/// 邮件批量发送
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_batch(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<TransportReceipt>;
}

/// 短信批量发送
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SmsTransport: Send + Sync {
    async fn send_batch(&self, recipients: &[String], text: &str) -> Result<TransportReceipt>;
}

// ---------------------------------------------------------------------------
// 模拟发送
// ---------------------------------------------------------------------------

/// 模拟投递服务
///
/// 不发起任何网络调用，始终受理
#[derive(Debug, Default, Clone)]
pub struct LoggingTransport;

#[async_trait]
impl EmailTransport for LoggingTransport {
    async fn send_batch(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<TransportReceipt> {
        let batch_id = Uuid::now_v7().to_string();

        info!(
            channel = "email",
            batch_id = %batch_id,
            recipients = recipients.len(),
            subject = %subject,
            body_len = body.len(),
            "模拟发送邮件批次"
        );

        Ok(TransportReceipt::accepted(batch_id))
    }
}

#[async_trait]
impl SmsTransport for LoggingTransport {
    async fn send_batch(&self, recipients: &[String], text: &str) -> Result<TransportReceipt> {
        let batch_id = Uuid::now_v7().to_string();

        info!(
            channel = "sms",
            batch_id = %batch_id,
            recipients = recipients.len(),
            text_len = text.len(),
            "模拟发送短信批次"
        );

        Ok(TransportReceipt::accepted(batch_id))
    }
}

// ---------------------------------------------------------------------------
// HTTP 投递
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct BatchPayload<'a> {
    recipients: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    subject: Option<&'a str>,
    body: &'a str,
}

/// 基于 HTTP 的投递服务客户端
///
/// 每个渠道一个实例，POST JSON 批次到配置的端点。
pub struct HttpTransport {
    service: &'static str,
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(
        service: &'static str,
        endpoint: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PlatformError::Config(format!("无法创建 {service} 投递客户端: {e}")))?;

        Ok(Self {
            service,
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    async fn post(&self, payload: &BatchPayload<'_>) -> Result<TransportReceipt> {
        let mut request = self.client.post(&self.endpoint).json(payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_request_error(self.service, e))?;

        let status = response.status();
        debug!(service = self.service, status = %status, "投递服务已响应");

        if let Some(err) = classify_status(self.service, status) {
            return Err(err);
        }

        response
            .json::<TransportReceipt>()
            .await
            .map_err(|e| PlatformError::ExternalService {
                service: self.service.to_string(),
                message: format!("无法解析投递回执: {e}"),
            })
    }
}

#[async_trait]
impl EmailTransport for HttpTransport {
    async fn send_batch(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<TransportReceipt> {
        self.post(&BatchPayload {
            recipients,
            subject: Some(subject),
            body,
        })
        .await
    }
}

#[async_trait]
impl SmsTransport for HttpTransport {
    async fn send_batch(&self, recipients: &[String], text: &str) -> Result<TransportReceipt> {
        self.post(&BatchPayload {
            recipients,
            subject: None,
            body: text,
        })
        .await
    }
}

/// 网络层错误：超时与连接失败视为瞬时故障
fn map_request_error(service: &str, e: reqwest::Error) -> PlatformError {
    if e.is_timeout() {
        PlatformError::ExternalServiceTimeout {
            service: service.to_string(),
        }
    } else if e.is_connect() {
        PlatformError::ExternalServiceUnavailable {
            service: service.to_string(),
            message: e.to_string(),
        }
    } else {
        PlatformError::ExternalService {
            service: service.to_string(),
            message: e.to_string(),
        }
    }
}

/// 5xx / 429 可重试，其余非 2xx 状态直接失败
fn classify_status(service: &str, status: StatusCode) -> Option<PlatformError> {
    if status.is_success() {
        return None;
    }

    let message = format!("HTTP {status}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        Some(PlatformError::ExternalServiceUnavailable {
            service: service.to_string(),
            message,
        })
    } else {
        Some(PlatformError::ExternalService {
            service: service.to_string(),
            message,
        })
    }
}
