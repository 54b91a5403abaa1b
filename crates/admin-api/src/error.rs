//! 管理后台错误类型定义
//!
//! 将通知管道与内容审核的领域错误映射为 HTTP 状态码和统一错误响应

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use moderation::ModerationError;
use notification_pipeline::NotificationError;
use petadmin_shared::error::PlatformError;
use serde_json::json;

/// 管理后台错误类型
#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    // 验证错误
    #[error("参数验证失败: {0}")]
    Validation(String),
    #[error("不支持的通知渠道: {0}")]
    UnsupportedChannel(String),

    // 资源不存在
    #[error("通知不存在: {0}")]
    NotificationNotFound(uuid::Uuid),
    #[error("举报不存在: {0}")]
    ReportNotFound(uuid::Uuid),
    #[error("内容不存在: {0}")]
    ContentNotFound(String),
    #[error("资源不存在: {0}")]
    NotFound(String),

    // 业务错误
    #[error("{0}")]
    StateConflict(String),
    #[error("通知发送失败: {0}")]
    SendFailed(String),

    // 系统错误
    #[error("存储错误: {0}")]
    Store(String),
    #[error("外部服务错误: {0}")]
    Upstream(String),
}

impl AdminError {
    /// 返回对应的 HTTP 状态码
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::UnsupportedChannel(_) => StatusCode::BAD_REQUEST,

            Self::NotificationNotFound(_)
            | Self::ReportNotFound(_)
            | Self::ContentNotFound(_)
            | Self::NotFound(_) => StatusCode::NOT_FOUND,

            Self::StateConflict(_) => StatusCode::CONFLICT,
            Self::SendFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,

            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// 返回错误码（用于 API 响应）
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::UnsupportedChannel(_) => "UNSUPPORTED_CHANNEL",
            Self::NotificationNotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Self::ContentNotFound(_) => "CONTENT_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::StateConflict(_) => "STATE_CONFLICT",
            Self::SendFailed(_) => "SEND_FAILED",
            Self::Store(_) => "STORE_ERROR",
            Self::Upstream(_) => "UPSTREAM_ERROR",
        }
    }
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // 系统级错误只返回通用提示，详细信息仅记录日志
        let message = match &self {
            Self::Store(e) => {
                tracing::error!(error = %e, "存储操作失败");
                "服务内部错误，请稍后重试".to_string()
            }
            other => other.to_string(),
        };

        let body = json!({
            "success": false,
            "code": self.error_code(),
            "message": message,
            "data": serde_json::Value::Null
        });

        (status, axum::Json(body)).into_response()
    }
}

/// 从 validator 错误转换
impl From<validator::ValidationErrors> for AdminError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::Validation(errors.to_string())
    }
}

/// 存储层错误：记录缺失与参数校验映射为业务错误，其余一律视为系统错误
impl From<PlatformError> for AdminError {
    fn from(err: PlatformError) -> Self {
        match err {
            PlatformError::NotFound { .. } => Self::NotFound(err.to_string()),
            PlatformError::Validation(msg) => Self::Validation(msg),
            PlatformError::ExternalService { .. }
            | PlatformError::ExternalServiceUnavailable { .. }
            | PlatformError::ExternalServiceTimeout { .. } => Self::Upstream(err.to_string()),
            other => Self::Store(other.to_string()),
        }
    }
}

impl From<NotificationError> for AdminError {
    fn from(err: NotificationError) -> Self {
        match err {
            NotificationError::NotFound(id) => Self::NotificationNotFound(id),
            NotificationError::InvalidTransition { .. } | NotificationError::NotEditable(_) => {
                Self::StateConflict(err.to_string())
            }
            NotificationError::UnsupportedChannel(channel) => Self::UnsupportedChannel(channel),
            NotificationError::Validation(msg) => Self::Validation(msg),
            NotificationError::TransportFailed { .. } => Self::Upstream(err.to_string()),
            NotificationError::Store(e) => e.into(),
        }
    }
}

impl From<ModerationError> for AdminError {
    fn from(err: ModerationError) -> Self {
        match err {
            ModerationError::ReportNotFound(id) => Self::ReportNotFound(id),
            ModerationError::ContentNotFound { .. } => Self::ContentNotFound(err.to_string()),
            ModerationError::InvalidReviewStatus(_) | ModerationError::Validation(_) => {
                Self::Validation(err.to_string())
            }
            ModerationError::Store(e) => e.into(),
        }
    }
}

/// 服务层 Result 类型别名
pub type Result<T> = std::result::Result<T, AdminError>;
