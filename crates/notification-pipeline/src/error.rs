//! 通知管道错误类型
//!
//! 区分状态机违规、渠道不支持、投递失败与存储错误，
//! 上层据此决定是拒绝操作还是将通知置为失败。

use thiserror::Error;
use uuid::Uuid;

use crate::models::{Channel, NotificationStatus};

#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("通知不存在: {0}")]
    NotFound(Uuid),

    #[error("不允许的状态变更: {from} -> {to}")]
    InvalidTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },

    #[error("通知当前状态为 {0}，仅草稿可编辑")]
    NotEditable(NotificationStatus),

    #[error("不支持的通知渠道: {0}")]
    UnsupportedChannel(String),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error("通知发送失败: 渠道={channel}, 原因={reason}")]
    TransportFailed { channel: Channel, reason: String },

    #[error(transparent)]
    Store(#[from] petadmin_shared::error::PlatformError),
}

/// 通知管道 Result 类型别名
pub type Result<T> = std::result::Result<T, NotificationError>;

impl NotificationError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOTIFICATION_NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_STATUS_TRANSITION",
            Self::NotEditable(_) => "NOTIFICATION_NOT_EDITABLE",
            Self::UnsupportedChannel(_) => "UNSUPPORTED_CHANNEL",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::TransportFailed { .. } => "TRANSPORT_FAILED",
            Self::Store(e) => e.code(),
        }
    }
}
