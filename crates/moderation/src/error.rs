//! 内容审核错误类型

use thiserror::Error;
use uuid::Uuid;

use crate::models::{ContentType, ReportStatus};

#[derive(Debug, Error)]
pub enum ModerationError {
    #[error("举报不存在: {0}")]
    ReportNotFound(Uuid),

    #[error("被举报内容不存在: {content_type} id={id}")]
    ContentNotFound { content_type: ContentType, id: Uuid },

    #[error("举报不能改回 {0} 状态")]
    InvalidReviewStatus(ReportStatus),

    #[error("参数验证失败: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] petadmin_shared::error::PlatformError),
}

pub type Result<T> = std::result::Result<T, ModerationError>;

impl ModerationError {
    /// 获取错误码
    pub fn code(&self) -> &'static str {
        match self {
            Self::ReportNotFound(_) => "REPORT_NOT_FOUND",
            Self::ContentNotFound { .. } => "CONTENT_NOT_FOUND",
            Self::InvalidReviewStatus(_) => "INVALID_REVIEW_STATUS",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Store(e) => e.code(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let id = Uuid::nil();
        let err = ModerationError::ContentNotFound {
            content_type: ContentType::Petomatch,
            id,
        };
        assert_eq!(
            err.to_string(),
            "被举报内容不存在: petomatch id=00000000-0000-0000-0000-000000000000"
        );
        assert_eq!(err.code(), "CONTENT_NOT_FOUND");

        let back = ModerationError::InvalidReviewStatus(ReportStatus::Pending);
        assert_eq!(back.to_string(), "举报不能改回 pending 状态");
    }
}
