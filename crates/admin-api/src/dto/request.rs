//! 管理后台请求 DTO 定义
//!
//! 渠道、受众等标签以字符串接收并在此解析为封闭枚举，
//! 解析失败统一以 400 返回。

use chrono::{DateTime, Utc};
use moderation::models::{ContentType, ModerationAction, ReportFilter, ReportStatus};
use notification_pipeline::models::{
    Channel, CreateNotification, NotificationPatch, NotificationType, TargetAudience,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::error::AdminError;

/// 创建通知请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotificationRequest {
    #[validate(length(min = 1, max = 200, message = "标题长度必须在1-200个字符之间"))]
    pub title: String,
    #[validate(length(min = 1, max = 5000, message = "内容长度必须在1-5000个字符之间"))]
    pub message: String,
    pub notification_type: Option<String>,
    pub channel: String,
    pub target_audience: String,
    pub recipients: Option<Vec<String>>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl CreateNotificationRequest {
    pub fn into_input(self) -> Result<CreateNotification, AdminError> {
        Ok(CreateNotification {
            title: self.title,
            message: self.message,
            notification_type: self
                .notification_type
                .as_deref()
                .map(str::parse::<NotificationType>)
                .transpose()?
                .unwrap_or_default(),
            channel: self.channel.parse::<Channel>()?,
            target_audience: self.target_audience.parse::<TargetAudience>()?,
            recipients: self.recipients,
            scheduled_for: self.scheduled_for,
        })
    }
}

/// 修改草稿请求
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateNotificationRequest {
    #[validate(length(min = 1, max = 200, message = "标题长度必须在1-200个字符之间"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 5000, message = "内容长度必须在1-5000个字符之间"))]
    pub message: Option<String>,
    pub notification_type: Option<String>,
    pub channel: Option<String>,
    pub target_audience: Option<String>,
    pub recipients: Option<Vec<String>>,
}

impl UpdateNotificationRequest {
    pub fn into_patch(self) -> Result<NotificationPatch, AdminError> {
        Ok(NotificationPatch {
            title: self.title,
            message: self.message,
            notification_type: self
                .notification_type
                .as_deref()
                .map(str::parse::<NotificationType>)
                .transpose()?,
            channel: self.channel.as_deref().map(str::parse::<Channel>).transpose()?,
            target_audience: self
                .target_audience
                .as_deref()
                .map(str::parse::<TargetAudience>)
                .transpose()?,
            recipients: self.recipients,
        })
    }
}

/// 定时发送请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub scheduled_for: DateTime<Utc>,
}

/// 举报审核请求
#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReviewReportRequest {
    pub status: String,
    #[validate(length(max = 2000, message = "审核备注不能超过2000个字符"))]
    pub admin_notes: Option<String>,
    pub reviewer_id: Option<Uuid>,
}

impl ReviewReportRequest {
    pub fn status(&self) -> Result<ReportStatus, AdminError> {
        Ok(self.status.parse::<ReportStatus>()?)
    }
}

/// 内容审核操作请求
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerateRequest {
    pub action: String,
}

impl ModerateRequest {
    pub fn action(&self) -> Result<ModerationAction, AdminError> {
        Ok(self.action.parse::<ModerationAction>()?)
    }
}

/// 举报列表过滤参数
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportQuery {
    pub status: Option<String>,
    pub content_type: Option<String>,
}

impl ReportQuery {
    pub fn into_filter(self) -> Result<ReportFilter, AdminError> {
        Ok(ReportFilter {
            status: self.status.as_deref().map(str::parse::<ReportStatus>).transpose()?,
            content_type: self
                .content_type
                .as_deref()
                .map(str::parse::<ContentType>)
                .transpose()?,
        })
    }
}
