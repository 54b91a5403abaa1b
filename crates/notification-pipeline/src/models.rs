//! 通知领域模型
//!
//! 所有枚举都支持数据库（sqlx）和 JSON（serde）序列化，
//! 字符串标签在边界处解析为封闭枚举，内部一律穷尽匹配。

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::NotificationError;

/// 系统发件人
///
/// 系统发起的站内通知记录以该 ID 作为发送者，不对应任何真实用户。
pub const SYSTEM_SENDER_ID: Uuid = Uuid::nil();

/// 通知类型
///
/// 决定客户端展示的样式（图标、配色）
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum NotificationType {
    #[default]
    Info,
    Success,
    Warning,
    Error,
    /// 运营推广
    Promotional,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Promotional => "promotional",
        }
    }
}

/// 投递渠道
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum Channel {
    Email,
    /// 设备推送：本服务只负责写入逐人记录，实际推送由下游触发器完成
    Push,
    Sms,
    /// 站内信
    InApp,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Email, Channel::Push, Channel::Sms, Channel::InApp];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Push => "push",
            Self::Sms => "sms",
            Self::InApp => "in_app",
        }
    }
}

/// 目标受众
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum TargetAudience {
    All,
    Users,
    /// 持有有效会员的用户
    PremiumUsers,
    /// 显式指定的收件人列表（邮箱）
    Specific,
}

impl TargetAudience {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Users => "users",
            Self::PremiumUsers => "premium_users",
            Self::Specific => "specific",
        }
    }
}

/// 通知生命周期状态
///
/// ```text
/// draft --(schedule)--> scheduled --(send)--> sending --(ok)--> sent
/// draft --(send)------------------------------> sending --(fail)--> failed
/// scheduled --(cancel)--> draft
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum NotificationStatus {
    #[default]
    Draft,
    Scheduled,
    Sending,
    Sent,
    Failed,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Scheduled => "scheduled",
            Self::Sending => "sending",
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }

    /// 状态只能前进，唯一的回退是取消定时（scheduled -> draft）
    pub fn can_transition_to(self, next: Self) -> bool {
        use NotificationStatus::*;
        matches!(
            (self, next),
            (Draft, Scheduled)
                | (Draft, Sending)
                | (Scheduled, Sending)
                | (Scheduled, Draft)
                | (Sending, Sent)
                | (Sending, Failed)
        )
    }

    /// sent / failed 为终态，本设计不支持重新发送
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Sent | Self::Failed)
    }

    /// 仅草稿可编辑
    pub fn is_editable(self) -> bool {
        self == Self::Draft
    }
}

macro_rules! impl_tag_conversions {
    ($ty:ty, $err:expr) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = NotificationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(serde_json::Value::String(s.trim().to_string()))
                    .map_err(|_| $err(s.to_string()))
            }
        }
    };
}

impl_tag_conversions!(Channel, NotificationError::UnsupportedChannel);
impl_tag_conversions!(NotificationType, |v: String| {
    NotificationError::Validation(format!("无效的通知类型: {v}"))
});
impl_tag_conversions!(TargetAudience, |v: String| {
    NotificationError::Validation(format!("无效的目标受众: {v}"))
});
impl_tag_conversions!(NotificationStatus, |v: String| {
    NotificationError::Validation(format!("无效的通知状态: {v}"))
});

/// 通知记录
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub target_audience: TargetAudience,
    /// 仅当 target_audience = specific 时有意义
    pub recipients: Option<Vec<String>>,
    pub status: NotificationStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub sent_at: Option<DateTime<Utc>>,
    pub recipient_count: i64,
    pub open_count: i64,
    pub click_count: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Notification {
    /// 显式收件人列表，非 specific 受众一律视为空
    pub fn explicit_recipients(&self) -> &[String] {
        match self.target_audience {
            TargetAudience::Specific => self.recipients.as_deref().unwrap_or_default(),
            TargetAudience::All | TargetAudience::Users | TargetAudience::PremiumUsers => &[],
        }
    }
}

/// 待写入的新通知
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub target_audience: TargetAudience,
    pub recipients: Option<Vec<String>>,
    pub status: NotificationStatus,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// 管理员创建通知的输入
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNotification {
    pub title: String,
    pub message: String,
    #[serde(default)]
    pub notification_type: NotificationType,
    pub channel: Channel,
    pub target_audience: TargetAudience,
    #[serde(default)]
    pub recipients: Option<Vec<String>>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// 草稿内容修改
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPatch {
    pub title: Option<String>,
    pub message: Option<String>,
    pub notification_type: Option<NotificationType>,
    pub channel: Option<Channel>,
    pub target_audience: Option<TargetAudience>,
    pub recipients: Option<Vec<String>>,
}

impl NotificationPatch {
    /// 将修改应用到已有通知上（仅用于内存存储与校验）
    pub fn apply_to(&self, notification: &mut Notification) {
        if let Some(title) = &self.title {
            notification.title = title.clone();
        }
        if let Some(message) = &self.message {
            notification.message = message.clone();
        }
        if let Some(notification_type) = self.notification_type {
            notification.notification_type = notification_type;
        }
        if let Some(channel) = self.channel {
            notification.channel = channel;
        }
        if let Some(target_audience) = self.target_audience {
            notification.target_audience = target_audience;
        }
        if let Some(recipients) = &self.recipients {
            notification.recipients = Some(recipients.clone());
        }
        if notification.target_audience != TargetAudience::Specific {
            notification.recipients = None;
        }
    }
}

/// 投递统计
///
/// 每次发送结束后整体覆盖写入通知记录
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryStats {
    pub status: NotificationStatus,
    pub sent_at: Option<DateTime<Utc>>,
    /// 尝试投递的人数，而非确认送达的人数
    pub recipient_count: i64,
    pub open_count: i64,
    pub click_count: i64,
}

impl DeliveryStats {
    /// 发送成功：记录发送时间与尝试人数，打开/点击计数归零
    pub fn sent(recipient_count: usize, sent_at: DateTime<Utc>) -> Self {
        Self {
            status: NotificationStatus::Sent,
            sent_at: Some(sent_at),
            recipient_count: recipient_count as i64,
            open_count: 0,
            click_count: 0,
        }
    }

    /// 发送失败：不记录发送时间，不写入成功人数
    pub fn failed() -> Self {
        Self {
            status: NotificationStatus::Failed,
            sent_at: None,
            recipient_count: 0,
            open_count: 0,
            click_count: 0,
        }
    }
}

/// 收件人
///
/// 不单独持久化，每次发送时由受众解析器从用户资料计算。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    pub id: Uuid,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub push_token: Option<String>,
    pub notifications_enabled: bool,
}

impl Recipient {
    /// 该收件人在指定渠道上是否有可用的投递标识
    pub fn is_reachable_via(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => non_empty(self.email.as_deref()).is_some(),
            Channel::Sms => self.sms_destination().is_some(),
            Channel::Push => non_empty(self.push_token.as_deref()).is_some(),
            // 站内信以用户 ID 投递
            Channel::InApp => true,
        }
    }

    pub fn email_address(&self) -> Option<&str> {
        non_empty(self.email.as_deref())
    }

    /// 短信目标：优先手机号，缺失时回退为邮箱字符串
    pub fn sms_destination(&self) -> Option<&str> {
        non_empty(self.phone.as_deref()).or_else(|| non_empty(self.email.as_deref()))
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// 逐人站内通知记录
///
/// push 渠道同样写入该记录，由下游触发器消费后完成设备推送。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboxRecord {
    pub user_id: Uuid,
    pub sender_id: Uuid,
    pub notification_id: Uuid,
    pub title: String,
    pub message: String,
    pub notification_type: NotificationType,
    pub delivery: Channel,
    /// 同一通知、同一用户、同一渠道只对应一个键
    pub dedup_key: String,
    pub created_at: DateTime<Utc>,
}

impl InboxRecord {
    pub fn for_recipient(
        notification: &Notification,
        recipient: &Recipient,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: recipient.id,
            sender_id: SYSTEM_SENDER_ID,
            notification_id: notification.id,
            title: notification.title.clone(),
            message: notification.message.clone(),
            notification_type: notification.notification_type,
            delivery: notification.channel,
            dedup_key: dedup_key(notification.id, recipient.id, notification.channel),
            created_at: now,
        }
    }
}

/// 计算逐人记录的去重键
pub fn dedup_key(notification_id: Uuid, user_id: Uuid, channel: Channel) -> String {
    let digest = Sha256::digest(format!("{notification_id}:{user_id}:{}", channel.as_str()));
    format!("{:x}", digest)
}

/// 幂等写入结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created,
    /// 去重键已存在，未产生新记录
    AlreadyExists,
}
