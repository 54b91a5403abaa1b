//! 内容审核领域模型

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ModerationError;

/// 被举报内容类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ContentType {
    /// 走失/寻宠启事
    Aviso,
    /// 宠物配对资料
    Petomatch,
    /// 用户账号
    User,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Aviso => "aviso",
            Self::Petomatch => "petomatch",
            Self::User => "user",
        }
    }
}

/// 审核操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModerationAction {
    Disable,
    Enable,
    Delete,
}

impl ModerationAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Disable => "disable",
            Self::Enable => "enable",
            Self::Delete => "delete",
        }
    }
}

/// 举报原因
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ReportReason {
    Spam,
    Inappropriate,
    Fake,
    Harassment,
    Scam,
    Other,
}

impl ReportReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spam => "spam",
            Self::Inappropriate => "inappropriate",
            Self::Fake => "fake",
            Self::Harassment => "harassment",
            Self::Scam => "scam",
            Self::Other => "other",
        }
    }
}

/// 举报处理状态
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum ReportStatus {
    #[default]
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

/// 启事状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum AvisoStatus {
    Active,
    Expired,
}

impl AvisoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Expired => "expired",
        }
    }
}

macro_rules! impl_tag_conversions {
    ($ty:ty, $label:literal) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ModerationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                serde_json::from_value(serde_json::Value::String(s.trim().to_string()))
                    .map_err(|_| ModerationError::Validation(format!("无效的{}: {s}", $label)))
            }
        }
    };
}

impl_tag_conversions!(ContentType, "内容类型");
impl_tag_conversions!(ModerationAction, "审核操作");
impl_tag_conversions!(ReportReason, "举报原因");
impl_tag_conversions!(ReportStatus, "举报状态");
impl_tag_conversions!(AvisoStatus, "启事状态");

/// 举报记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: Uuid,
    pub reporter_id: Uuid,
    pub content_type: ContentType,
    pub content_id: Uuid,
    pub reason: ReportReason,
    pub description: Option<String>,
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// 举报列表过滤条件
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportFilter {
    pub status: Option<ReportStatus>,
    pub content_type: Option<ContentType>,
}

impl ReportFilter {
    pub fn matches(&self, report: &Report) -> bool {
        self.status.is_none_or(|s| s == report.status)
            && self.content_type.is_none_or(|t| t == report.content_type)
    }
}

/// 写入举报记录的审核结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewUpdate {
    pub status: ReportStatus,
    /// 为 None 时保留原有备注
    pub admin_notes: Option<String>,
    pub reviewed_by: Option<Uuid>,
    pub reviewed_at: DateTime<Utc>,
}

/// 内容字段修改
///
/// 每种内容类型使用各自的字段名表示上下线
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "contentType", rename_all = "snake_case")]
pub enum ContentPatch {
    #[serde(rename_all = "camelCase")]
    Aviso { is_active: bool, status: AvisoStatus },
    #[serde(rename_all = "camelCase")]
    Petomatch { is_active: bool },
    /// 用户资料 (profiles)
    #[serde(rename = "user", rename_all = "camelCase")]
    Profile { is_active: bool, suspended: bool },
}

impl ContentPatch {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Aviso { .. } => ContentType::Aviso,
            Self::Petomatch { .. } => ContentType::Petomatch,
            Self::Profile { .. } => ContentType::User,
        }
    }
}

/// 可以物理删除的内容类型
///
/// 用户账号不在其中，类型上无法构造删除用户的操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletableContent {
    Aviso,
    Petomatch,
}

impl DeletableContent {
    pub fn content_type(&self) -> ContentType {
        match self {
            Self::Aviso => ContentType::Aviso,
            Self::Petomatch => ContentType::Petomatch,
        }
    }
}

/// 对内容存储执行的单次操作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "target", rename_all = "snake_case")]
pub enum ModerationOp {
    Update(ContentPatch),
    Delete(DeletableContent),
}

/// 根据内容类型与审核操作确定要执行的存储操作
///
/// 对用户执行删除等同于停用并封禁。
pub fn plan(content_type: ContentType, action: ModerationAction) -> ModerationOp {
    use ModerationAction::*;

    match (content_type, action) {
        (ContentType::Aviso, Disable) => ModerationOp::Update(ContentPatch::Aviso {
            is_active: false,
            status: AvisoStatus::Expired,
        }),
        (ContentType::Aviso, Enable) => ModerationOp::Update(ContentPatch::Aviso {
            is_active: true,
            status: AvisoStatus::Active,
        }),
        (ContentType::Aviso, Delete) => ModerationOp::Delete(DeletableContent::Aviso),

        (ContentType::Petomatch, Disable) => {
            ModerationOp::Update(ContentPatch::Petomatch { is_active: false })
        }
        (ContentType::Petomatch, Enable) => {
            ModerationOp::Update(ContentPatch::Petomatch { is_active: true })
        }
        (ContentType::Petomatch, Delete) => ModerationOp::Delete(DeletableContent::Petomatch),

        (ContentType::User, Disable | Delete) => ModerationOp::Update(ContentPatch::Profile {
            is_active: false,
            suspended: true,
        }),
        (ContentType::User, Enable) => ModerationOp::Update(ContentPatch::Profile {
            is_active: true,
            suspended: false,
        }),
    }
}
