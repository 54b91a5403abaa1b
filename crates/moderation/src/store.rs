//! 审核相关记录存储 Trait 定义

use async_trait::async_trait;
use petadmin_shared::error::Result;
use uuid::Uuid;

use crate::models::{ContentPatch, DeletableContent, Report, ReportFilter, ReviewUpdate};

/// 被举报内容存储
///
/// 每次审核操作只调用其中一个方法一次
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// 返回是否有记录被更新
    async fn update_content(&self, id: Uuid, patch: &ContentPatch) -> Result<bool>;

    /// 返回是否有记录被删除
    async fn delete_content(&self, target: DeletableContent, id: Uuid) -> Result<bool>;
}

/// 举报记录存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>>;
    async fn get(&self, id: Uuid) -> Result<Option<Report>>;
    async fn update_review(&self, id: Uuid, review: &ReviewUpdate) -> Result<Option<Report>>;
}
