//! 记录存储 Trait 定义
//!
//! 管道只依赖这些抽象，生产环境由 PostgreSQL 仓储实现，测试中使用 mock 或内存实现。
//! 存储层不提供事务与分页，通知记录的读改写不加锁（后写覆盖）。

use async_trait::async_trait;
use petadmin_shared::error::Result;
use uuid::Uuid;

use crate::models::{
    DeliveryStats, InboxRecord, InsertOutcome, NewNotification, Notification, NotificationPatch,
    NotificationStatus, Recipient,
};

/// 通知记录存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn list(&self) -> Result<Vec<Notification>>;
    async fn get(&self, id: Uuid) -> Result<Option<Notification>>;
    async fn create(&self, notification: &NewNotification) -> Result<Notification>;
    async fn update_content(&self, id: Uuid, patch: &NotificationPatch) -> Result<Notification>;

    /// 更新状态与定时时间（scheduled_for 为 None 时清空）
    async fn update_schedule(
        &self,
        id: Uuid,
        status: NotificationStatus,
        scheduled_for: Option<chrono::DateTime<chrono::Utc>>,
    ) -> Result<()>;

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<()>;

    /// 整体覆盖投递统计（状态、发送时间、各计数）
    async fn record_delivery(&self, id: Uuid, stats: &DeliveryStats) -> Result<()>;

    /// 打开数 +1，返回更新后的值
    async fn increment_open_count(&self, id: Uuid) -> Result<i64>;

    /// 点击数 +1，返回更新后的值
    async fn increment_click_count(&self, id: Uuid) -> Result<i64>;

    /// 返回是否确有记录被删除
    async fn delete(&self, id: Uuid) -> Result<bool>;
}

/// 用户资料目录
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn list_users(&self) -> Result<Vec<Recipient>>;

    /// 持有有效会员的用户
    async fn list_premium_users(&self) -> Result<Vec<Recipient>>;

    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<Recipient>>;
}

/// 逐人站内通知记录存储
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait InboxStore: Send + Sync {
    /// 按去重键幂等写入
    async fn insert_if_absent(&self, record: &InboxRecord) -> Result<InsertOutcome>;
}
