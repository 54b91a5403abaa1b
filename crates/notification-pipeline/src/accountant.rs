//! 投递统计
//!
//! 分发前将通知置为 sending，分发后依据结果写入终态与计数。
//! 打开/点击计数只做自增，不按用户去重，也不以 recipient_count 为上限。

use std::sync::Arc;

use chrono::Utc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dispatcher::DispatchResult;
use crate::error::{NotificationError, Result};
use crate::models::{DeliveryStats, Notification, NotificationStatus};
use crate::store::NotificationStore;

pub struct DeliveryAccountant {
    store: Arc<dyn NotificationStore>,
}

impl DeliveryAccountant {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// 进入 sending 状态
    #[instrument(
        skip(self, notification),
        fields(notification_id = %notification.id, from = %notification.status)
    )]
    pub async fn begin(&self, notification: &Notification) -> Result<()> {
        let next = NotificationStatus::Sending;
        if !notification.status.can_transition_to(next) {
            return Err(NotificationError::InvalidTransition {
                from: notification.status,
                to: next,
            });
        }

        self.store.update_status(notification.id, next).await?;
        Ok(())
    }

    /// 写入分发结果，返回写入的统计
    ///
    /// 成功时 recipient_count 为尝试人数，失败时不记录发送时间与人数。
    #[instrument(
        skip(self, result),
        fields(success = result.success, attempted = result.attempted)
    )]
    pub async fn finalize(&self, id: Uuid, result: &DispatchResult) -> Result<DeliveryStats> {
        let stats = if result.success {
            DeliveryStats::sent(result.attempted, Utc::now())
        } else {
            DeliveryStats::failed()
        };

        self.store.record_delivery(id, &stats).await?;
        info!(
            notification_id = %id,
            status = %stats.status,
            recipient_count = stats.recipient_count,
            "投递统计已更新"
        );
        Ok(stats)
    }

    /// 强制置为 failed，不校验当前状态
    pub async fn mark_failed(&self, id: Uuid) -> Result<()> {
        warn!(notification_id = %id, "通知强制置为失败");
        self.store.record_delivery(id, &DeliveryStats::failed()).await?;
        Ok(())
    }

    pub async fn track_open(&self, id: Uuid) -> Result<i64> {
        Ok(self.store.increment_open_count(id).await?)
    }

    pub async fn track_click(&self, id: Uuid) -> Result<i64> {
        Ok(self.store.increment_click_count(id).await?)
    }
}
