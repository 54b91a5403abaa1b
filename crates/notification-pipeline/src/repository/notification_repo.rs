//! 通知仓储

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use petadmin_shared::error::{PlatformError, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{
    DeliveryStats, NewNotification, Notification, NotificationPatch, NotificationStatus,
};
use crate::store::NotificationStore;

const COLUMNS: &str = r#"
    id, title, message, notification_type, channel, target_audience, recipients,
    status, scheduled_for, sent_at, recipient_count, open_count, click_count,
    created_at, updated_at
"#;

pub struct NotificationRepository {
    pool: PgPool,
}

impl NotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn ensure_affected(id: Uuid, rows: u64) -> Result<()> {
        if rows == 0 {
            return Err(PlatformError::not_found("Notification", id));
        }
        Ok(())
    }
}

#[async_trait]
impl NotificationStore for NotificationRepository {
    async fn list(&self) -> Result<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {COLUMNS} FROM notifications ORDER BY created_at DESC"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(notifications)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {COLUMNS} FROM notifications WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn create(&self, new: &NewNotification) -> Result<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications
                (title, message, notification_type, channel, target_audience, recipients,
                 status, scheduled_for)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {COLUMNS}
            "#
        ))
        .bind(&new.title)
        .bind(&new.message)
        .bind(new.notification_type)
        .bind(new.channel)
        .bind(new.target_audience)
        .bind(&new.recipients)
        .bind(new.status)
        .bind(new.scheduled_for)
        .fetch_one(&self.pool)
        .await?;

        Ok(notification)
    }

    async fn update_content(&self, id: Uuid, patch: &NotificationPatch) -> Result<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET
                title = COALESCE($2, title),
                message = COALESCE($3, message),
                notification_type = COALESCE($4, notification_type),
                channel = COALESCE($5, channel),
                target_audience = COALESCE($6, target_audience),
                recipients = CASE
                    WHEN COALESCE($6, target_audience) = 'specific' THEN COALESCE($7, recipients)
                    ELSE NULL
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {COLUMNS}
            "#
        ))
        .bind(id)
        .bind(&patch.title)
        .bind(&patch.message)
        .bind(patch.notification_type)
        .bind(patch.channel)
        .bind(patch.target_audience)
        .bind(&patch.recipients)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PlatformError::not_found("Notification", id))
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        status: NotificationStatus,
        scheduled_for: Option<DateTime<Utc>>,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2, scheduled_for = $3, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(scheduled_for)
        .execute(&self.pool)
        .await?;

        Self::ensure_affected(id, result.rows_affected())
    }

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<()> {
        let result = sqlx::query(
            "UPDATE notifications SET status = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(&self.pool)
        .await?;

        Self::ensure_affected(id, result.rows_affected())
    }

    async fn record_delivery(&self, id: Uuid, stats: &DeliveryStats) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE notifications
            SET status = $2,
                sent_at = $3,
                recipient_count = $4,
                open_count = $5,
                click_count = $6,
                updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(stats.status)
        .bind(stats.sent_at)
        .bind(stats.recipient_count)
        .bind(stats.open_count)
        .bind(stats.click_count)
        .execute(&self.pool)
        .await?;

        Self::ensure_affected(id, result.rows_affected())
    }

    async fn increment_open_count(&self, id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE notifications
            SET open_count = open_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING open_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PlatformError::not_found("Notification", id))
    }

    async fn increment_click_count(&self, id: Uuid) -> Result<i64> {
        sqlx::query_scalar::<_, i64>(
            r#"
            UPDATE notifications
            SET click_count = click_count + 1, updated_at = NOW()
            WHERE id = $1
            RETURNING click_count
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| PlatformError::not_found("Notification", id))
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM notifications WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
