//! 逐人通知记录仓储
//!
//! 写入以 dedup_key 唯一约束保证幂等，重复分发不会产生第二条记录，
//! 也就不会再次触发下游推送。

use async_trait::async_trait;
use petadmin_shared::error::Result;
use sqlx::PgPool;
use tracing::debug;
use uuid::Uuid;

use crate::models::{InboxRecord, InsertOutcome};
use crate::store::InboxStore;

pub struct InboxRepository {
    pool: PgPool,
}

impl InboxRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl InboxStore for InboxRepository {
    async fn insert_if_absent(&self, record: &InboxRecord) -> Result<InsertOutcome> {
        let inserted = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO user_notifications
                (user_id, sender_id, notification_id, title, message,
                 notification_type, delivery, dedup_key, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (dedup_key) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(record.user_id)
        .bind(record.sender_id)
        .bind(record.notification_id)
        .bind(&record.title)
        .bind(&record.message)
        .bind(record.notification_type)
        .bind(record.delivery)
        .bind(&record.dedup_key)
        .bind(record.created_at)
        .fetch_optional(&self.pool)
        .await?;

        match inserted {
            Some(id) => {
                debug!(record_id = %id, user_id = %record.user_id, "逐人记录已写入");
                Ok(InsertOutcome::Created)
            }
            None => Ok(InsertOutcome::AlreadyExists),
        }
    }
}
