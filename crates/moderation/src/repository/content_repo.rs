//! 被举报内容仓储
//!
//! 启事 (avisos)、宠物配对 (petomatch)、用户资料 (profiles) 三张表

use async_trait::async_trait;
use petadmin_shared::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{ContentPatch, DeletableContent};
use crate::store::ContentStore;

pub struct ContentRepository {
    pool: PgPool,
}

impl ContentRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ContentStore for ContentRepository {
    async fn update_content(&self, id: Uuid, patch: &ContentPatch) -> Result<bool> {
        let result = match *patch {
            ContentPatch::Aviso { is_active, status } => {
                sqlx::query(
                    r#"
                    UPDATE avisos
                    SET is_active = $2, status = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(is_active)
                .bind(status)
                .execute(&self.pool)
                .await?
            }
            ContentPatch::Petomatch { is_active } => {
                sqlx::query("UPDATE petomatch SET is_active = $2, updated_at = NOW() WHERE id = $1")
                    .bind(id)
                    .bind(is_active)
                    .execute(&self.pool)
                    .await?
            }
            ContentPatch::Profile {
                is_active,
                suspended,
            } => {
                sqlx::query(
                    r#"
                    UPDATE profiles
                    SET is_active = $2, suspended = $3, updated_at = NOW()
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(is_active)
                .bind(suspended)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    async fn delete_content(&self, target: DeletableContent, id: Uuid) -> Result<bool> {
        let sql = match target {
            DeletableContent::Aviso => "DELETE FROM avisos WHERE id = $1",
            DeletableContent::Petomatch => "DELETE FROM petomatch WHERE id = $1",
        };

        let result = sqlx::query(sql).bind(id).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }
}
