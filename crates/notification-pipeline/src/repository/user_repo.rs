//! 用户资料仓储

use async_trait::async_trait;
use petadmin_shared::error::Result;
use sqlx::PgPool;

use crate::models::Recipient;
use crate::store::UserDirectory;

pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for UserRepository {
    async fn list_users(&self) -> Result<Vec<Recipient>> {
        let users = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id, email, phone, push_token, notifications_enabled
            FROM profiles
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn list_premium_users(&self) -> Result<Vec<Recipient>> {
        let users = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT DISTINCT p.id, p.email, p.phone, p.push_token, p.notifications_enabled
            FROM profiles p
            JOIN memberships m ON m.user_id = p.id
            WHERE m.is_active = TRUE
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }

    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<Recipient>> {
        if emails.is_empty() {
            return Ok(vec![]);
        }

        let users = sqlx::query_as::<_, Recipient>(
            r#"
            SELECT id, email, phone, push_token, notifications_enabled
            FROM profiles
            WHERE LOWER(email) = ANY($1)
            "#,
        )
        .bind(emails)
        .fetch_all(&self.pool)
        .await?;

        Ok(users)
    }
}
