//! 举报仓储

use async_trait::async_trait;
use petadmin_shared::error::Result;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Report, ReportFilter, ReviewUpdate};
use crate::store::ReportStore;

pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let reports = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, reporter_id, content_type, content_id, reason, description,
                   status, admin_notes, reviewed_by, reviewed_at, created_at
            FROM reports
            WHERE ($1::varchar IS NULL OR status = $1)
              AND ($2::varchar IS NULL OR content_type = $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(filter.status)
        .bind(filter.content_type)
        .fetch_all(&self.pool)
        .await?;

        Ok(reports)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(
            r#"
            SELECT id, reporter_id, content_type, content_id, reason, description,
                   status, admin_notes, reviewed_by, reviewed_at, created_at
            FROM reports
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(report)
    }

    async fn update_review(&self, id: Uuid, review: &ReviewUpdate) -> Result<Option<Report>> {
        let report = sqlx::query_as::<_, Report>(
            r#"
            UPDATE reports
            SET status = $2,
                admin_notes = COALESCE($3, admin_notes),
                reviewed_by = $4,
                reviewed_at = $5
            WHERE id = $1
            RETURNING id, reporter_id, content_type, content_id, reason, description,
                      status, admin_notes, reviewed_by, reviewed_at, created_at
            "#,
        )
        .bind(id)
        .bind(review.status)
        .bind(&review.admin_notes)
        .bind(review.reviewed_by)
        .bind(review.reviewed_at)
        .fetch_optional(&self.pool)
        .await?;

        Ok(report)
    }
}
