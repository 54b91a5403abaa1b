//! 举报处理服务
//!
//! 审核结论与内容操作是两个独立的操作：`review` 只修改举报记录，
//! `moderate` 只作用于被举报内容。

use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::dispatcher::ModerationDispatcher;
use crate::error::{ModerationError, Result};
use crate::models::{
    ContentType, ModerationAction, ModerationOp, Report, ReportFilter, ReportStatus, ReviewUpdate,
};
use crate::store::{ContentStore, ReportStore};

/// 审核结论
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewDecision {
    pub status: ReportStatus,
    pub admin_notes: Option<String>,
    pub reviewer_id: Option<Uuid>,
}

/// 内容操作结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModerationOutcome {
    pub report_id: Uuid,
    pub content_type: ContentType,
    pub content_id: Uuid,
    pub action: ModerationAction,
    pub operation: ModerationOp,
}

pub struct ReportService {
    reports: Arc<dyn ReportStore>,
    dispatcher: ModerationDispatcher,
}

impl ReportService {
    pub fn new(reports: Arc<dyn ReportStore>, content: Arc<dyn ContentStore>) -> Self {
        Self {
            reports,
            dispatcher: ModerationDispatcher::new(content),
        }
    }

    pub async fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        Ok(self.reports.list(filter).await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Report> {
        self.reports
            .get(id)
            .await?
            .ok_or(ModerationError::ReportNotFound(id))
    }

    /// 记录审核结论并写入审核时间
    #[instrument(skip(self, decision), fields(report_id = %id, status = %decision.status))]
    pub async fn review(&self, id: Uuid, decision: ReviewDecision) -> Result<Report> {
        if decision.status == ReportStatus::Pending {
            return Err(ModerationError::InvalidReviewStatus(ReportStatus::Pending));
        }

        let admin_notes = decision
            .admin_notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        let report = self
            .reports
            .update_review(
                id,
                &ReviewUpdate {
                    status: decision.status,
                    admin_notes,
                    reviewed_by: decision.reviewer_id,
                    reviewed_at: Utc::now(),
                },
            )
            .await?
            .ok_or(ModerationError::ReportNotFound(id))?;

        info!("举报已审核");
        Ok(report)
    }

    /// 对举报指向的内容执行审核操作
    #[instrument(skip(self), fields(report_id = %report_id, action = %action))]
    pub async fn moderate(
        &self,
        report_id: Uuid,
        action: ModerationAction,
    ) -> Result<ModerationOutcome> {
        let report = self.get(report_id).await?;
        let operation = self
            .dispatcher
            .apply(report.content_type, report.content_id, action)
            .await?;

        Ok(ModerationOutcome {
            report_id,
            content_type: report.content_type,
            content_id: report.content_id,
            action,
            operation,
        })
    }
}
