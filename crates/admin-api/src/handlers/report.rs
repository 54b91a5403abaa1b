//! 举报处理 API 处理器

use axum::{
    Json,
    extract::{Path, Query, State},
};
use moderation::models::Report;
use moderation::{ModerationOutcome, ReviewDecision};
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{ApiResponse, ModerateRequest, ReportQuery, ReviewReportRequest},
    error::AdminError,
    state::AppState,
};

/// 获取举报列表
///
/// GET /api/admin/reports?status=pending&contentType=aviso
pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ReportQuery>,
) -> Result<Json<ApiResponse<Vec<Report>>>, AdminError> {
    let reports = state.reports.list(&query.into_filter()?).await?;
    Ok(Json(ApiResponse::success(reports)))
}

/// 获取举报详情
///
/// GET /api/admin/reports/{id}
pub async fn get_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Report>>, AdminError> {
    let report = state.reports.get(id).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// 记录审核结论
///
/// PATCH /api/admin/reports/{id}/review
pub async fn review_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ReviewReportRequest>,
) -> Result<Json<ApiResponse<Report>>, AdminError> {
    req.validate()?;

    let decision = ReviewDecision {
        status: req.status()?,
        admin_notes: req.admin_notes,
        reviewer_id: req.reviewer_id,
    };
    let report = state.reports.review(id, decision).await?;
    Ok(Json(ApiResponse::success(report)))
}

/// 对被举报内容执行停用、启用或删除
///
/// POST /api/admin/reports/{id}/moderate
pub async fn moderate_report(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ModerateRequest>,
) -> Result<Json<ApiResponse<ModerationOutcome>>, AdminError> {
    let action = req.action()?;
    let outcome = state.reports.moderate(id, action).await?;
    info!(
        report_id = %id,
        content_id = %outcome.content_id,
        action = %action,
        "Report content moderated"
    );
    Ok(Json(ApiResponse::success(outcome)))
}
