//! 通知管理 API 处理器
//!
//! 草稿的增删改、定时、发送与打开/点击统计

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use notification_pipeline::SendOutcome;
use notification_pipeline::models::Notification;
use notification_pipeline::service::EngagementCount;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

use crate::{
    dto::{
        ApiResponse, CreateNotificationRequest, DeletedResponse, ScheduleRequest, SendResponse,
        UpdateNotificationRequest,
    },
    error::AdminError,
    state::AppState,
};

/// 获取通知列表
///
/// GET /api/admin/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<Notification>>>, AdminError> {
    let notifications = state.notifications.list().await?;
    Ok(Json(ApiResponse::success(notifications)))
}

/// 获取通知详情
///
/// GET /api/admin/notifications/{id}
pub async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Notification>>, AdminError> {
    let notification = state.notifications.get(id).await?;
    Ok(Json(ApiResponse::success(notification)))
}

/// 创建通知
///
/// POST /api/admin/notifications
pub async fn create_notification(
    State(state): State<AppState>,
    Json(req): Json<CreateNotificationRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Notification>>), AdminError> {
    req.validate()?;

    let notification = state.notifications.create(req.into_input()?).await?;
    info!(
        notification_id = %notification.id,
        status = %notification.status,
        "Notification created"
    );

    Ok((StatusCode::CREATED, Json(ApiResponse::success(notification))))
}

/// 修改草稿
///
/// PUT /api/admin/notifications/{id}
pub async fn update_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<UpdateNotificationRequest>,
) -> Result<Json<ApiResponse<Notification>>, AdminError> {
    req.validate()?;

    let notification = state.notifications.update(id, req.into_patch()?).await?;
    Ok(Json(ApiResponse::success(notification)))
}

/// 删除通知
///
/// DELETE /api/admin/notifications/{id}
pub async fn delete_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<DeletedResponse>>, AdminError> {
    state.notifications.delete(id).await?;
    Ok(Json(ApiResponse::success(DeletedResponse { id, deleted: true })))
}

/// 设置定时发送
///
/// POST /api/admin/notifications/{id}/schedule
pub async fn schedule_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ScheduleRequest>,
) -> Result<Json<ApiResponse<Notification>>, AdminError> {
    let notification = state.notifications.schedule(id, req.scheduled_for).await?;
    Ok(Json(ApiResponse::success(notification)))
}

/// 取消定时，通知回到草稿
///
/// POST /api/admin/notifications/{id}/cancel-schedule
pub async fn cancel_schedule(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<Notification>>, AdminError> {
    let notification = state.notifications.cancel_schedule(id).await?;
    Ok(Json(ApiResponse::success(notification)))
}

/// 立即发送
///
/// POST /api/admin/notifications/{id}/send
///
/// 发送未开始（状态不允许、渠道不可用）按领域错误返回；
/// 已开始但失败时通知已置为 failed，返回 422。
pub async fn send_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<SendResponse>>, AdminError> {
    match state.notifications.send(id).await {
        SendOutcome::Sent {
            recipient_count,
            message,
        } => Ok(Json(ApiResponse::success_with_message(
            SendResponse {
                id,
                recipient_count,
            },
            message,
        ))),
        SendOutcome::Failed { message } => Err(AdminError::SendFailed(message)),
        SendOutcome::Rejected(e) => Err(e.into()),
    }
}

/// 记录一次打开
///
/// POST /api/admin/notifications/{id}/open
pub async fn track_open(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EngagementCount>>, AdminError> {
    let count = state.notifications.track_open(id).await?;
    Ok(Json(ApiResponse::success(count)))
}

/// 记录一次点击
///
/// POST /api/admin/notifications/{id}/click
pub async fn track_click(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<EngagementCount>>, AdminError> {
    let count = state.notifications.track_click(id).await?;
    Ok(Json(ApiResponse::success(count)))
}
