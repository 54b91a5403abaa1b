//! 路由配置模块
//!
//! 定义所有 REST API 端点的路由映射

use axum::{
    Router,
    routing::{get, patch, post},
};

use crate::{handlers, state::AppState};

/// 通知管理路由
fn notification_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/notifications",
            get(handlers::notification::list_notifications)
                .post(handlers::notification::create_notification),
        )
        .route(
            "/notifications/{id}",
            get(handlers::notification::get_notification)
                .put(handlers::notification::update_notification)
                .delete(handlers::notification::delete_notification),
        )
        .route(
            "/notifications/{id}/schedule",
            post(handlers::notification::schedule_notification),
        )
        .route(
            "/notifications/{id}/cancel-schedule",
            post(handlers::notification::cancel_schedule),
        )
        .route(
            "/notifications/{id}/send",
            post(handlers::notification::send_notification),
        )
        .route(
            "/notifications/{id}/open",
            post(handlers::notification::track_open),
        )
        .route(
            "/notifications/{id}/click",
            post(handlers::notification::track_click),
        )
}

/// 举报处理路由
fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/reports", get(handlers::report::list_reports))
        .route("/reports/{id}", get(handlers::report::get_report))
        .route("/reports/{id}/review", patch(handlers::report::review_report))
        .route(
            "/reports/{id}/moderate",
            post(handlers::report::moderate_report),
        )
}

/// 构建挂载到 `/api/admin` 下的全部路由
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(notification_routes())
        .merge(report_routes())
}
