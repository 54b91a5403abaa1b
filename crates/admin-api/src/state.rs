//! 应用状态定义

use std::sync::Arc;

use moderation::ReportService;
use notification_pipeline::NotificationService;

/// Axum 应用共享状态
///
/// 持有通知与举报两个服务，通过 Arc 在 handler 间共享
#[derive(Clone)]
pub struct AppState {
    pub notifications: Arc<NotificationService>,
    pub reports: Arc<ReportService>,
}

impl AppState {
    pub fn new(notifications: Arc<NotificationService>, reports: Arc<ReportService>) -> Self {
        Self {
            notifications,
            reports,
        }
    }
}
