//! 通知发送命令行
//!
//! 对指定通知执行一次完整发送，供外部调度器在定时时间到达时调用：
//!
//! ```text
//! notification-send <notification-id>
//! ```

use std::sync::Arc;

use anyhow::Context;
use notification_pipeline::repository::{InboxRepository, NotificationRepository, UserRepository};
use notification_pipeline::{ChannelDispatcher, LogFeedback, NotificationService, SendOutcome};
use petadmin_shared::{config::AppConfig, database::Database, observability};
use tracing::{error, info};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::load("notification-send").unwrap_or_default();
    let obs_config = config
        .observability
        .clone()
        .with_service_name(&config.service_name);
    let _guard = observability::init(&obs_config).await?;

    let id: Uuid = std::env::args()
        .nth(1)
        .context("用法: notification-send <notification-id>")?
        .parse()
        .context("通知 ID 不是合法的 UUID")?;

    let db = Database::connect(&config.database).await?;
    let pool = db.pool().clone();

    let inbox = Arc::new(InboxRepository::new(pool.clone()));
    let dispatcher = ChannelDispatcher::from_config(&config.dispatch, inbox)?;
    let service = NotificationService::new(
        Arc::new(NotificationRepository::new(pool.clone())),
        Arc::new(UserRepository::new(pool)),
        dispatcher,
        Arc::new(LogFeedback),
    );

    let outcome = service.send(id).await;
    db.close().await;

    match outcome {
        SendOutcome::Sent { recipient_count, .. } => {
            info!(notification_id = %id, recipient_count, "发送完成");
            Ok(())
        }
        other => {
            error!(notification_id = %id, message = %other.message(), "发送未成功");
            std::process::exit(1);
        }
    }
}
