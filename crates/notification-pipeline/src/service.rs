//! 通知生命周期服务
//!
//! 管理员操作入口：草稿的增删改、定时与取消定时、发送及打开/点击统计。
//!
//! ## 发送流程
//!
//! 受众解析 → 渠道分发 → 投递统计，严格顺序执行。`send` 不向调用方返回错误：
//! 发送开始前的问题（通知不存在、状态不允许、渠道不可用）作为拒绝返回，
//! 开始后的任何错误都将通知置为 failed。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use petadmin_shared::observability::metrics::record_notification_dispatch;
use serde::Serialize;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::accountant::DeliveryAccountant;
use crate::audience::AudienceResolver;
use crate::dispatcher::{ChannelDispatcher, DispatchResult};
use crate::error::{NotificationError, Result};
use crate::feedback::Feedback;
use crate::models::{
    CreateNotification, DeliveryStats, NewNotification, Notification, NotificationPatch,
    NotificationStatus, TargetAudience,
};
use crate::store::{NotificationStore, UserDirectory};

/// 发送结果
#[derive(Debug)]
pub enum SendOutcome {
    /// 已发送，recipient_count 为尝试投递人数
    Sent { recipient_count: i64, message: String },
    /// 发送已开始但失败，通知已置为 failed
    Failed { message: String },
    /// 发送未开始，通知保持原状态
    Rejected(NotificationError),
}

impl SendOutcome {
    pub fn is_sent(&self) -> bool {
        matches!(self, Self::Sent { .. })
    }

    pub fn message(&self) -> String {
        match self {
            Self::Sent { message, .. } | Self::Failed { message } => message.clone(),
            Self::Rejected(e) => e.to_string(),
        }
    }
}

/// 打开/点击计数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementCount {
    pub id: Uuid,
    pub count: i64,
}

pub struct NotificationService {
    store: Arc<dyn NotificationStore>,
    resolver: AudienceResolver,
    dispatcher: ChannelDispatcher,
    accountant: DeliveryAccountant,
    feedback: Arc<dyn Feedback>,
}

impl NotificationService {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        users: Arc<dyn UserDirectory>,
        dispatcher: ChannelDispatcher,
        feedback: Arc<dyn Feedback>,
    ) -> Self {
        Self {
            accountant: DeliveryAccountant::new(store.clone()),
            resolver: AudienceResolver::new(users),
            store,
            dispatcher,
            feedback,
        }
    }

    pub async fn list(&self) -> Result<Vec<Notification>> {
        Ok(self.store.list().await?)
    }

    pub async fn get(&self, id: Uuid) -> Result<Notification> {
        self.store
            .get(id)
            .await?
            .ok_or(NotificationError::NotFound(id))
    }

    /// 创建通知
    ///
    /// 带未来定时时间的进入 scheduled，否则为 draft。
    #[instrument(
        skip(self, input),
        fields(channel = %input.channel, audience = %input.target_audience)
    )]
    pub async fn create(&self, input: CreateNotification) -> Result<Notification> {
        let result = self.create_inner(input).await;
        self.report(result, "通知已创建")
    }

    async fn create_inner(&self, input: CreateNotification) -> Result<Notification> {
        validate_content(&input.title, &input.message)?;
        let recipients = normalize_recipients(input.target_audience, input.recipients)?;

        let status = match input.scheduled_for {
            Some(at) => {
                ensure_future(at, Utc::now())?;
                NotificationStatus::Scheduled
            }
            None => NotificationStatus::Draft,
        };

        let created = self
            .store
            .create(&NewNotification {
                title: input.title.trim().to_string(),
                message: input.message,
                notification_type: input.notification_type,
                channel: input.channel,
                target_audience: input.target_audience,
                recipients,
                status,
                scheduled_for: input.scheduled_for,
            })
            .await?;

        info!(notification_id = %created.id, status = %created.status, "通知已创建");
        Ok(created)
    }

    /// 修改草稿内容
    #[instrument(skip(self, patch), fields(notification_id = %id))]
    pub async fn update(&self, id: Uuid, patch: NotificationPatch) -> Result<Notification> {
        let result = self.update_inner(id, patch).await;
        self.report(result, "通知已更新")
    }

    async fn update_inner(&self, id: Uuid, mut patch: NotificationPatch) -> Result<Notification> {
        let current = self.get(id).await?;
        if !current.status.is_editable() {
            return Err(NotificationError::NotEditable(current.status));
        }

        let mut merged = current;
        patch.apply_to(&mut merged);
        validate_content(&merged.title, &merged.message)?;
        // 非 specific 受众一律清空收件人列表，与创建时一致
        patch.recipients = normalize_recipients(merged.target_audience, merged.recipients)?;
        if let Some(title) = patch.title.as_mut() {
            *title = title.trim().to_string();
        }

        Ok(self.store.update_content(id, &patch).await?)
    }

    /// 设定定时发送（draft -> scheduled）
    #[instrument(skip(self), fields(notification_id = %id))]
    pub async fn schedule(&self, id: Uuid, at: DateTime<Utc>) -> Result<Notification> {
        let result = self.schedule_inner(id, at).await;
        self.report(result, "通知已设定定时发送")
    }

    async fn schedule_inner(&self, id: Uuid, at: DateTime<Utc>) -> Result<Notification> {
        let current = self.get(id).await?;
        ensure_transition(current.status, NotificationStatus::Scheduled)?;
        ensure_future(at, Utc::now())?;

        self.store
            .update_schedule(id, NotificationStatus::Scheduled, Some(at))
            .await?;
        self.get(id).await
    }

    /// 取消定时发送（scheduled -> draft）
    #[instrument(skip(self), fields(notification_id = %id))]
    pub async fn cancel_schedule(&self, id: Uuid) -> Result<Notification> {
        let result = self.cancel_schedule_inner(id).await;
        self.report(result, "已取消定时发送")
    }

    async fn cancel_schedule_inner(&self, id: Uuid) -> Result<Notification> {
        let current = self.get(id).await?;
        if current.status != NotificationStatus::Scheduled {
            return Err(NotificationError::InvalidTransition {
                from: current.status,
                to: NotificationStatus::Draft,
            });
        }

        self.store
            .update_schedule(id, NotificationStatus::Draft, None)
            .await?;
        self.get(id).await
    }

    /// 删除通知，任何状态均可
    #[instrument(skip(self), fields(notification_id = %id))]
    pub async fn delete(&self, id: Uuid) -> Result<()> {
        let result = match self.store.delete(id).await {
            Ok(true) => Ok(()),
            Ok(false) => Err(NotificationError::NotFound(id)),
            Err(e) => Err(e.into()),
        };
        self.report(result, "通知已删除")
    }

    /// 发送通知
    #[instrument(skip(self), fields(notification_id = %id))]
    pub async fn send(&self, id: Uuid) -> SendOutcome {
        let notification = match self.prepare_send(id).await {
            Ok(notification) => notification,
            Err(e) => {
                warn!(error = %e, "发送请求被拒绝");
                self.feedback.error(&e.to_string());
                return SendOutcome::Rejected(e);
            }
        };

        let channel = notification.channel;
        let started = Instant::now();

        match self.deliver(&notification).await {
            Ok((_, stats)) if stats.status == NotificationStatus::Sent => {
                let message = format!("通知已发送给 {} 位收件人", stats.recipient_count);
                record_notification_dispatch(
                    channel.as_str(),
                    "sent",
                    stats.recipient_count.max(0) as u64,
                    started.elapsed().as_secs_f64(),
                );
                self.feedback.success(&message);
                SendOutcome::Sent {
                    recipient_count: stats.recipient_count,
                    message,
                }
            }
            Ok((result, _)) => {
                let message = format!("通知发送失败: {}", result.message);
                record_notification_dispatch(
                    channel.as_str(),
                    "failed",
                    0,
                    started.elapsed().as_secs_f64(),
                );
                self.feedback.error(&message);
                SendOutcome::Failed { message }
            }
            Err(e) => {
                error!(error = %e, "发送过程出错，通知置为失败");
                if let Err(mark_err) = self.accountant.mark_failed(id).await {
                    error!(error = %mark_err, "无法将通知置为失败");
                }
                record_notification_dispatch(
                    channel.as_str(),
                    "error",
                    0,
                    started.elapsed().as_secs_f64(),
                );
                let message = format!("通知发送失败: {e}");
                self.feedback.error(&message);
                SendOutcome::Failed { message }
            }
        }
    }

    /// 加载通知并进入 sending，之前不产生任何副作用
    async fn prepare_send(&self, id: Uuid) -> Result<Notification> {
        let notification = self.get(id).await?;
        if !self.dispatcher.supports(notification.channel) {
            return Err(NotificationError::UnsupportedChannel(
                notification.channel.to_string(),
            ));
        }
        self.accountant.begin(&notification).await?;
        Ok(notification)
    }

    async fn deliver(
        &self,
        notification: &Notification,
    ) -> Result<(DispatchResult, DeliveryStats)> {
        let recipients = self
            .resolver
            .resolve(
                notification.target_audience,
                notification.explicit_recipients(),
                notification.channel,
            )
            .await;

        let result = self.dispatcher.dispatch(notification, &recipients).await?;
        let stats = self.accountant.finalize(notification.id, &result).await?;
        Ok((result, stats))
    }

    pub async fn track_open(&self, id: Uuid) -> Result<EngagementCount> {
        let count = self.accountant.track_open(id).await?;
        Ok(EngagementCount { id, count })
    }

    pub async fn track_click(&self, id: Uuid) -> Result<EngagementCount> {
        let count = self.accountant.track_click(id).await?;
        Ok(EngagementCount { id, count })
    }

    fn report<T>(&self, result: Result<T>, success: &str) -> Result<T> {
        match &result {
            Ok(_) => self.feedback.success(success),
            Err(e) => self.feedback.error(&e.to_string()),
        }
        result
    }
}

fn validate_content(title: &str, message: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(NotificationError::Validation("标题不能为空".to_string()));
    }
    if message.trim().is_empty() {
        return Err(NotificationError::Validation("内容不能为空".to_string()));
    }
    Ok(())
}

/// specific 受众要求至少一个邮箱，其余受众不保存显式列表
fn normalize_recipients(
    audience: TargetAudience,
    recipients: Option<Vec<String>>,
) -> Result<Option<Vec<String>>> {
    match audience {
        TargetAudience::Specific => {
            let mut seen = HashSet::new();
            let emails: Vec<String> = recipients
                .unwrap_or_default()
                .into_iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .filter(|e| seen.insert(e.clone()))
                .collect();

            if emails.is_empty() {
                return Err(NotificationError::Validation(
                    "指定收件人时收件人列表不能为空".to_string(),
                ));
            }
            if let Some(invalid) = emails.iter().find(|e| !looks_like_email(e)) {
                return Err(NotificationError::Validation(format!(
                    "无效的收件人邮箱: {invalid}"
                )));
            }
            Ok(Some(emails))
        }
        TargetAudience::All | TargetAudience::Users | TargetAudience::PremiumUsers => Ok(None),
    }
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && domain.contains('.') && !domain.starts_with('.')
        }
        None => false,
    }
}

fn ensure_future(at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if at <= now {
        return Err(NotificationError::Validation(
            "定时发送时间必须晚于当前时间".to_string(),
        ));
    }
    Ok(())
}

fn ensure_transition(from: NotificationStatus, to: NotificationStatus) -> Result<()> {
    if from.can_transition_to(to) {
        Ok(())
    } else {
        Err(NotificationError::InvalidTransition { from, to })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, NotificationType};
    use crate::test_utils::{
        InMemoryInbox, InMemoryNotificationStore, InMemoryUserDirectory, RecordingFeedback,
    };
    use chrono::Duration;

    struct Fixture {
        service: NotificationService,
        store: Arc<InMemoryNotificationStore>,
        feedback: Arc<RecordingFeedback>,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(InMemoryNotificationStore::new());
        let users = Arc::new(InMemoryUserDirectory::new());
        let feedback = Arc::new(RecordingFeedback::default());
        let dispatcher = ChannelDispatcher::new(Arc::new(InMemoryInbox::new()));
        let service = NotificationService::new(store.clone(), users, dispatcher, feedback.clone());
        Fixture {
            service,
            store,
            feedback,
        }
    }

    fn input(audience: TargetAudience, recipients: Option<Vec<&str>>) -> CreateNotification {
        CreateNotification {
            title: "  新功能上线 ".to_string(),
            message: "现在可以为宠物建立健康档案".to_string(),
            notification_type: NotificationType::Success,
            channel: Channel::InApp,
            target_audience: audience,
            recipients: recipients.map(|r| r.into_iter().map(String::from).collect()),
            scheduled_for: None,
        }
    }

    #[tokio::test]
    async fn test_create_draft_and_scheduled() {
        let f = fixture();

        let draft = f.service.create(input(TargetAudience::All, None)).await.unwrap();
        assert_eq!(draft.status, NotificationStatus::Draft);
        assert_eq!(draft.title, "新功能上线");
        assert!(draft.recipients.is_none());

        let mut later = input(TargetAudience::Users, Some(vec!["ignored@pets.example"]));
        later.scheduled_for = Some(Utc::now() + Duration::hours(2));
        let scheduled = f.service.create(later).await.unwrap();
        assert_eq!(scheduled.status, NotificationStatus::Scheduled);
        // 非 specific 受众不保存显式列表
        assert!(scheduled.recipients.is_none());

        assert_eq!(f.feedback.successes().len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_past_schedule_and_empty_specific() {
        let f = fixture();

        let mut past = input(TargetAudience::All, None);
        past.scheduled_for = Some(Utc::now() - Duration::minutes(1));
        assert!(matches!(
            f.service.create(past).await,
            Err(NotificationError::Validation(_))
        ));

        let empty = input(TargetAudience::Specific, Some(vec![" "]));
        assert!(matches!(
            f.service.create(empty).await,
            Err(NotificationError::Validation(_))
        ));

        let invalid = input(TargetAudience::Specific, Some(vec!["not-an-email"]));
        assert!(f.service.create(invalid).await.is_err());

        assert!(f.store.is_empty());
        assert_eq!(f.feedback.errors().len(), 3);
    }

    #[tokio::test]
    async fn test_specific_recipients_normalized() {
        let f = fixture();
        let created = f
            .service
            .create(input(
                TargetAudience::Specific,
                Some(vec!["Luna@Pets.Example", "luna@pets.example ", "max@pets.example"]),
            ))
            .await
            .unwrap();

        assert_eq!(
            created.recipients,
            Some(vec!["luna@pets.example".to_string(), "max@pets.example".to_string()])
        );
    }

    #[tokio::test]
    async fn test_update_only_while_draft() {
        let f = fixture();
        let draft = f.service.create(input(TargetAudience::All, None)).await.unwrap();

        let updated = f
            .service
            .update(
                draft.id,
                NotificationPatch {
                    title: Some("更新后的标题".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "更新后的标题");

        f.service
            .schedule(draft.id, Utc::now() + Duration::hours(1))
            .await
            .unwrap();
        let err = f
            .service
            .update(draft.id, NotificationPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::NotEditable(NotificationStatus::Scheduled)));
    }

    #[tokio::test]
    async fn test_update_audience_away_from_specific_clears_recipients() {
        let f = fixture();
        let draft = f
            .service
            .create(input(TargetAudience::Specific, Some(vec!["luna@pets.example"])))
            .await
            .unwrap();
        assert!(draft.recipients.is_some());

        let updated = f
            .service
            .update(
                draft.id,
                NotificationPatch {
                    target_audience: Some(TargetAudience::All),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.target_audience, TargetAudience::All);
        assert!(updated.recipients.is_none());

        let stored = f.service.get(draft.id).await.unwrap();
        assert!(stored.recipients.is_none());
    }

    #[tokio::test]
    async fn test_update_rejects_blank_title() {
        let f = fixture();
        let draft = f.service.create(input(TargetAudience::All, None)).await.unwrap();

        let err = f
            .service
            .update(
                draft.id,
                NotificationPatch {
                    title: Some("   ".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::Validation(_)));
    }

    #[tokio::test]
    async fn test_schedule_and_cancel() {
        let f = fixture();
        let draft = f.service.create(input(TargetAudience::All, None)).await.unwrap();
        let at = Utc::now() + Duration::days(1);

        let scheduled = f.service.schedule(draft.id, at).await.unwrap();
        assert_eq!(scheduled.status, NotificationStatus::Scheduled);
        assert_eq!(scheduled.scheduled_for, Some(at));

        let cancelled = f.service.cancel_schedule(draft.id).await.unwrap();
        assert_eq!(cancelled.status, NotificationStatus::Draft);
        assert!(cancelled.scheduled_for.is_none());

        // 草稿不能再取消定时
        let err = f.service.cancel_schedule(draft.id).await.unwrap_err();
        assert!(matches!(err, NotificationError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let f = fixture();
        let draft = f.service.create(input(TargetAudience::All, None)).await.unwrap();

        f.service.delete(draft.id).await.unwrap();
        assert!(matches!(
            f.service.delete(draft.id).await,
            Err(NotificationError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_unconfigured_channel_without_side_effects() {
        let f = fixture();
        let mut email = input(TargetAudience::All, None);
        email.channel = Channel::Email;
        let created = f.service.create(email).await.unwrap();

        let outcome = f.service.send(created.id).await;
        assert!(matches!(outcome, SendOutcome::Rejected(NotificationError::UnsupportedChannel(_))));

        let unchanged = f.service.get(created.id).await.unwrap();
        assert_eq!(unchanged.status, NotificationStatus::Draft);
    }

    #[tokio::test]
    async fn test_send_missing_notification_is_rejected() {
        let f = fixture();
        let outcome = f.service.send(Uuid::new_v4()).await;
        assert!(matches!(outcome, SendOutcome::Rejected(NotificationError::NotFound(_))));
        assert_eq!(f.feedback.errors().len(), 1);
    }

    #[test]
    fn test_email_shape_check() {
        assert!(looks_like_email("a@pets.example"));
        assert!(!looks_like_email("@pets.example"));
        assert!(!looks_like_email("a@localhost"));
        assert!(!looks_like_email("plain"));
    }
}
