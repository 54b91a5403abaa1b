//! 发送管道集成测试
//!
//! 使用内存存储与记录型投递服务组装完整管道（无需外部依赖）

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fake::Fake;
use fake::faker::internet::en::SafeEmail;
use notification_pipeline::dispatcher::ChannelDispatcher;
use notification_pipeline::error::NotificationError;
use notification_pipeline::models::{
    Channel, CreateNotification, NewNotification, Notification, NotificationStatus,
    NotificationType, Recipient, SYSTEM_SENDER_ID, TargetAudience,
};
use notification_pipeline::service::{NotificationService, SendOutcome};
use notification_pipeline::store::{NotificationStore, UserDirectory};
use notification_pipeline::test_utils::{
    InMemoryInbox, InMemoryNotificationStore, InMemoryUserDirectory, RecordingFeedback,
    RecordingTransport, TransportMode, test_recipient,
};
use petadmin_shared::retry::RetryPolicy;

struct Harness {
    service: NotificationService,
    store: Arc<InMemoryNotificationStore>,
    users: Arc<InMemoryUserDirectory>,
    inbox: Arc<InMemoryInbox>,
    email: Arc<RecordingTransport>,
    sms: Arc<RecordingTransport>,
    feedback: Arc<RecordingFeedback>,
}

impl Harness {
    async fn users_snapshot(&self) -> Vec<Recipient> {
        self.users.list_users().await.unwrap()
    }
}

fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        max_retries: 2,
        initial_delay: Duration::from_millis(1),
        max_delay: Duration::from_millis(5),
        multiplier: 2.0,
    }
}

fn dispatcher_for(h: &Harness) -> ChannelDispatcher {
    ChannelDispatcher::new(h.inbox.clone())
        .with_email_transport(h.email.clone())
        .with_sms_transport(h.sms.clone())
        .with_retry_policy(fast_retry())
        .with_concurrency(4)
}

fn harness() -> Harness {
    let store = Arc::new(InMemoryNotificationStore::new());
    let users = Arc::new(InMemoryUserDirectory::new());
    let inbox = Arc::new(InMemoryInbox::new());
    let email = Arc::new(RecordingTransport::accepting("email"));
    let sms = Arc::new(RecordingTransport::accepting("sms"));
    let feedback = Arc::new(RecordingFeedback::default());

    let dispatcher = ChannelDispatcher::new(inbox.clone())
        .with_email_transport(email.clone())
        .with_sms_transport(sms.clone())
        .with_retry_policy(fast_retry())
        .with_concurrency(4);
    let service =
        NotificationService::new(store.clone(), users.clone(), dispatcher, feedback.clone());

    Harness {
        service,
        store,
        users,
        inbox,
        email,
        sms,
        feedback,
    }
}

/// 邮箱加随机前缀，避免生成重复地址
fn random_recipient() -> Recipient {
    let email: String = SafeEmail().fake();
    let prefix = &uuid::Uuid::new_v4().simple().to_string()[..8];
    test_recipient(&format!("{prefix}.{}", email.to_lowercase()))
}

async fn add_users(h: &Harness, n: usize) -> Vec<Recipient> {
    let mut added = Vec::with_capacity(n);
    for _ in 0..n {
        let user = random_recipient();
        h.users.add_user(user.clone()).await;
        added.push(user);
    }
    added
}

async fn create(h: &Harness, channel: Channel, audience: TargetAudience) -> Notification {
    h.service
        .create(CreateNotification {
            title: "绝育补贴".to_string(),
            message: "本月起会员可申请宠物绝育补贴".to_string(),
            notification_type: NotificationType::Promotional,
            channel,
            target_audience: audience,
            recipients: None,
            scheduled_for: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn test_in_app_to_all_creates_one_record_per_recipient() {
    let h = harness();
    let users = add_users(&h, 3).await;
    let notification = create(&h, Channel::InApp, TargetAudience::All).await;

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Sent { recipient_count: 3, .. }));

    let stored = h.store.snapshot(notification.id).unwrap();
    assert_eq!(stored.status, NotificationStatus::Sent);
    assert_eq!(stored.recipient_count, 3);
    assert_eq!(stored.open_count, 0);
    assert_eq!(stored.click_count, 0);
    assert!(stored.sent_at.is_some());

    let records = h.inbox.records_for(notification.id);
    assert_eq!(records.len(), 3);
    for user in &users {
        let record = records.iter().find(|r| r.user_id == user.id).unwrap();
        assert_eq!(record.sender_id, SYSTEM_SENDER_ID);
        assert_eq!(record.delivery, Channel::InApp);
        assert_eq!(record.title, "绝育补贴");
    }

    assert!(h.email.calls().is_empty());
    assert!(h.feedback.successes().iter().any(|m| m.contains('3')));
}

#[tokio::test]
async fn test_send_runs_on_spawned_task() {
    let h = harness();
    add_users(&h, 2).await;
    let in_app = create(&h, Channel::InApp, TargetAudience::All).await;
    let push = create(&h, Channel::Push, TargetAudience::All).await;

    let Harness { service, inbox, .. } = h;
    let service = Arc::new(service);

    let handles: Vec<_> = [in_app.id, push.id]
        .into_iter()
        .map(|id| {
            let service = Arc::clone(&service);
            tokio::spawn(async move { service.send(id).await })
        })
        .collect();

    for handle in handles {
        assert!(handle.await.unwrap().is_sent());
    }
    assert_eq!(inbox.records_for(in_app.id).len(), 2);
    assert_eq!(inbox.records_for(push.id).len(), 2);
}

#[tokio::test]
async fn test_rejected_email_batch_marks_failed() {
    let h = harness();
    add_users(&h, 2).await;
    h.email.set_mode(TransportMode::Reject("sender not verified".to_string()));
    let notification = create(&h, Channel::Email, TargetAudience::Users).await;

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Failed { .. }));

    let stored = h.store.snapshot(notification.id).unwrap();
    assert_eq!(stored.status, NotificationStatus::Failed);
    assert!(stored.sent_at.is_none());
    assert_eq!(stored.recipient_count, 0);

    // 明确拒绝不重试
    assert_eq!(h.email.calls().len(), 1);
    assert!(!h.feedback.errors().is_empty());
}

#[tokio::test]
async fn test_unavailable_email_service_retried_then_failed() {
    let h = harness();
    add_users(&h, 1).await;
    h.email.set_mode(TransportMode::Unavailable);
    let notification = create(&h, Channel::Email, TargetAudience::All).await;

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Failed { .. }));

    // 首次执行 + 2 次重试
    assert_eq!(h.email.calls().len(), 3);
    let stored = h.store.snapshot(notification.id).unwrap();
    assert_eq!(stored.status, NotificationStatus::Failed);
    assert!(stored.sent_at.is_none());
}

#[tokio::test]
async fn test_email_batch_contains_every_address_once() {
    let h = harness();
    let users = add_users(&h, 4).await;
    let notification = create(&h, Channel::Email, TargetAudience::All).await;

    assert!(h.service.send(notification.id).await.is_sent());

    let calls = h.email.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].recipients.len(), 4);
    assert_eq!(calls[0].subject.as_deref(), Some("绝育补贴"));
    for user in &users {
        assert!(calls[0].recipients.contains(user.email.as_ref().unwrap()));
    }
}

#[tokio::test]
async fn test_sms_falls_back_to_email_destination() {
    let h = harness();
    let mut with_phone = random_recipient();
    with_phone.phone = Some("+34600111222".to_string());
    let without_phone = random_recipient();
    h.users.add_user(with_phone).await;
    h.users.add_user(without_phone.clone()).await;

    let notification = create(&h, Channel::Sms, TargetAudience::All).await;
    assert!(h.service.send(notification.id).await.is_sent());

    let calls = h.sms.calls();
    assert_eq!(calls.len(), 1);
    assert!(calls[0].recipients.contains(&"+34600111222".to_string()));
    assert!(calls[0].recipients.contains(without_phone.email.as_ref().unwrap()));
}

#[tokio::test]
async fn test_push_only_persists_records() {
    let h = harness();
    add_users(&h, 2).await;
    let notification = create(&h, Channel::Push, TargetAudience::All).await;

    assert!(h.service.send(notification.id).await.is_sent());

    let records = h.inbox.records_for(notification.id);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.delivery == Channel::Push));
    assert!(h.email.calls().is_empty());
    assert!(h.sms.calls().is_empty());
}

#[tokio::test]
async fn test_specific_without_recipients_sends_to_nobody() {
    let h = harness();
    add_users(&h, 2).await;

    // 绕过创建校验，直接写入缺少收件人列表的 specific 通知
    let notification = h
        .store
        .create(&NewNotification {
            title: "测试".to_string(),
            message: "测试".to_string(),
            notification_type: NotificationType::Info,
            channel: Channel::InApp,
            target_audience: TargetAudience::Specific,
            recipients: None,
            status: NotificationStatus::Draft,
            scheduled_for: None,
        })
        .await
        .unwrap();

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Sent { recipient_count: 0, .. }));
    assert!(h.inbox.is_empty());
}

#[tokio::test]
async fn test_specific_audience_targets_listed_emails() {
    let h = harness();
    let users = add_users(&h, 3).await;
    let target = users[1].email.clone().unwrap();

    let notification = h
        .service
        .create(CreateNotification {
            title: "领养申请已通过".to_string(),
            message: "请在三天内到救助站完成手续".to_string(),
            notification_type: NotificationType::Success,
            channel: Channel::InApp,
            target_audience: TargetAudience::Specific,
            recipients: Some(vec![target.to_uppercase()]),
            scheduled_for: None,
        })
        .await
        .unwrap();

    assert!(h.service.send(notification.id).await.is_sent());

    let records = h.inbox.records_for(notification.id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, users[1].id);
}

#[tokio::test]
async fn test_duplicate_profiles_counted_once() {
    let h = harness();
    let user = random_recipient();
    h.users.add_user(user.clone()).await;
    h.users.add_user(user.clone()).await;
    h.users.add_premium_user(user.clone()).await;

    let notification = create(&h, Channel::InApp, TargetAudience::PremiumUsers).await;
    let outcome = h.service.send(notification.id).await;

    assert!(matches!(outcome, SendOutcome::Sent { recipient_count: 1, .. }));
    assert_eq!(h.inbox.records_for(notification.id).len(), 1);
}

#[tokio::test]
async fn test_premium_audience_excludes_regular_users() {
    let h = harness();
    add_users(&h, 2).await;
    let member = random_recipient();
    h.users.add_premium_user(member.clone()).await;

    let notification = create(&h, Channel::InApp, TargetAudience::PremiumUsers).await;
    assert!(h.service.send(notification.id).await.is_sent());

    let records = h.inbox.records_for(notification.id);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].user_id, member.id);
}

#[tokio::test]
async fn test_per_recipient_failure_still_counts_attempt() {
    let h = harness();
    let users = add_users(&h, 3).await;
    h.inbox.fail_for(users[0].id);
    let notification = create(&h, Channel::InApp, TargetAudience::All).await;

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Sent { recipient_count: 3, .. }));
    assert_eq!(h.inbox.records_for(notification.id).len(), 2);
}

#[tokio::test]
async fn test_directory_outage_degrades_to_empty_send() {
    let h = harness();
    add_users(&h, 2).await;
    h.users.set_unavailable(true).await;
    let notification = create(&h, Channel::InApp, TargetAudience::All).await;

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Sent { recipient_count: 0, .. }));
    assert!(h.inbox.is_empty());
}

#[tokio::test]
async fn test_redispatch_creates_no_duplicate_records() {
    let h = harness();
    add_users(&h, 3).await;
    let notification = create(&h, Channel::Push, TargetAudience::All).await;
    assert!(h.service.send(notification.id).await.is_sent());
    assert_eq!(h.inbox.len(), 3);

    // 以相同通知再执行一次分发
    let dispatcher = dispatcher_for(&h);
    let recipients = h.users_snapshot().await;
    let stored = h.store.snapshot(notification.id).unwrap();
    let result = dispatcher.dispatch(&stored, &recipients).await.unwrap();

    assert!(result.success);
    assert_eq!(result.attempted, 3);
    assert_eq!(h.inbox.len(), 3);
}

#[tokio::test]
async fn test_sent_notification_cannot_be_resent() {
    let h = harness();
    add_users(&h, 1).await;
    let notification = create(&h, Channel::InApp, TargetAudience::All).await;
    assert!(h.service.send(notification.id).await.is_sent());

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(
        outcome,
        SendOutcome::Rejected(NotificationError::InvalidTransition {
            from: NotificationStatus::Sent,
            to: NotificationStatus::Sending
        })
    ));
    assert_eq!(h.inbox.len(), 1);
    assert_eq!(
        h.store.snapshot(notification.id).unwrap().status,
        NotificationStatus::Sent
    );
}

#[tokio::test]
async fn test_scheduled_notification_can_be_sent() {
    let h = harness();
    add_users(&h, 2).await;
    let notification = create(&h, Channel::InApp, TargetAudience::All).await;
    h.service
        .schedule(notification.id, Utc::now() + chrono::Duration::hours(1))
        .await
        .unwrap();

    let outcome = h.service.send(notification.id).await;
    assert!(matches!(outcome, SendOutcome::Sent { recipient_count: 2, .. }));
}

#[tokio::test]
async fn test_open_tracking_has_no_upper_bound() {
    let h = harness();
    add_users(&h, 1).await;
    let notification = create(&h, Channel::InApp, TargetAudience::All).await;
    assert!(h.service.send(notification.id).await.is_sent());

    for expected in 1..=5 {
        let opened = h.service.track_open(notification.id).await.unwrap();
        assert_eq!(opened.count, expected);
    }
    let clicked = h.service.track_click(notification.id).await.unwrap();
    assert_eq!(clicked.count, 1);

    let stored = h.store.snapshot(notification.id).unwrap();
    assert_eq!(stored.recipient_count, 1);
    assert_eq!(stored.open_count, 5);
    assert_eq!(stored.click_count, 1);
}
