//! 测试工具模块
//!
//! 提供记录存储与投递服务的内存实现，供单元测试与集成测试组装完整的发送管道。

use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use petadmin_shared::error::{PlatformError, Result};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::feedback::Feedback;
use crate::models::{
    DeliveryStats, InboxRecord, InsertOutcome, NewNotification, Notification, NotificationPatch,
    NotificationStatus, Recipient,
};
use crate::store::{InboxStore, NotificationStore, UserDirectory};
use crate::transport::{EmailTransport, SmsTransport, TransportReceipt};

// ==================== 通知存储 ====================

#[derive(Default)]
pub struct InMemoryNotificationStore {
    notifications: DashMap<Uuid, Notification>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.notifications.is_empty()
    }

    /// 直接读取当前记录
    pub fn snapshot(&self, id: Uuid) -> Option<Notification> {
        self.notifications.get(&id).map(|n| n.clone())
    }

    fn modify<T>(&self, id: Uuid, f: impl FnOnce(&mut Notification) -> T) -> Result<T> {
        let mut entry = self
            .notifications
            .get_mut(&id)
            .ok_or_else(|| PlatformError::not_found("Notification", id))?;
        let value = f(entry.value_mut());
        entry.updated_at = Utc::now();
        Ok(value)
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn list(&self) -> Result<Vec<Notification>> {
        let mut all: Vec<Notification> = self.notifications.iter().map(|n| n.clone()).collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(all)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Notification>> {
        Ok(self.snapshot(id))
    }

    async fn create(&self, new: &NewNotification) -> Result<Notification> {
        let now = Utc::now();
        let notification = Notification {
            id: Uuid::now_v7(),
            title: new.title.clone(),
            message: new.message.clone(),
            notification_type: new.notification_type,
            channel: new.channel,
            target_audience: new.target_audience,
            recipients: new.recipients.clone(),
            status: new.status,
            scheduled_for: new.scheduled_for,
            sent_at: None,
            recipient_count: 0,
            open_count: 0,
            click_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.notifications.insert(notification.id, notification.clone());
        Ok(notification)
    }

    async fn update_content(&self, id: Uuid, patch: &NotificationPatch) -> Result<Notification> {
        self.modify(id, |n| {
            patch.apply_to(n);
            n.clone()
        })
    }

    async fn update_schedule(
        &self,
        id: Uuid,
        status: NotificationStatus,
        scheduled_for: Option<chrono::DateTime<Utc>>,
    ) -> Result<()> {
        self.modify(id, |n| {
            n.status = status;
            n.scheduled_for = scheduled_for;
        })
    }

    async fn update_status(&self, id: Uuid, status: NotificationStatus) -> Result<()> {
        self.modify(id, |n| n.status = status)
    }

    async fn record_delivery(&self, id: Uuid, stats: &DeliveryStats) -> Result<()> {
        self.modify(id, |n| {
            n.status = stats.status;
            n.sent_at = stats.sent_at;
            n.recipient_count = stats.recipient_count;
            n.open_count = stats.open_count;
            n.click_count = stats.click_count;
        })
    }

    async fn increment_open_count(&self, id: Uuid) -> Result<i64> {
        self.modify(id, |n| {
            n.open_count += 1;
            n.open_count
        })
    }

    async fn increment_click_count(&self, id: Uuid) -> Result<i64> {
        self.modify(id, |n| {
            n.click_count += 1;
            n.click_count
        })
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        Ok(self.notifications.remove(&id).is_some())
    }
}

// ==================== 用户目录 ====================

#[derive(Default)]
pub struct InMemoryUserDirectory {
    users: RwLock<Vec<Recipient>>,
    premium: RwLock<HashSet<Uuid>>,
    unavailable: RwLock<bool>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_user(&self, user: Recipient) {
        self.users.write().await.push(user);
    }

    pub async fn add_premium_user(&self, user: Recipient) {
        self.premium.write().await.insert(user.id);
        self.add_user(user).await;
    }

    /// 模拟用户资料查询失败
    pub async fn set_unavailable(&self, unavailable: bool) {
        *self.unavailable.write().await = unavailable;
    }

    async fn check_available(&self) -> Result<()> {
        if *self.unavailable.read().await {
            return Err(PlatformError::Database(sqlx::Error::PoolTimedOut));
        }
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn list_users(&self) -> Result<Vec<Recipient>> {
        self.check_available().await?;
        Ok(self.users.read().await.clone())
    }

    async fn list_premium_users(&self) -> Result<Vec<Recipient>> {
        self.check_available().await?;
        let premium = self.premium.read().await;
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| premium.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_by_emails(&self, emails: &[String]) -> Result<Vec<Recipient>> {
        self.check_available().await?;
        Ok(self
            .users
            .read()
            .await
            .iter()
            .filter(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| emails.iter().any(|x| x.eq_ignore_ascii_case(e)))
            })
            .cloned()
            .collect())
    }
}

// ==================== 逐人记录 ====================

#[derive(Default)]
pub struct InMemoryInbox {
    records: DashMap<String, InboxRecord>,
    failing_users: Mutex<HashSet<Uuid>>,
}

impl InMemoryInbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records_for(&self, notification_id: Uuid) -> Vec<InboxRecord> {
        self.records
            .iter()
            .filter(|r| r.notification_id == notification_id)
            .map(|r| r.clone())
            .collect()
    }

    /// 使指定用户的写入失败
    pub fn fail_for(&self, user_id: Uuid) {
        if let Ok(mut failing) = self.failing_users.lock() {
            failing.insert(user_id);
        }
    }

    fn should_fail(&self, user_id: Uuid) -> bool {
        self.failing_users
            .lock()
            .map(|failing| failing.contains(&user_id))
            .unwrap_or(false)
    }
}

#[async_trait]
impl InboxStore for InMemoryInbox {
    async fn insert_if_absent(&self, record: &InboxRecord) -> Result<InsertOutcome> {
        if self.should_fail(record.user_id) {
            return Err(PlatformError::Internal(format!(
                "模拟写入失败: user_id={}",
                record.user_id
            )));
        }

        match self.records.entry(record.dedup_key.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Ok(InsertOutcome::AlreadyExists),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(InsertOutcome::Created)
            }
        }
    }
}

// ==================== 投递服务 ====================

/// 投递服务的模拟行为
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportMode {
    Accept,
    /// 服务明确拒绝（success = false）
    Reject(String),
    /// 服务不可用（可重试）
    Unavailable,
    /// 请求超时（可重试）
    Timeout,
}

/// 一次批量调用
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportCall {
    pub recipients: Vec<String>,
    pub subject: Option<String>,
    pub body: String,
}

/// 记录每次调用的投递服务
pub struct RecordingTransport {
    service: &'static str,
    mode: Mutex<TransportMode>,
    calls: Mutex<Vec<TransportCall>>,
}

impl RecordingTransport {
    pub fn new(service: &'static str, mode: TransportMode) -> Self {
        Self {
            service,
            mode: Mutex::new(mode),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn accepting(service: &'static str) -> Self {
        Self::new(service, TransportMode::Accept)
    }

    pub fn set_mode(&self, mode: TransportMode) {
        if let Ok(mut current) = self.mode.lock() {
            *current = mode;
        }
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: TransportCall) -> Result<TransportReceipt> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        let mode = self
            .mode
            .lock()
            .map(|m| m.clone())
            .unwrap_or(TransportMode::Accept);
        let service = self.service.to_string();
        match mode {
            TransportMode::Accept => Ok(TransportReceipt::accepted("queued")),
            TransportMode::Reject(reason) => Ok(TransportReceipt::rejected(reason)),
            TransportMode::Unavailable => Err(PlatformError::ExternalServiceUnavailable {
                service,
                message: "HTTP 503".to_string(),
            }),
            TransportMode::Timeout => Err(PlatformError::ExternalServiceTimeout { service }),
        }
    }
}

#[async_trait]
impl EmailTransport for RecordingTransport {
    async fn send_batch(
        &self,
        recipients: &[String],
        subject: &str,
        body: &str,
    ) -> Result<TransportReceipt> {
        self.record(TransportCall {
            recipients: recipients.to_vec(),
            subject: Some(subject.to_string()),
            body: body.to_string(),
        })
    }
}

#[async_trait]
impl SmsTransport for RecordingTransport {
    async fn send_batch(&self, recipients: &[String], text: &str) -> Result<TransportReceipt> {
        self.record(TransportCall {
            recipients: recipients.to_vec(),
            subject: None,
            body: text.to_string(),
        })
    }
}

// ==================== 操作反馈 ====================

#[derive(Default)]
pub struct RecordingFeedback {
    successes: Mutex<Vec<String>>,
    errors: Mutex<Vec<String>>,
}

impl RecordingFeedback {
    pub fn successes(&self) -> Vec<String> {
        self.successes.lock().map(|m| m.clone()).unwrap_or_default()
    }

    pub fn errors(&self) -> Vec<String> {
        self.errors.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

impl Feedback for RecordingFeedback {
    fn success(&self, message: &str) {
        if let Ok(mut m) = self.successes.lock() {
            m.push(message.to_string());
        }
    }

    fn error(&self, message: &str) {
        if let Ok(mut m) = self.errors.lock() {
            m.push(message.to_string());
        }
    }
}

/// 构造一个可达所有渠道的收件人
pub fn test_recipient(email: &str) -> Recipient {
    Recipient {
        id: Uuid::new_v4(),
        email: Some(email.to_string()),
        phone: None,
        push_token: Some(format!("push-{}", Uuid::new_v4().simple())),
        notifications_enabled: true,
    }
}
