//! 渠道分发
//!
//! 邮件、短信：整批一次调用外部投递服务，成功与否对整个批次生效，瞬时故障按重试策略退避重试。
//! 站内信、推送：为每个收件人幂等写入一条逐人记录，写入以有上限的并发执行；
//! 推送的实际设备投递由下游触发器消费记录完成，这里不直接调用推送服务。

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use petadmin_shared::config::DispatchConfig;
use petadmin_shared::error::PlatformError;
use petadmin_shared::retry::{RetryPolicy, retry_with_policy};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{NotificationError, Result};
use crate::models::{Channel, InboxRecord, InsertOutcome, Notification, Recipient};
use crate::store::InboxStore;
use crate::transport::{
    EmailTransport, HttpTransport, LoggingTransport, SmsTransport, TransportReceipt,
};

/// 默认逐人写入并发上限
pub const DEFAULT_CONCURRENCY: usize = 8;

/// 单次分发结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchResult {
    pub channel: Channel,
    pub success: bool,
    pub message: String,
    /// 尝试投递的收件人数
    pub attempted: usize,
    /// 已确认写入或受理的收件人数
    pub delivered: usize,
    pub failed: usize,
}

impl DispatchResult {
    fn batch(channel: Channel, attempted: usize, receipt: TransportReceipt) -> Self {
        let success = receipt.success;
        let message = receipt.message.unwrap_or_else(|| {
            if success {
                format!("已提交 {attempted} 位收件人")
            } else {
                "投递服务拒绝了本批次".to_string()
            }
        });

        Self {
            channel,
            success,
            message,
            attempted,
            delivered: if success { attempted } else { 0 },
            failed: if success { 0 } else { attempted },
        }
    }

    fn empty(channel: Channel) -> Self {
        Self {
            channel,
            success: true,
            message: "没有可投递的收件人".to_string(),
            attempted: 0,
            delivered: 0,
            failed: 0,
        }
    }
}

pub struct ChannelDispatcher {
    email: Option<Arc<dyn EmailTransport>>,
    sms: Option<Arc<dyn SmsTransport>>,
    inbox: Arc<dyn InboxStore>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl ChannelDispatcher {
    pub fn new(inbox: Arc<dyn InboxStore>) -> Self {
        Self {
            email: None,
            sms: None,
            inbox,
            retry: RetryPolicy::default(),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// 按配置组装：配置了端点的渠道走 HTTP 投递，否则使用日志模拟发送
    pub fn from_config(config: &DispatchConfig, inbox: Arc<dyn InboxStore>) -> Result<Self> {
        let timeout = Duration::from_secs(config.transport_timeout_seconds);

        let email: Arc<dyn EmailTransport> = match &config.email_endpoint {
            Some(endpoint) => Arc::new(HttpTransport::new(
                "email",
                endpoint.clone(),
                config.transport_api_key.clone(),
                timeout,
            )?),
            None => {
                warn!("未配置邮件投递端点，使用日志模拟发送");
                Arc::new(LoggingTransport)
            }
        };
        let sms: Arc<dyn SmsTransport> = match &config.sms_endpoint {
            Some(endpoint) => Arc::new(HttpTransport::new(
                "sms",
                endpoint.clone(),
                config.transport_api_key.clone(),
                timeout,
            )?),
            None => {
                warn!("未配置短信投递端点，使用日志模拟发送");
                Arc::new(LoggingTransport)
            }
        };

        Ok(Self::new(inbox)
            .with_email_transport(email)
            .with_sms_transport(sms)
            .with_retry_policy(RetryPolicy::from(&config.retry))
            .with_concurrency(config.concurrency))
    }

    pub fn with_email_transport(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.email = Some(transport);
        self
    }

    pub fn with_sms_transport(mut self, transport: Arc<dyn SmsTransport>) -> Self {
        self.sms = Some(transport);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// 渠道是否具备投递能力
    ///
    /// 邮件、短信需要配置外部投递服务；站内信与推送只依赖记录存储。
    pub fn supports(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email.is_some(),
            Channel::Sms => self.sms.is_some(),
            Channel::InApp | Channel::Push => true,
        }
    }

    #[instrument(
        skip(self, notification, recipients),
        fields(
            notification_id = %notification.id,
            channel = %notification.channel,
            recipients = recipients.len()
        )
    )]
    pub async fn dispatch(
        &self,
        notification: &Notification,
        recipients: &[Recipient],
    ) -> Result<DispatchResult> {
        match notification.channel {
            Channel::Email => self.dispatch_email(notification, recipients).await,
            Channel::Sms => self.dispatch_sms(notification, recipients).await,
            Channel::InApp | Channel::Push => {
                Ok(self.persist_per_recipient(notification, recipients).await)
            }
        }
    }

    async fn dispatch_email(
        &self,
        notification: &Notification,
        recipients: &[Recipient],
    ) -> Result<DispatchResult> {
        let transport = self
            .email
            .as_ref()
            .ok_or_else(|| NotificationError::UnsupportedChannel(Channel::Email.to_string()))?;

        let addresses: Vec<String> = recipients
            .iter()
            .filter_map(Recipient::email_address)
            .map(String::from)
            .collect();
        if addresses.is_empty() {
            return Ok(DispatchResult::empty(Channel::Email));
        }

        let receipt = retry_with_policy(
            &self.retry,
            "email.send_batch",
            PlatformError::is_retryable,
            || transport.send_batch(&addresses, &notification.title, &notification.message),
        )
        .await
        .map_err(|e| NotificationError::TransportFailed {
            channel: Channel::Email,
            reason: e.to_string(),
        })?;

        info!(addresses = addresses.len(), success = receipt.success, "邮件批次已处理");
        Ok(DispatchResult::batch(Channel::Email, addresses.len(), receipt))
    }

    async fn dispatch_sms(
        &self,
        notification: &Notification,
        recipients: &[Recipient],
    ) -> Result<DispatchResult> {
        let transport = self
            .sms
            .as_ref()
            .ok_or_else(|| NotificationError::UnsupportedChannel(Channel::Sms.to_string()))?;

        let destinations: Vec<String> = recipients
            .iter()
            .filter_map(Recipient::sms_destination)
            .map(String::from)
            .collect();
        if destinations.is_empty() {
            return Ok(DispatchResult::empty(Channel::Sms));
        }

        let receipt = retry_with_policy(
            &self.retry,
            "sms.send_batch",
            PlatformError::is_retryable,
            || transport.send_batch(&destinations, &notification.message),
        )
        .await
        .map_err(|e| NotificationError::TransportFailed {
            channel: Channel::Sms,
            reason: e.to_string(),
        })?;

        info!(destinations = destinations.len(), success = receipt.success, "短信批次已处理");
        Ok(DispatchResult::batch(Channel::Sms, destinations.len(), receipt))
    }

    /// 逐人写入记录
    ///
    /// 单个收件人写入失败只记录日志，不影响其余收件人。
    async fn persist_per_recipient(
        &self,
        notification: &Notification,
        recipients: &[Recipient],
    ) -> DispatchResult {
        let channel = notification.channel;
        let now = Utc::now();

        // 记录先全部构造为自有值，写入任务不借用通知与收件人
        let records: Vec<InboxRecord> = recipients
            .iter()
            .map(|recipient| InboxRecord::for_recipient(notification, recipient, now))
            .collect();

        let outcomes: Vec<_> = stream::iter(records)
            .map(|record| {
                let inbox = Arc::clone(&self.inbox);
                async move {
                    let outcome = inbox.insert_if_absent(&record).await;
                    (record.user_id, outcome)
                }
            })
            .buffer_unordered(self.concurrency.max(1))
            .collect()
            .await;

        let mut created = 0usize;
        let mut existing = 0usize;
        let mut failed = 0usize;
        for (user_id, outcome) in outcomes {
            match outcome {
                Ok(InsertOutcome::Created) => created += 1,
                Ok(InsertOutcome::AlreadyExists) => {
                    debug!(user_id = %user_id, "逐人记录已存在，跳过");
                    existing += 1;
                }
                Err(e) => {
                    warn!(user_id = %user_id, error = %e, "逐人记录写入失败");
                    failed += 1;
                }
            }
        }

        let attempted = recipients.len();
        let delivered = created + existing;
        let success = attempted == 0 || delivered > 0;
        let message = if attempted == 0 {
            "没有可投递的收件人".to_string()
        } else {
            format!("已写入 {created} 条记录，{existing} 条已存在，{failed} 条失败")
        };

        info!(created, existing, failed, "逐人记录写入完成");

        DispatchResult {
            channel,
            success,
            message,
            attempted,
            delivered,
            failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationStatus, NotificationType, TargetAudience};
    use crate::store::MockInboxStore;
    use crate::transport::{MockEmailTransport, MockSmsTransport};
    use std::collections::HashSet;
    use std::sync::Mutex;
    use uuid::Uuid;

    fn notification(channel: Channel) -> Notification {
        let now = Utc::now();
        Notification {
            id: Uuid::new_v4(),
            title: "领养日".to_string(),
            message: "本周六在中央公园举办领养日活动".to_string(),
            notification_type: NotificationType::Info,
            channel,
            target_audience: TargetAudience::All,
            recipients: None,
            status: NotificationStatus::Sending,
            scheduled_for: None,
            sent_at: None,
            recipient_count: 0,
            open_count: 0,
            click_count: 0,
            created_at: now,
            updated_at: now,
        }
    }

    fn recipient(email: &str, phone: Option<&str>) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            phone: phone.map(String::from),
            push_token: Some("tok".to_string()),
            notifications_enabled: true,
        }
    }

    fn fast_retry(max_retries: u32) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn test_email_sends_single_batch() {
        let recipients = vec![recipient("a@pets.example", None), recipient("b@pets.example", None)];

        let mut email = MockEmailTransport::new();
        email
            .expect_send_batch()
            .withf(|addresses: &[String], subject: &str, _body: &str| {
                addresses.len() == 2 && subject == "领养日"
            })
            .times(1)
            .returning(|_, _, _| Ok(TransportReceipt::accepted("batch-1")));

        let dispatcher = ChannelDispatcher::new(Arc::new(MockInboxStore::new()))
            .with_email_transport(Arc::new(email));
        let result = dispatcher
            .dispatch(&notification(Channel::Email), &recipients)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.attempted, 2);
        assert_eq!(result.delivered, 2);
        assert_eq!(result.message, "batch-1");
    }

    #[tokio::test]
    async fn test_email_rejection_is_not_retried() {
        let mut email = MockEmailTransport::new();
        email
            .expect_send_batch()
            .times(1)
            .returning(|_, _, _| Ok(TransportReceipt::rejected("invalid sender")));

        let dispatcher = ChannelDispatcher::new(Arc::new(MockInboxStore::new()))
            .with_email_transport(Arc::new(email))
            .with_retry_policy(fast_retry(3));
        let result = dispatcher
            .dispatch(&notification(Channel::Email), &[recipient("a@pets.example", None)])
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.delivered, 0);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn test_sms_retries_transient_failures() {
        let calls = Arc::new(Mutex::new(0u32));
        let counter = calls.clone();

        let mut sms = MockSmsTransport::new();
        sms.expect_send_batch()
            .withf(|destinations: &[String], _text: &str| {
                destinations == ["+34600000001".to_string(), "c@pets.example".to_string()]
            })
            .times(2)
            .returning(move |_, _| {
                let mut n = counter.lock().unwrap();
                *n += 1;
                if *n == 1 {
                    Err(PlatformError::ExternalServiceTimeout {
                        service: "sms".to_string(),
                    })
                } else {
                    Ok(TransportReceipt::accepted("ok"))
                }
            });

        let dispatcher = ChannelDispatcher::new(Arc::new(MockInboxStore::new()))
            .with_sms_transport(Arc::new(sms))
            .with_retry_policy(fast_retry(2));
        let recipients = vec![
            recipient("a@pets.example", Some("+34600000001")),
            recipient("c@pets.example", None),
        ];
        let result = dispatcher
            .dispatch(&notification(Channel::Sms), &recipients)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[tokio::test]
    async fn test_exhausted_retries_become_transport_failure() {
        let mut email = MockEmailTransport::new();
        email.expect_send_batch().times(2).returning(|_, _, _| {
            Err(PlatformError::ExternalServiceUnavailable {
                service: "email".to_string(),
                message: "HTTP 503".to_string(),
            })
        });

        let dispatcher = ChannelDispatcher::new(Arc::new(MockInboxStore::new()))
            .with_email_transport(Arc::new(email))
            .with_retry_policy(fast_retry(1));
        let err = dispatcher
            .dispatch(&notification(Channel::Email), &[recipient("a@pets.example", None)])
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            NotificationError::TransportFailed { channel: Channel::Email, .. }
        ));
    }

    #[tokio::test]
    async fn test_missing_transport_is_unsupported() {
        let dispatcher = ChannelDispatcher::new(Arc::new(MockInboxStore::new()));
        assert!(!dispatcher.supports(Channel::Email));
        assert!(!dispatcher.supports(Channel::Sms));
        assert!(dispatcher.supports(Channel::InApp));
        assert!(dispatcher.supports(Channel::Push));

        let err = dispatcher
            .dispatch(&notification(Channel::Sms), &[recipient("a@pets.example", None)])
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::UnsupportedChannel(_)));
    }

    #[tokio::test]
    async fn test_push_persists_records_without_transport_call() {
        let notification = notification(Channel::Push);
        let recipients = vec![
            recipient("a@pets.example", None),
            recipient("b@pets.example", None),
            recipient("c@pets.example", None),
        ];
        let expected: HashSet<Uuid> = recipients.iter().map(|r| r.id).collect();
        let seen = Arc::new(Mutex::new(HashSet::new()));
        let sink = seen.clone();
        let notification_id = notification.id;

        let mut inbox = MockInboxStore::new();
        inbox
            .expect_insert_if_absent()
            .times(3)
            .returning(move |record| {
                assert_eq!(record.notification_id, notification_id);
                assert_eq!(record.sender_id, crate::models::SYSTEM_SENDER_ID);
                assert_eq!(record.delivery, Channel::Push);
                sink.lock().unwrap().insert(record.user_id);
                Ok(InsertOutcome::Created)
            });

        // 推送路径不得调用邮件/短信服务
        let mut email = MockEmailTransport::new();
        email.expect_send_batch().never();

        let dispatcher = ChannelDispatcher::new(Arc::new(inbox))
            .with_email_transport(Arc::new(email))
            .with_concurrency(2);
        let result = dispatcher.dispatch(&notification, &recipients).await.unwrap();

        assert!(result.success);
        assert_eq!(result.attempted, 3);
        assert_eq!(result.delivered, 3);
        assert_eq!(*seen.lock().unwrap(), expected);
    }

    #[tokio::test]
    async fn test_per_recipient_failure_does_not_abort_batch() {
        let recipients = vec![
            recipient("a@pets.example", None),
            recipient("b@pets.example", None),
            recipient("c@pets.example", None),
        ];
        let broken = recipients[1].id;

        let mut inbox = MockInboxStore::new();
        inbox.expect_insert_if_absent().times(3).returning(move |record| {
            if record.user_id == broken {
                Err(PlatformError::Database(sqlx::Error::PoolTimedOut))
            } else {
                Ok(InsertOutcome::Created)
            }
        });

        let dispatcher = ChannelDispatcher::new(Arc::new(inbox));
        let result = dispatcher
            .dispatch(&notification(Channel::InApp), &recipients)
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.attempted, 3);
        assert_eq!(result.delivered, 2);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn test_all_inserts_failing_is_unsuccessful() {
        let mut inbox = MockInboxStore::new();
        inbox
            .expect_insert_if_absent()
            .returning(|_| Err(PlatformError::Internal("boom".to_string())));

        let dispatcher = ChannelDispatcher::new(Arc::new(inbox));
        let result = dispatcher
            .dispatch(&notification(Channel::InApp), &[recipient("a@pets.example", None)])
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.attempted, 1);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn test_existing_records_count_as_delivered() {
        let mut inbox = MockInboxStore::new();
        inbox
            .expect_insert_if_absent()
            .returning(|_| Ok(InsertOutcome::AlreadyExists));

        let dispatcher = ChannelDispatcher::new(Arc::new(inbox));
        let result = dispatcher
            .dispatch(&notification(Channel::InApp), &[recipient("a@pets.example", None)])
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.delivered, 1);
    }

    #[test]
    fn test_from_default_config_supports_all_channels() {
        let inbox = Arc::new(MockInboxStore::new());
        let dispatcher = ChannelDispatcher::from_config(&DispatchConfig::default(), inbox).unwrap();
        for channel in Channel::ALL {
            assert!(dispatcher.supports(channel));
        }
        assert_eq!(dispatcher.concurrency, 8);
        assert_eq!(dispatcher.retry.max_retries, 3);
    }

    #[tokio::test]
    async fn test_empty_recipients_skip_transport() {
        let mut email = MockEmailTransport::new();
        email.expect_send_batch().never();

        let dispatcher = ChannelDispatcher::new(Arc::new(MockInboxStore::new()))
            .with_email_transport(Arc::new(email));
        let result = dispatcher
            .dispatch(&notification(Channel::Email), &[])
            .await
            .unwrap();

        assert!(result.success);
        assert_eq!(result.attempted, 0);
    }
}
