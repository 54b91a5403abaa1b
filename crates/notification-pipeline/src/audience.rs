//! 受众解析
//!
//! 将符号化的目标受众解析为具体收件人列表。
//! 查询失败降级为空列表并记录日志，不中断整个发送流程。

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, instrument};

use crate::error::Result;
use crate::models::{Channel, Recipient, TargetAudience};
use crate::store::UserDirectory;

pub struct AudienceResolver {
    users: Arc<dyn UserDirectory>,
}

impl AudienceResolver {
    pub fn new(users: Arc<dyn UserDirectory>) -> Self {
        Self { users }
    }

    /// 解析受众，查询失败时返回空列表
    #[instrument(skip(self, explicit), fields(audience = %audience, channel = %channel))]
    pub async fn resolve(
        &self,
        audience: TargetAudience,
        explicit: &[String],
        channel: Channel,
    ) -> Vec<Recipient> {
        match self.try_resolve(audience, explicit, channel).await {
            Ok(recipients) => {
                debug!(count = recipients.len(), "受众解析完成");
                recipients
            }
            Err(e) => {
                error!(error = %e, "受众解析失败，按空收件人处理");
                Vec::new()
            }
        }
    }

    /// 解析受众并返回查询错误
    ///
    /// 结果按用户 ID 去重，只保留在该渠道上可达且未关闭通知的用户。
    pub async fn try_resolve(
        &self,
        audience: TargetAudience,
        explicit: &[String],
        channel: Channel,
    ) -> Result<Vec<Recipient>> {
        let candidates = match audience {
            // all 与 users 当前返回同一集合
            TargetAudience::All | TargetAudience::Users => self.users.list_users().await?,
            TargetAudience::PremiumUsers => self.users.list_premium_users().await?,
            TargetAudience::Specific => {
                let emails = normalize_emails(explicit);
                if emails.is_empty() {
                    return Ok(Vec::new());
                }
                self.users.find_by_emails(&emails).await?
            }
        };

        Ok(eligible(candidates, channel))
    }
}

/// 去空白、转小写并去重，保留首次出现的顺序
fn normalize_emails(emails: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    emails
        .iter()
        .map(|e| e.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .filter(|e| seen.insert(e.clone()))
        .collect()
}

fn eligible(candidates: Vec<Recipient>, channel: Channel) -> Vec<Recipient> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|r| r.notifications_enabled && r.is_reachable_via(channel))
        .filter(|r| seen.insert(r.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MockUserDirectory;
    use petadmin_shared::error::PlatformError;
    use uuid::Uuid;

    fn user(email: &str, push_token: Option<&str>) -> Recipient {
        Recipient {
            id: Uuid::new_v4(),
            email: Some(email.to_string()),
            phone: None,
            push_token: push_token.map(String::from),
            notifications_enabled: true,
        }
    }

    #[tokio::test]
    async fn test_all_and_users_resolve_identically() {
        let a = user("a@pets.example", Some("tok-a"));
        let b = user("b@pets.example", None);
        let users = vec![a.clone(), b.clone()];

        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_users()
            .times(2)
            .returning(move || Ok(users.clone()));

        let resolver = AudienceResolver::new(Arc::new(directory));
        let all = resolver.resolve(TargetAudience::All, &[], Channel::Push).await;
        let registered = resolver.resolve(TargetAudience::Users, &[], Channel::Push).await;

        assert_eq!(all, vec![a]);
        assert_eq!(all, registered);
    }

    #[tokio::test]
    async fn test_duplicates_removed_by_id() {
        let a = user("a@pets.example", Some("tok-a"));
        let users = vec![a.clone(), a.clone(), a.clone()];

        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_premium_users()
            .returning(move || Ok(users.clone()));

        let resolver = AudienceResolver::new(Arc::new(directory));
        let recipients = resolver
            .resolve(TargetAudience::PremiumUsers, &[], Channel::Email)
            .await;

        assert_eq!(recipients.len(), 1);
        assert_eq!(recipients[0].id, a.id);
    }

    #[tokio::test]
    async fn test_opted_out_users_excluded() {
        let mut opted_out = user("quiet@pets.example", Some("tok"));
        opted_out.notifications_enabled = false;
        let users = vec![opted_out];

        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_users()
            .returning(move || Ok(users.clone()));

        let resolver = AudienceResolver::new(Arc::new(directory));
        let recipients = resolver.resolve(TargetAudience::All, &[], Channel::InApp).await;
        assert!(recipients.is_empty());
    }

    #[tokio::test]
    async fn test_specific_without_recipients_skips_lookup() {
        let mut directory = MockUserDirectory::new();
        directory.expect_find_by_emails().never();

        let resolver = AudienceResolver::new(Arc::new(directory));
        let blanks = vec!["  ".to_string(), String::new()];

        assert!(
            resolver
                .try_resolve(TargetAudience::Specific, &[], Channel::Email)
                .await
                .unwrap()
                .is_empty()
        );
        assert!(
            resolver
                .try_resolve(TargetAudience::Specific, &blanks, Channel::Email)
                .await
                .unwrap()
                .is_empty()
        );
    }

    #[tokio::test]
    async fn test_specific_normalizes_emails() {
        let a = user("a@pets.example", Some("tok-a"));
        let found = vec![a.clone()];

        let mut directory = MockUserDirectory::new();
        directory
            .expect_find_by_emails()
            .withf(|emails: &[String]| emails == ["a@pets.example".to_string()])
            .times(1)
            .returning(move |_| Ok(found.clone()));

        let resolver = AudienceResolver::new(Arc::new(directory));
        let explicit = vec![" A@Pets.Example ".to_string(), "a@pets.example".to_string()];
        let recipients = resolver
            .resolve(TargetAudience::Specific, &explicit, Channel::Push)
            .await;

        assert_eq!(recipients, vec![a]);
    }

    #[tokio::test]
    async fn test_lookup_failure_degrades_to_empty() {
        let mut directory = MockUserDirectory::new();
        directory
            .expect_list_users()
            .returning(|| Err(PlatformError::Database(sqlx::Error::PoolTimedOut)));

        let resolver = AudienceResolver::new(Arc::new(directory));
        let recipients = resolver.resolve(TargetAudience::Users, &[], Channel::Email).await;
        assert!(recipients.is_empty());

        assert!(
            resolver
                .try_resolve(TargetAudience::Users, &[], Channel::Email)
                .await
                .is_err()
        );
    }
}
