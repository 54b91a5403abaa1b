//! 审核分发
//!
//! 按被举报内容的类型执行停用、启用或删除，每次只对内容存储发起一次调用。
//! 失败时不修改举报记录本身。

use std::sync::Arc;

use petadmin_shared::observability::metrics::record_moderation_action;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{ModerationError, Result};
use crate::models::{ContentType, ModerationAction, ModerationOp, plan};
use crate::store::ContentStore;

pub struct ModerationDispatcher {
    content: Arc<dyn ContentStore>,
}

impl ModerationDispatcher {
    pub fn new(content: Arc<dyn ContentStore>) -> Self {
        Self { content }
    }

    /// 执行审核操作，返回实际执行的存储操作
    #[instrument(skip(self), fields(content_type = %content_type, action = %action))]
    pub async fn apply(
        &self,
        content_type: ContentType,
        content_id: Uuid,
        action: ModerationAction,
    ) -> Result<ModerationOp> {
        let op = plan(content_type, action);

        let outcome = match op {
            ModerationOp::Update(patch) => self.content.update_content(content_id, &patch).await,
            ModerationOp::Delete(target) => self.content.delete_content(target, content_id).await,
        };

        let result = match outcome {
            Ok(true) => Ok(op),
            Ok(false) => Err(ModerationError::ContentNotFound {
                content_type,
                id: content_id,
            }),
            Err(e) => Err(e.into()),
        };

        match &result {
            Ok(_) => {
                info!(content_id = %content_id, ?op, "审核操作已执行");
                record_moderation_action(content_type.as_str(), action.as_str(), "success");
            }
            Err(e) => {
                warn!(content_id = %content_id, error = %e, "审核操作失败");
                record_moderation_action(content_type.as_str(), action.as_str(), "failed");
            }
        }

        result
    }
}
