//! 通知发送管道
//!
//! 受众解析 → 渠道分发 → 投递统计，以及围绕它的通知生命周期管理。
//!
//! ## 模块
//!
//! - `audience`: 将目标受众解析为去重后的收件人
//! - `dispatcher`: 按渠道执行投递（邮件/短信批量调用，站内信/推送逐人写入）
//! - `accountant`: 维护通知状态与计数
//! - `service`: 管理员操作入口
//! - `repository`: 记录存储的 PostgreSQL 实现

pub mod accountant;
pub mod audience;
pub mod dispatcher;
pub mod error;
pub mod feedback;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;
pub mod test_utils;
pub mod transport;

pub use accountant::DeliveryAccountant;
pub use audience::AudienceResolver;
pub use dispatcher::{ChannelDispatcher, DispatchResult};
pub use error::{NotificationError, Result};
pub use feedback::{Feedback, LogFeedback};
pub use service::{NotificationService, SendOutcome};
