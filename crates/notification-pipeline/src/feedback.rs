//! 操作反馈
//!
//! 每个管理操作结束时向操作者报告成功或失败，调用方不消费返回值。

use tracing::{error, info};

pub trait Feedback: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

/// 仅写日志的反馈实现，用于命令行与后台任务
#[derive(Debug, Default, Clone)]
pub struct LogFeedback;

impl Feedback for LogFeedback {
    fn success(&self, message: &str) {
        info!(feedback = "success", "{message}");
    }

    fn error(&self, message: &str) {
        error!(feedback = "error", "{message}");
    }
}

/// 丢弃所有反馈
#[derive(Debug, Default, Clone)]
pub struct NoopFeedback;

impl Feedback for NoopFeedback {
    fn success(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
}
