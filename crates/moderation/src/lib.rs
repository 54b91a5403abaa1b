//! 内容审核
//!
//! 根据举报指向的内容类型执行停用、启用或删除，并维护举报的审核状态。

pub mod dispatcher;
pub mod error;
pub mod models;
pub mod repository;
pub mod service;
pub mod store;
pub mod test_utils;

pub use dispatcher::ModerationDispatcher;
pub use error::{ModerationError, Result};
pub use service::{ModerationOutcome, ReportService, ReviewDecision};
