//! HTTP 请求处理器模块

pub mod notification;
pub mod report;
