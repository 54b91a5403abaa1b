//! 数据库仓储层
//!
//! 审核相关记录存储的 PostgreSQL 实现

mod content_repo;
mod report_repo;

pub use content_repo::ContentRepository;
pub use report_repo::ReportRepository;
