//! 数据库仓储层
//!
//! 记录存储 trait 的 PostgreSQL 实现。
//!
//! - 仓储只负责数据持久化，不包含业务逻辑
//! - 不提供事务与分页，读改写不加锁

mod inbox_repo;
mod notification_repo;
mod user_repo;

pub use inbox_repo::InboxRepository;
pub use notification_repo::NotificationRepository;
pub use user_repo::UserRepository;
