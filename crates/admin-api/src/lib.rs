//! 宠物社区管理后台 API（B端）
//!
//! 提供通知管理与举报处理的 REST API。
//!
//! ## 模块结构
//!
//! - `dto`: 请求和响应的数据传输对象
//! - `error`: 错误类型定义
//! - `handlers`: HTTP 请求处理器
//! - `routes`: 路由配置
//! - `state`: 应用状态
//!
//! ## 技术栈
//!
//! - Web 框架：Axum
//! - 数据验证：validator
//! - 序列化：serde (camelCase)

use axum::{Json, Router, routing::get};

pub mod dto;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::{AdminError, Result};
pub use state::AppState;

/// 构建完整应用路由（不含中间件层）
pub fn app(state: AppState) -> Router {
    Router::new()
        .nest("/api/admin", routes::api_routes())
        .route("/health", get(health_check))
        .with_state(state)
}

/// 存活探针：服务进程正常即返回 ok
async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "admin-api"
    }))
}
