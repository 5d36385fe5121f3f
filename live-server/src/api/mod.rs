//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`status`] - 实时通道状态

pub mod health;
pub mod status;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

/// Build the HTTP router
pub fn router(state: ServerState) -> Router {
    Router::new()
        .nest("/api", health::router().merge(status::router()))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
