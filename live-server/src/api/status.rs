//! 实时通道状态路由
//!
//! # 路由列表
//!
//! | 路径 | 方法 | 说明 | 认证 |
//! |------|------|------|------|
//! | /api/live/status | GET | 连接与房间统计 | 无 |

use axum::{Json, Router, extract::State, routing::get};
use serde::Serialize;

use crate::core::ServerState;
use crate::live::ConnectedSession;
use shared::response::ApiResponse;

pub fn router() -> Router<ServerState> {
    Router::new().route("/live/status", get(live_status))
}

/// 实时通道状态响应
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatusData {
    /// 已连接会话数
    connected_sessions: usize,
    /// 当前房间数
    rooms: usize,
    /// 房间名列表 (开发环境排障用)
    #[serde(skip_serializing_if = "Option::is_none")]
    room_names: Option<Vec<String>>,
    /// 会话快照 (开发环境排障用)
    #[serde(skip_serializing_if = "Option::is_none")]
    sessions: Option<Vec<ConnectedSession>>,
}

/// 连接与房间统计
///
/// 生产环境不暴露房间名和会话明细，避免泄露租户标识。
pub async fn live_status(State(state): State<ServerState>) -> Json<ApiResponse<LiveStatusData>> {
    let (room_names, sessions) = if state.config.is_production() {
        (None, None)
    } else {
        (
            Some(state.bus.room_names()),
            Some(state.bus.connected_sessions()),
        )
    };

    Json(ApiResponse::ok(LiveStatusData {
        connected_sessions: state.bus.session_count(),
        rooms: state.bus.room_count(),
        room_names,
        sessions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Config;
    use shared::live::RoomScope;

    fn state_for(environment: &str) -> ServerState {
        let config = Config {
            http_port: 0,
            live_tcp_port: 0,
            channel_capacity: 16,
            environment: environment.to_string(),
            log_dir: None,
        };
        ServerState::initialize(&config)
    }

    #[tokio::test]
    async fn test_status_lists_sessions_outside_production() {
        let state = state_for("development");
        let (_session_tx, _client_tx) = state.bus.connect_memory("s1");
        state.bus.join("s1", &RoomScope::Restaurant("r1".to_string()));

        let Json(resp) = live_status(State(state)).await;
        let data = resp.data.unwrap();
        assert_eq!(data.connected_sessions, 1);
        assert_eq!(data.rooms, 1);
        assert_eq!(data.room_names.unwrap(), vec!["restaurant:r1".to_string()]);

        let sessions = data.sessions.unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0].id, "s1");
        // 内存会话没有对端地址
        assert_eq!(sessions[0].addr, None);
    }

    #[tokio::test]
    async fn test_status_hides_detail_in_production() {
        let state = state_for("production");
        let (_session_tx, _client_tx) = state.bus.connect_memory("s1");

        let Json(resp) = live_status(State(state)).await;
        let data = resp.data.unwrap();
        assert_eq!(data.connected_sessions, 1);
        assert!(data.room_names.is_none());
        assert!(data.sessions.is_none());
    }
}
