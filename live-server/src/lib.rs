//! Live Server - QR 点餐平台的实时网关
//!
//! # 架构概述
//!
//! 本模块是实时网关的主入口，提供以下核心功能：
//!
//! - **房间总线** (`live`): 支持 TCP/Memory 传输的房间广播系统
//! - **事件处理** (`live::handler`): 下单与状态变更的服务端语义
//! - **HTTP API** (`api`): 健康检查与通道状态
//!
//! # 模块结构
//!
//! ```text
//! live-server/src/
//! ├── core/          # 配置、状态、启动
//! ├── live/          # 房间总线、事件处理、传输层
//! ├── api/           # HTTP 路由和处理器
//! └── utils/         # 错误、日志
//! ```

pub mod api;
pub mod core;
pub mod live;
pub mod utils;

// Re-export 公共类型
pub use core::{Config, Server, ServerState};
pub use live::{LiveHandler, MemoryTransport, RoomBus, TcpTransport, Transport, TransportConfig};
pub use utils::{AppError, AppResult};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// 设置运行环境 (dotenv + 日志)
pub fn setup_environment() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());

    Ok(())
}
