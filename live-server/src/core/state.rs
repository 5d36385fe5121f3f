use crate::core::Config;
use crate::live::{LiveHandler, RoomBus, TransportConfig};

/// 服务器状态 - 持有所有服务的共享引用
///
/// # 组件
///
/// | 字段 | 类型 | 说明 |
/// |------|------|------|
/// | config | Config | 配置项 (不可变) |
/// | bus | RoomBus | 房间总线 |
///
/// # 使用示例
///
/// ```ignore
/// let state = ServerState::initialize(&config);
/// state.start_background_tasks();
/// let sessions = state.bus.session_count();
/// ```
#[derive(Clone, Debug)]
pub struct ServerState {
    /// 服务器配置
    pub config: Config,
    /// 房间总线
    pub bus: RoomBus,
}

impl ServerState {
    /// 从配置初始化服务器状态
    pub fn initialize(config: &Config) -> Self {
        let bus = RoomBus::from_config(TransportConfig {
            tcp_listen_addr: format!("0.0.0.0:{}", config.live_tcp_port),
            channel_capacity: config.channel_capacity,
        });

        Self {
            config: config.clone(),
            bus,
        }
    }

    /// 启动后台任务 (事件处理器)
    pub fn start_background_tasks(&self) {
        let handler = LiveHandler::new(self.bus.clone());
        tokio::spawn(handler.run());
    }
}
