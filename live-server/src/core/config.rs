/// 服务器配置 - 实时网关的所有配置项
///
/// # 环境变量
///
/// 所有配置项都可以通过环境变量覆盖：
///
/// | 环境变量 | 默认值 | 说明 |
/// |----------|--------|------|
/// | HTTP_PORT | 5000 | HTTP 服务端口 |
/// | LIVE_TCP_PORT | 5001 | 实时通道 TCP 端口 |
/// | CHANNEL_CAPACITY | 1024 | 广播通道容量 |
/// | ENVIRONMENT | development | 运行环境 |
/// | LOG_DIR | (无) | 日志目录，设置后写滚动日志文件 |
///
/// # 示例
///
/// ```ignore
/// HTTP_PORT=8080 LIVE_TCP_PORT=8081 cargo run
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP API 服务端口
    pub http_port: u16,
    /// 实时通道 TCP 端口 (用于会话直连)
    pub live_tcp_port: u16,
    /// 广播通道容量
    pub channel_capacity: usize,
    /// 运行环境: development | staging | production
    pub environment: String,
    /// 日志目录 (可选)
    pub log_dir: Option<String>,
}

impl Config {
    /// 从环境变量加载配置
    ///
    /// 如果环境变量未设置，使用默认值
    pub fn from_env() -> Self {
        Self {
            http_port: std::env::var("HTTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),
            live_tcp_port: std::env::var("LIVE_TCP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5001),
            channel_capacity: std::env::var("CHANNEL_CAPACITY")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(1024),
            environment: std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".into()),
            log_dir: std::env::var("LOG_DIR").ok(),
        }
    }

    /// 是否生产环境
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }

    /// 是否开发环境
    pub fn is_development(&self) -> bool {
        self.environment == "development"
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}
