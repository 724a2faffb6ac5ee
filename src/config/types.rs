//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// 应用主配置
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,

    /// 数据库配置
    #[serde(default)]
    pub database: DatabaseConfig,

    /// 媒体存储配置
    #[serde(default)]
    pub storage: StorageConfig,

    /// 队列配置
    #[serde(default)]
    pub queue: QueueConfig,

    /// 语音客户端配置
    #[serde(default)]
    pub voice: VoiceConfig,

    /// 关闭流程配置
    #[serde(default)]
    pub shutdown: ShutdownConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 服务器配置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,

    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,

    /// 公开访问的 Base URL（语音桥从这里拉取媒体）
    /// 如果未设置，则使用 http://{host}:{port}
    #[serde(default)]
    pub base_url: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5060
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            base_url: None,
        }
    }
}

impl ServerConfig {
    /// 获取服务器地址
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// 获取公开的 Base URL
    pub fn public_base_url(&self) -> String {
        self.base_url
            .clone()
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| {
                let host = if self.host == "0.0.0.0" {
                    "localhost"
                } else {
                    &self.host
                };
                format!("http://{}:{}", host, self.port)
            })
    }
}

/// 数据库配置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// 数据库文件路径
    #[serde(default = "default_db_path")]
    pub path: String,

    /// 最大连接数
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/kbot.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

impl DatabaseConfig {
    /// 获取数据库 URL
    pub fn database_url(&self) -> String {
        format!("sqlite:{}?mode=rwc", self.path)
    }
}

/// 媒体存储配置
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// 上传音频存储目录
    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    /// 上传文件最大大小（字节），默认 50MB
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("data/media")
}

fn default_max_upload_size() -> u64 {
    50 * 1024 * 1024
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: default_media_dir(),
            max_upload_size: default_max_upload_size(),
        }
    }
}

/// 队列配置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueConfig {
    /// 上传未指定目的地时使用
    #[serde(default)]
    pub default_destination: Option<String>,

    /// 队列空闲后保持语音连接的时长（毫秒）
    #[serde(default = "default_idle_grace_ms")]
    pub idle_grace_ms: u64,

    /// 每个目的地的命令邮箱容量
    #[serde(default = "default_mailbox_capacity")]
    pub mailbox_capacity: usize,
}

fn default_idle_grace_ms() -> u64 {
    30_000
}

fn default_mailbox_capacity() -> usize {
    64
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            default_destination: None,
            idle_grace_ms: default_idle_grace_ms(),
            mailbox_capacity: default_mailbox_capacity(),
        }
    }
}

impl QueueConfig {
    pub fn idle_grace(&self) -> Duration {
        Duration::from_millis(self.idle_grace_ms)
    }
}

/// 语音客户端实现
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoiceMode {
    /// 进程内模拟播放（开发用）
    #[default]
    Simulated,
    /// 通过 HTTP 驱动外部语音桥
    Bridge,
}

impl VoiceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoiceMode::Simulated => "simulated",
            VoiceMode::Bridge => "bridge",
        }
    }
}

/// 语音客户端配置
#[derive(Debug, Clone, Deserialize)]
pub struct VoiceConfig {
    #[serde(default)]
    pub mode: VoiceMode,

    /// Bot 凭证（bridge 模式必填）
    #[serde(default)]
    pub token: Option<String>,

    /// 语音桥地址
    #[serde(default)]
    pub bridge_url: Option<String>,

    /// 单次请求超时（毫秒）
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    /// join 超时（毫秒），包含重试
    #[serde(default = "default_join_timeout_ms")]
    pub join_timeout_ms: u64,

    #[serde(default = "default_reconnect_attempts")]
    pub reconnect_attempts: u32,

    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,

    #[serde(default = "default_reconnect_max_delay_ms")]
    pub reconnect_max_delay_ms: u64,

    /// 模拟模式下没有时长估计时的播放时长（毫秒）
    #[serde(default = "default_simulated_duration_ms")]
    pub simulated_default_duration_ms: u64,
}

fn default_call_timeout_ms() -> u64 {
    5_000
}

fn default_join_timeout_ms() -> u64 {
    30_000
}

fn default_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    500
}

fn default_reconnect_max_delay_ms() -> u64 {
    10_000
}

fn default_simulated_duration_ms() -> u64 {
    3_000
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            mode: VoiceMode::default(),
            token: None,
            bridge_url: None,
            call_timeout_ms: default_call_timeout_ms(),
            join_timeout_ms: default_join_timeout_ms(),
            reconnect_attempts: default_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            reconnect_max_delay_ms: default_reconnect_max_delay_ms(),
            simulated_default_duration_ms: default_simulated_duration_ms(),
        }
    }
}

/// 关闭流程配置
#[derive(Debug, Clone, Deserialize)]
pub struct ShutdownConfig {
    /// 整个关闭流程的期限（秒）
    #[serde(default = "default_deadline_secs")]
    pub deadline_secs: u64,

    /// 关闭期间单次语音调用的超时（毫秒）
    #[serde(default = "default_per_call_timeout_ms")]
    pub per_call_timeout_ms: u64,
}

fn default_deadline_secs() -> u64 {
    10
}

fn default_per_call_timeout_ms() -> u64 {
    2_000
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            deadline_secs: default_deadline_secs(),
            per_call_timeout_ms: default_per_call_timeout_ms(),
        }
    }
}

impl ShutdownConfig {
    pub fn deadline(&self) -> Duration {
        Duration::from_secs(self.deadline_secs)
    }

    pub fn per_call_timeout(&self) -> Duration {
        Duration::from_millis(self.per_call_timeout_ms)
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否启用 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
