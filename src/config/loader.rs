//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（config.toml / config.local.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::{AppConfig, VoiceMode};

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["config", "config.local"];

/// 环境变量前缀
const ENV_PREFIX: &str = "KBOT";

/// 加载应用配置
///
/// # 环境变量示例
/// - `KBOT_SERVER__PORT=8080`
/// - `KBOT_VOICE__MODE=bridge`
/// - `KBOT_VOICE__TOKEN=...`
/// - `KBOT_QUEUE__DEFAULT_DESTINATION=123456789`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    build_config(config_path, None)
}

/// `env` 为 None 时读取进程环境变量
fn build_config(
    config_path: Option<&Path>,
    env: Option<config::Map<String, String>>,
) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 默认值（最低优先级）
    builder = builder
        .set_default("server.host", "0.0.0.0")?
        .set_default("server.port", 5060)?
        .set_default("database.path", "data/kbot.db")?
        .set_default("database.max_connections", 5)?
        .set_default("storage.media_dir", "data/media")?
        .set_default("storage.max_upload_size", 50 * 1024 * 1024)?
        .set_default("queue.idle_grace_ms", 30_000)?
        .set_default("queue.mailbox_capacity", 64)?
        .set_default("voice.mode", "simulated")?
        .set_default("voice.call_timeout_ms", 5_000)?
        .set_default("voice.join_timeout_ms", 30_000)?
        .set_default("voice.reconnect_attempts", 5)?
        .set_default("voice.reconnect_base_delay_ms", 500)?
        .set_default("voice.reconnect_max_delay_ms", 10_000)?
        .set_default("voice.simulated_default_duration_ms", 3_000)?
        .set_default("shutdown.deadline_secs", 10)?
        .set_default("shutdown.per_call_timeout_ms", 2_000)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 环境变量（最高优先级），层级分隔符为双下划线
    // 注意: 环境变量名会被转换为小写
    builder = builder.add_source(
        Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true)
            .source(env),
    );

    let config = builder.build()?;

    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    validate_config(&app_config)?;

    Ok(app_config)
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}

/// 验证配置有效性
fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("Server port cannot be 0"));
    }

    if config.database.path.is_empty() {
        return Err(invalid("Database path cannot be empty"));
    }

    if config.storage.max_upload_size == 0 {
        return Err(invalid("Max upload size cannot be 0"));
    }

    if config.queue.mailbox_capacity == 0 {
        return Err(invalid("Queue mailbox capacity cannot be 0"));
    }

    if let Some(destination) = &config.queue.default_destination {
        if crate::domain::queue::DestinationId::new(destination.as_str()).is_err() {
            return Err(invalid("Default destination must be 1-64 non-blank characters"));
        }
    }

    if config.voice.call_timeout_ms == 0 || config.voice.join_timeout_ms == 0 {
        return Err(invalid("Voice timeouts cannot be 0"));
    }

    if config.voice.reconnect_base_delay_ms > config.voice.reconnect_max_delay_ms {
        return Err(invalid("Reconnect base delay cannot exceed max delay"));
    }

    if config.voice.mode == VoiceMode::Bridge {
        if config.voice.bridge_url.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("Voice bridge URL is required in bridge mode"));
        }
        if config.voice.token.as_deref().map_or(true, str::is_empty) {
            return Err(invalid("Voice token is required in bridge mode"));
        }
    }

    if config.shutdown.deadline_secs == 0 {
        return Err(invalid("Shutdown deadline cannot be 0"));
    }

    Ok(())
}

/// 打印配置信息（用于启动时日志，凭证不输出）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Application Configuration ===");
    tracing::info!("Server: {}:{}", config.server.host, config.server.port);
    tracing::info!("Public Base URL: {}", config.server.public_base_url());
    tracing::info!("Database: {}", config.database.path);
    tracing::info!("Media Directory: {:?}", config.storage.media_dir);
    tracing::info!("Max Upload Size: {} bytes", config.storage.max_upload_size);
    tracing::info!(
        "Default Destination: {}",
        config.queue.default_destination.as_deref().unwrap_or("<none>")
    );
    tracing::info!("Idle Grace: {}ms", config.queue.idle_grace_ms);
    tracing::info!("Voice Mode: {}", config.voice.mode.as_str());
    if config.voice.mode == VoiceMode::Bridge {
        tracing::info!(
            "Voice Bridge: {}",
            config.voice.bridge_url.as_deref().unwrap_or_default()
        );
    }
    tracing::info!("Shutdown Deadline: {}s", config.shutdown.deadline_secs);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("=================================");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(vars: &[(&str, &str)]) -> Option<config::Map<String, String>> {
        Some(
            vars.iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    fn config_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_defaults_without_sources() {
        let file = config_file("");
        let config = build_config(Some(file.path()), env(&[])).unwrap();
        assert_eq!(config.server.port, 5060);
        assert_eq!(config.voice.mode, VoiceMode::Simulated);
        assert_eq!(config.queue.default_destination, None);
    }

    #[test]
    fn test_env_overrides_file() {
        let file = config_file(
            r#"
            [server]
            port = 7000

            [queue]
            default_destination = "lobby"
            "#,
        );
        let config = build_config(
            Some(file.path()),
            env(&[("KBOT_SERVER__PORT", "8080"), ("KBOT_QUEUE__IDLE_GRACE_MS", "1500")]),
        )
        .unwrap();

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.queue.idle_grace_ms, 1500);
        assert_eq!(config.queue.default_destination.as_deref(), Some("lobby"));
    }

    #[test]
    fn test_bridge_mode_requires_credentials() {
        let file = config_file("[voice]\nmode = \"bridge\"\n");
        let result = build_config(Some(file.path()), env(&[]));
        assert!(matches!(result, Err(ConfigError::ValidationError(_))));

        let config = build_config(
            Some(file.path()),
            env(&[
                ("KBOT_VOICE__BRIDGE_URL", "http://bridge:9000"),
                ("KBOT_VOICE__TOKEN", "secret"),
            ]),
        )
        .unwrap();
        assert_eq!(config.voice.mode, VoiceMode::Bridge);
    }

    #[test]
    fn test_unknown_voice_mode_fails_to_parse() {
        let file = config_file("[voice]\nmode = \"carrier-pigeon\"\n");
        let result = build_config(Some(file.path()), env(&[]));
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_validation_error_for_zero_port() {
        let mut config = AppConfig::default();
        config.server.port = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_blank_default_destination() {
        let mut config = AppConfig::default();
        config.queue.default_destination = Some("   ".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validation_error_for_inverted_backoff() {
        let mut config = AppConfig::default();
        config.voice.reconnect_base_delay_ms = 20_000;
        assert!(validate_config(&config).is_err());
    }
}
