//! KBot - 音频队列服务
//!
//! 启动顺序：配置 → 日志 → 存储 → 语音客户端 → 队列引擎（恢复待播条目）→
//! HTTP 与语音连接并行启动；收到 SIGINT/SIGTERM 后执行有序关闭。

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use kbot::application::{VoiceClientPort, VoiceEventSink};
use kbot::config::{load_config, print_config, AppConfig, LogConfig, VoiceConfig, VoiceMode};
use kbot::domain::queue::DestinationId;
use kbot::infrastructure::adapters::{
    FileMediaStorage, HttpVoiceBridgeClient, HttpVoiceBridgeConfig, ReconnectPolicy,
    SimulatedVoiceClient, SymphoniaProbe,
};
use kbot::infrastructure::events::EventPublisher;
use kbot::infrastructure::http::{AppState, HttpOptions, HttpServer, ServerConfig};
use kbot::infrastructure::lifecycle::{shutdown_signal, ShutdownCoordinator};
use kbot::infrastructure::persistence::{
    create_pool, run_migrations, DatabaseConfig, SqliteQueueEntryRepository,
};
use kbot::infrastructure::queue::{QueueEngine, QueueEngineConfig};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// 语音事件通道容量
const VOICE_EVENT_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置（优先级：环境变量 > 配置文件 > 默认值）
    let config = load_config().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    init_tracing(&config.log);

    tracing::info!("KBot queue server v{}", env!("CARGO_PKG_VERSION"));
    print_config(&config);

    // 确保数据目录存在
    tokio::fs::create_dir_all(&config.storage.media_dir)
        .await
        .context("Failed to create media directory")?;
    if let Some(parent) = std::path::Path::new(&config.database.path).parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .context("Failed to create database directory")?;
    }

    // 初始化数据库
    let db_config = DatabaseConfig::new(&config.database.path, config.database.max_connections);
    let pool = create_pool(&db_config).await.context("SQLite is unreachable")?;
    run_migrations(&pool).await.context("Failed to run migrations")?;

    let repository = Arc::new(SqliteQueueEntryRepository::new(pool.clone()));
    let media_storage = Arc::new(
        FileMediaStorage::new(&config.storage.media_dir)
            .await
            .context("Failed to open media storage")?,
    );
    let audio_probe = Arc::new(SymphoniaProbe::new());
    let event_publisher = EventPublisher::new().arc();

    // 语音客户端事件经由 mpsc 通道进入队列引擎
    let (voice_tx, voice_rx) = mpsc::channel(VOICE_EVENT_CAPACITY);
    let voice = build_voice_client(&config, voice_tx.clone())?;

    let engine_config = QueueEngineConfig {
        idle_grace: config.queue.idle_grace(),
        mailbox_capacity: config.queue.mailbox_capacity,
        // 同一超时约束正常运行和关闭期间的每次语音调用
        call_timeout: Duration::from_millis(config.voice.call_timeout_ms)
            .min(config.shutdown.per_call_timeout()),
        join_timeout: Duration::from_millis(config.voice.join_timeout_ms),
    };
    let engine = QueueEngine::new(
        engine_config,
        voice.clone(),
        repository,
        media_storage.clone(),
        event_publisher.clone(),
    )
    .arc();

    // 崩溃恢复：只恢复为待播，不自动开始播放
    let restored = engine
        .restore_pending()
        .await
        .context("Failed to restore pending entries")?;
    tracing::info!(restored, "Pending entries restored");

    let cancel = CancellationToken::new();
    tokio::spawn(engine.clone().run_event_loop(voice_rx, cancel.clone()));

    // 创建 HTTP 服务器
    let default_destination = config
        .queue
        .default_destination
        .as_deref()
        .map(DestinationId::new)
        .transpose()
        .map_err(|e| anyhow::anyhow!("Invalid default destination: {}", e))?;
    let state = AppState::new(
        engine.clone(),
        media_storage,
        audio_probe,
        event_publisher,
        voice_tx,
        HttpOptions {
            default_destination,
            max_upload_size: config.storage.max_upload_size,
        },
    );
    let server = HttpServer::new(
        ServerConfig::new(&config.server.host, config.server.port),
        state,
    );
    let listener = server.bind().await.context("Failed to bind HTTP listener")?;
    let http_task = tokio::spawn(server.serve(listener, cancel.clone()));

    // 语音客户端与 HTTP 并行启动，连接失败不影响上传
    let connecting = voice.clone();
    tokio::spawn(async move {
        match connecting.connect().await {
            Ok(()) => tracing::info!("Voice client connected"),
            Err(e) => tracing::error!(error = %e, "Voice client failed to connect"),
        }
    });

    shutdown_signal().await;

    let report = ShutdownCoordinator::new(
        engine,
        voice,
        cancel,
        config.shutdown.deadline(),
        config.shutdown.per_call_timeout(),
    )
    .with_pool(pool)
    .with_http_task(http_task)
    .run()
    .await;

    if !report.is_complete() {
        tracing::warn!("Shutdown finished with abandoned work");
    }
    tracing::info!("Server shutdown complete");

    Ok(())
}

/// 初始化日志，`RUST_LOG` 优先于配置
fn init_tracing(log: &LogConfig) {
    let default_filter = format!("{},kbot={},tower_http=debug", log.level, log.level);
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));

    if log.json {
        tracing_subscriber::fmt().json().with_env_filter(filter).init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

fn build_voice_client(
    config: &AppConfig,
    events: VoiceEventSink,
) -> anyhow::Result<Arc<dyn VoiceClientPort>> {
    let voice = &config.voice;

    match voice.mode {
        VoiceMode::Simulated => Ok(Arc::new(
            SimulatedVoiceClient::new(
                events,
                Duration::from_millis(voice.simulated_default_duration_ms),
            )
            .with_reconnect(reconnect_policy(voice)),
        )),
        VoiceMode::Bridge => {
            // 语音桥通过 HTTP 回调上报事件，sink 只由 HTTP 层使用
            drop(events);

            let bridge_config = HttpVoiceBridgeConfig {
                bridge_url: voice.bridge_url.clone().unwrap_or_default(),
                token: voice.token.clone().unwrap_or_default(),
                media_base_url: config.server.public_base_url(),
                request_timeout: Duration::from_millis(voice.call_timeout_ms),
                reconnect: reconnect_policy(voice),
            };
            let client = HttpVoiceBridgeClient::new(bridge_config)
                .map_err(|e| anyhow::anyhow!("Failed to create voice bridge client: {}", e))?;
            Ok(Arc::new(client))
        }
    }
}

fn reconnect_policy(voice: &VoiceConfig) -> ReconnectPolicy {
    ReconnectPolicy::new(
        voice.reconnect_attempts,
        Duration::from_millis(voice.reconnect_base_delay_ms),
        Duration::from_millis(voice.reconnect_max_delay_ms),
    )
}
