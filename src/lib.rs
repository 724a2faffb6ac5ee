//! KBot - 音频队列服务
//!
//! 接收桌面客户端上传的音频，按目的地排队，依次推送到聊天协议的实时语音频道。
//!
//! 架构设计: DDD + CQRS + Hexagonal Architecture
//!
//! 领域层 (domain/):
//! - Queue Context: 目的地队列聚合与播放状态机
//!
//! 应用层 (application/):
//! - Ports: QueueEngine, VoiceClient, MediaStorage, AudioProbe, Repository
//! - Commands: 上传与队列编辑
//! - Queries: 队列快照与媒体下载
//!
//! 基础设施层 (infrastructure/):
//! - Queue: 每个目的地一个 actor 的队列引擎
//! - HTTP: 上传、队列 API、语音桥回调与 WebSocket
//! - Persistence: SQLite 影子副本（崩溃恢复）
//! - Adapters: 文件媒体存储、symphonia 探测、语音客户端
//! - Events: WebSocket 事件发布
//! - Lifecycle: 有序关闭

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{load_config, AppConfig};
