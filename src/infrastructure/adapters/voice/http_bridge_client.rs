//! HTTP Voice Bridge Client - 通过 HTTP 驱动外部语音桥
//!
//! 语音桥 API（均携带 `Authorization: Bot <token>`）:
//! GET  {bridge}/health
//! POST {bridge}/voice/{destination_id}/join
//! POST {bridge}/voice/{destination_id}/play   {"session_id", "entry_id", "title", "duration_ms", "media_url"}
//! POST {bridge}/voice/{destination_id}/stop
//! POST {bridge}/voice/{destination_id}/leave
//! POST {bridge}/voice/disconnect
//!
//! 语音桥从 `{media_url}` 拉取音频，播放结果回调 `POST /api/voice/events`

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;

use super::ReconnectPolicy;
use crate::application::ports::{PlayRequest, VoiceClientError, VoiceClientPort};
use crate::domain::queue::{DestinationId, EntryId, SessionId};

/// 播放请求体 (JSON)
#[derive(Debug, Serialize)]
struct BridgePlayRequest<'a> {
    session_id: SessionId,
    entry_id: EntryId,
    title: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration_ms: Option<u64>,
    media_url: String,
}

/// HTTP 语音桥客户端配置
#[derive(Debug, Clone)]
pub struct HttpVoiceBridgeConfig {
    /// 语音桥基础 URL
    pub bridge_url: String,
    /// bot 凭证
    pub token: String,
    /// 本服务对语音桥可见的基础 URL（媒体下载）
    pub media_base_url: String,
    /// 单次请求超时
    pub request_timeout: Duration,
    pub reconnect: ReconnectPolicy,
}

/// HTTP 语音桥客户端
pub struct HttpVoiceBridgeClient {
    client: Client,
    config: HttpVoiceBridgeConfig,
}

impl HttpVoiceBridgeClient {
    pub fn new(config: HttpVoiceBridgeConfig) -> Result<Self, VoiceClientError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| VoiceClientError::NetworkError(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn base(&self) -> &str {
        self.config.bridge_url.trim_end_matches('/')
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base())
    }

    fn voice_url(&self, destination_id: &DestinationId, action: &str) -> String {
        format!("{}/voice/{}/{}", self.base(), destination_id, action)
    }

    fn media_url(&self, entry_id: EntryId) -> String {
        format!(
            "{}/api/media/{}",
            self.config.media_base_url.trim_end_matches('/'),
            entry_id
        )
    }

    fn auth_header(&self) -> String {
        format!("Bot {}", self.config.token)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<(), VoiceClientError> {
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(map_status(status, body))
    }

    async fn post_action(
        &self,
        destination_id: &DestinationId,
        action: &str,
    ) -> Result<(), VoiceClientError> {
        self.send(self.client.post(self.voice_url(destination_id, action)))
            .await
    }
}

fn map_transport_error(e: reqwest::Error) -> VoiceClientError {
    if e.is_timeout() {
        VoiceClientError::Timeout
    } else if e.is_connect() {
        VoiceClientError::Unavailable(format!("Cannot connect to voice bridge: {}", e))
    } else {
        VoiceClientError::NetworkError(e.to_string())
    }
}

fn map_status(status: StatusCode, body: String) -> VoiceClientError {
    let message = format!("HTTP {}: {}", status, body);
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        VoiceClientError::Unavailable(message)
    } else {
        VoiceClientError::Rejected(message)
    }
}

#[async_trait]
impl VoiceClientPort for HttpVoiceBridgeClient {
    async fn connect(&self) -> Result<(), VoiceClientError> {
        self.config
            .reconnect
            .run("connect", || self.send(self.client.get(self.health_url())))
            .await?;

        tracing::info!(bridge_url = %self.base(), "Connected to voice bridge");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), VoiceClientError> {
        self.send(self.client.post(format!("{}/voice/disconnect", self.base())))
            .await?;

        tracing::info!(bridge_url = %self.base(), "Disconnected from voice bridge");
        Ok(())
    }

    async fn join(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.config
            .reconnect
            .run("join", || self.post_action(destination_id, "join"))
            .await?;

        tracing::debug!(destination_id = %destination_id, "Joined voice channel");
        Ok(())
    }

    async fn play(&self, request: PlayRequest) -> Result<(), VoiceClientError> {
        let body = BridgePlayRequest {
            session_id: request.session_id,
            entry_id: request.entry_id,
            title: &request.title,
            duration_ms: request.duration_ms,
            media_url: self.media_url(request.entry_id),
        };

        tracing::debug!(
            destination_id = %request.destination_id,
            session_id = %request.session_id,
            media_url = %body.media_url,
            "Sending play request"
        );

        self.send(
            self.client
                .post(self.voice_url(&request.destination_id, "play"))
                .json(&body),
        )
        .await
    }

    async fn stop(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.post_action(destination_id, "stop").await
    }

    async fn leave(&self, destination_id: &DestinationId) -> Result<(), VoiceClientError> {
        self.post_action(destination_id, "leave").await
    }
}
