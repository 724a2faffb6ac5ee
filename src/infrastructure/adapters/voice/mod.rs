//! Voice Adapters - 语音客户端实现

mod http_bridge_client;
mod reconnect;
mod simulated_voice_client;

pub use http_bridge_client::{HttpVoiceBridgeClient, HttpVoiceBridgeConfig};
pub use reconnect::ReconnectPolicy;
pub use simulated_voice_client::SimulatedVoiceClient;
