//! HTTP Handlers

mod media;
mod ping;
mod queue;
mod upload;
mod voice_events;
mod websocket;

pub use media::*;
pub use ping::*;
pub use queue::*;
pub use upload::*;
pub use voice_events::*;
pub use websocket::*;
