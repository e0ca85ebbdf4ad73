//! Vendor-managed EVI chat session.
//!
//! The dialog configuration id selects model and voice on the service side
//! and travels in the connection URL. The handshake is a `session_settings`
//! message describing the audio format; audio goes out as `audio_input` and
//! comes back as `audio_output`.

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::messages::{decode_inbound, AudioChunk, Handshake, InboundEvent, OutboundMessage};
use super::ws::{client_request, WsConnection};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use super::{Transport, TransportKind};
use crate::error::{SessionError, SessionResult};
use crate::session::SessionConfig;

/// EVI name for 16-bit little-endian PCM
const EVI_ENCODING: &str = "linear16";

#[derive(Debug, Serialize)]
pub struct SessionSettings<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub audio: EviAudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub struct EviAudioFormat {
    pub encoding: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
}

#[derive(Debug, Serialize)]
pub struct AudioInput {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub data: String,
}

impl<'a> From<&'a Handshake> for SessionSettings<'a> {
    fn from(handshake: &'a Handshake) -> Self {
        Self {
            kind: "session_settings",
            audio: EviAudioFormat {
                encoding: EVI_ENCODING,
                sample_rate: handshake.audio.sample_rate,
                channels: handshake.audio.channels,
            },
            system_prompt: handshake.instructions.as_deref(),
        }
    }
}

impl From<&AudioChunk> for AudioInput {
    fn from(chunk: &AudioChunk) -> Self {
        Self {
            kind: "audio_input",
            data: chunk.pcm_base64(),
        }
    }
}

pub fn encode(message: &OutboundMessage) -> SessionResult<String> {
    let encoded = match message {
        OutboundMessage::Handshake(handshake) => serde_json::to_string(&SessionSettings::from(handshake)),
        OutboundMessage::AudioChunk(chunk) => serde_json::to_string(&AudioInput::from(chunk)),
    };

    encoded.map_err(|e| SessionError::Transport(format!("failed to encode message: {}", e)))
}

/// Build the chat URL carrying the dialog configuration id
pub fn chat_url(base: &str, config_id: &str) -> SessionResult<String> {
    let mut url = url::Url::parse(base)
        .map_err(|e| SessionError::Config(format!("invalid EVI endpoint {}: {}", base, e)))?;
    url.query_pairs_mut().append_pair("config_id", config_id);

    Ok(url.into())
}

/// Upgrade request for the EVI chat endpoint
pub fn request(config: &SessionConfig) -> SessionResult<Request> {
    let (api_key, _) = config.credentials.require()?;
    let config_id = config
        .transport
        .config_id
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| SessionError::Config("SDK transport requires a dialog configuration id".to_string()))?;

    let url = chat_url(&config.transport.evi_url, config_id)?;
    client_request(&url, &[("x-hume-api-key", api_key.to_string())])
}

pub struct SdkTransport {
    conn: WsConnection,
    handshake_sent: AtomicBool,
}

impl SdkTransport {
    pub async fn connect(config: &SessionConfig) -> SessionResult<Self> {
        let conn = WsConnection::connect(request(config)?, config.transport.keepalive).await?;
        info!("SDK session opened");

        Ok(Self {
            conn,
            handshake_sent: AtomicBool::new(false),
        })
    }
}

#[async_trait::async_trait]
impl Transport for SdkTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Sdk
    }

    async fn send(&self, message: OutboundMessage) -> SessionResult<()> {
        if let OutboundMessage::Handshake(_) = &message {
            if self.handshake_sent.swap(true, Ordering::SeqCst) {
                return Err(SessionError::Transport("session settings already sent".to_string()));
            }
            debug!("Sending session settings");
        }

        self.conn.send_text(encode(&message)?).await
    }

    async fn receive(&self) -> SessionResult<Option<InboundEvent>> {
        while let Some(message) = self.conn.next_message().await? {
            if let Some(event) = decode_inbound(message) {
                return Ok(Some(event));
            }
        }

        Ok(None)
    }

    async fn close(&self) -> SessionResult<()> {
        self.conn.close().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::{AudioFrame, AudioParams};
    use serde_json::{json, Value};

    #[test]
    fn test_session_settings_shape() {
        let handshake = Handshake {
            audio: AudioParams::default(),
            config_id: Some("cfg".to_string()),
            voice_id: Some("ignored".to_string()),
            instructions: None,
        };

        let value: Value = serde_json::from_str(&encode(&OutboundMessage::Handshake(handshake)).unwrap()).unwrap();
        assert_eq!(
            value,
            json!({
                "type": "session_settings",
                "audio": { "encoding": "linear16", "sample_rate": 16000, "channels": 1 }
            })
        );
    }

    #[test]
    fn test_audio_input_shape() {
        let chunk = AudioChunk::new(AudioFrame::new(vec![0, 0], 16000, 1, 3));
        let value: Value = serde_json::from_str(&encode(&OutboundMessage::AudioChunk(chunk)).unwrap()).unwrap();
        assert_eq!(value, json!({ "type": "audio_input", "data": "AAAAAA==" }));
    }

    #[test]
    fn test_chat_url() {
        assert_eq!(
            chat_url("wss://api.hume.ai/v0/evi/chat", "abc").unwrap(),
            "wss://api.hume.ai/v0/evi/chat?config_id=abc"
        );
        assert_eq!(
            chat_url("wss://example.test/chat?verbose=true", "abc").unwrap(),
            "wss://example.test/chat?verbose=true&config_id=abc"
        );
    }

    #[test]
    fn test_chat_url_encodes_config_id() {
        let url = chat_url("wss://example.test/chat", "a&b #c").unwrap();
        assert_eq!(url, "wss://example.test/chat?config_id=a%26b+%23c");

        let parsed = url::Url::parse(&url).unwrap();
        let pairs: Vec<_> = parsed.query_pairs().collect();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].1, "a&b #c");
    }

    #[test]
    fn test_chat_url_rejects_bad_base() {
        assert!(matches!(chat_url("not a url", "abc"), Err(SessionError::Config(_))));
    }
}
