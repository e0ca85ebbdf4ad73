// Raw message protocol over a WebSocket the engine fully controls

use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::messages::{decode_inbound, AudioChunk, Handshake, InboundEvent, OutboundMessage};
use super::ws::{client_request, WsConnection};
use tokio_tungstenite::tungstenite::handshake::client::Request;
use super::{Transport, TransportKind};
use crate::audio::PCM_S16LE;
use crate::error::{SessionError, SessionResult};
use crate::session::SessionConfig;

/// Handshake frame: `{ type: "config", audio: {...}, config_id, voice_id, agent }`
#[derive(Debug, Serialize)]
pub struct ConfigMessage<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub audio: AudioFormat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice_id: Option<&'a str>,
    pub agent: AgentSettings<'a>,
}

#[derive(Debug, Serialize)]
pub struct AudioFormat {
    pub encoding: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
}

#[derive(Debug, Serialize)]
pub struct AgentSettings<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub instructions: Option<&'a str>,
}

/// Audio frame: `{ type: "audio_in", audio: <base64>, encoding, sample_rate, channels }`
#[derive(Debug, Serialize)]
pub struct AudioInMessage {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub audio: String,
    pub encoding: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
}

impl<'a> From<&'a Handshake> for ConfigMessage<'a> {
    fn from(handshake: &'a Handshake) -> Self {
        Self {
            kind: "config",
            audio: AudioFormat {
                encoding: PCM_S16LE,
                sample_rate: handshake.audio.sample_rate,
                channels: handshake.audio.channels,
                frame_ms: handshake.audio.frame_ms,
            },
            config_id: handshake.config_id.as_deref(),
            voice_id: handshake.voice_id.as_deref(),
            agent: AgentSettings {
                instructions: handshake.instructions.as_deref(),
            },
        }
    }
}

impl From<&AudioChunk> for AudioInMessage {
    fn from(chunk: &AudioChunk) -> Self {
        Self {
            kind: "audio_in",
            audio: chunk.pcm_base64(),
            encoding: chunk.encoding,
            sample_rate: chunk.sample_rate,
            channels: chunk.channels,
        }
    }
}

/// Encode an outbound message as a JSON text frame
pub fn encode(message: &OutboundMessage) -> SessionResult<String> {
    let encoded = match message {
        OutboundMessage::Handshake(handshake) => serde_json::to_string(&ConfigMessage::from(handshake)),
        OutboundMessage::AudioChunk(chunk) => serde_json::to_string(&AudioInMessage::from(chunk)),
    };

    encoded.map_err(|e| SessionError::Transport(format!("failed to encode message: {}", e)))
}

pub struct RawTransport {
    conn: WsConnection,
    handshake_sent: AtomicBool,
}

/// Upgrade request for the raw endpoint, with bearer and secret headers
pub fn request(config: &SessionConfig) -> SessionResult<Request> {
    let (api_key, secret_key) = config.credentials.require()?;
    let url = config
        .transport
        .ws_url
        .as_deref()
        .ok_or_else(|| SessionError::Config("raw transport requires a WebSocket endpoint".to_string()))?;

    let headers = [
        ("authorization", format!("Bearer {}", api_key)),
        ("x-hume-secret-key", secret_key.to_string()),
    ];

    client_request(url, &headers)
}

impl RawTransport {
    pub async fn connect(config: &SessionConfig) -> SessionResult<Self> {
        let conn = WsConnection::connect(request(config)?, config.transport.keepalive).await?;
        info!("Raw transport connected");

        Ok(Self {
            conn,
            handshake_sent: AtomicBool::new(false),
        })
    }
}

#[async_trait::async_trait]
impl Transport for RawTransport {
    fn kind(&self) -> TransportKind {
        TransportKind::Raw
    }

    async fn send(&self, message: OutboundMessage) -> SessionResult<()> {
        if let OutboundMessage::Handshake(_) = &message {
            if self.handshake_sent.swap(true, Ordering::SeqCst) {
                return Err(SessionError::Transport("handshake already sent".to_string()));
            }
            debug!("Sending config handshake");
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
