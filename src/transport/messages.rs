use base64::Engine;
use serde_json::Value;
use tracing::debug;

use crate::audio::{AudioFrame, AudioParams, PCM_S16LE};

/// Session-opening parameters, sent once per transport
#[derive(Debug, Clone, PartialEq)]
pub struct Handshake {
    pub audio: AudioParams,
    /// Dialog configuration selecting model and voice on the service
    pub config_id: Option<String>,
    /// Target voice for voice-id based flows
    pub voice_id: Option<String>,
    /// Free-text instructions for the agent
    pub instructions: Option<String>,
}

/// One captured frame plus its encoding metadata
#[derive(Debug, Clone, PartialEq)]
pub struct AudioChunk {
    pub frame: AudioFrame,
    pub encoding: &'static str,
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioChunk {
    pub fn new(frame: AudioFrame) -> Self {
        Self {
            encoding: PCM_S16LE,
            sample_rate: frame.sample_rate,
            channels: frame.channels,
            frame,
        }
    }

    pub fn pcm_bytes(&self) -> Vec<u8> {
        self.frame.to_le_bytes()
    }

    pub fn pcm_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.pcm_bytes())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum OutboundMessage {
    Handshake(Handshake),
    AudioChunk(AudioChunk),
}

/// What the event consumer sees
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// Raw little-endian PCM ready for playback
    AudioPayload(Vec<u8>),
    /// Anything else (transcripts, control signals), passed through untouched
    OtherEvent(Value),
}

/// A data frame as it came off the wire
#[derive(Debug, Clone, PartialEq)]
pub enum WireMessage {
    Text(String),
    Binary(Vec<u8>),
}

/// Decode one wire message.
///
/// Binary frames are raw PCM. Text frames are JSON; an audio field is
/// base64-decoded into an [`InboundEvent::AudioPayload`], everything else
/// becomes [`InboundEvent::OtherEvent`]. Returns `None` for messages that
/// should be dropped (empty, unparseable, bad base64).
pub fn decode_inbound(message: WireMessage) -> Option<InboundEvent> {
    match message {
        WireMessage::Binary(bytes) if bytes.is_empty() => None,
        WireMessage::Binary(bytes) => Some(InboundEvent::AudioPayload(bytes)),
        WireMessage::Text(text) => {
            let value: Value = match serde_json::from_str(&text) {
                Ok(value) => value,
                Err(e) => {
                    debug!("Dropping undecodable text message: {}", e);
                    return None;
                }
            };

            match audio_field(&value) {
                Some(encoded) => match base64::engine::general_purpose::STANDARD.decode(encoded) {
                    Ok(pcm) => Some(InboundEvent::AudioPayload(pcm)),
                    Err(e) => {
                        debug!("Dropping message with invalid base64 audio: {}", e);
                        None
                    }
                },
                None => Some(InboundEvent::OtherEvent(value)),
            }
        }
    }
}

fn audio_field(value: &Value) -> Option<&str> {
    let obj = value.as_object()?;

    let candidate = obj
        .get("audio")
        .or_else(|| obj.get("audio_base64"))
        .or_else(|| match obj.get("type").and_then(Value::as_str) {
            Some("audio_output") => obj.get("data"),
            _ => None,
        })?;

    candidate.as_str().filter(|s| !s.is_empty())
}
