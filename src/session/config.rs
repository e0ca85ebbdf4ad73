use std::fmt;

use crate::audio::{AudioParams, DEFAULT_PLAYBACK_BUFFER_CHUNKS, DEFAULT_QUEUE_CAPACITY};
use crate::error::{SessionError, SessionResult};
use crate::transport::{raw, sdk, Handshake, Keepalive, TransportKind};

/// Default EVI chat endpoint
pub const DEFAULT_EVI_URL: &str = "wss://api.hume.ai/v0/evi/chat";

/// Default agent instructions sent in the handshake
pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant. Keep responses concise.";

#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
}

impl Credentials {
    /// Both keys, or a configuration error naming what is missing
    pub fn require(&self) -> SessionResult<(&str, &str)> {
        let api_key = self.api_key.as_deref().filter(|k| !k.is_empty());
        let secret_key = self.secret_key.as_deref().filter(|k| !k.is_empty());

        match (api_key, secret_key) {
            (Some(api), Some(secret)) => Ok((api, secret)),
            (None, _) => Err(SessionError::Config("missing API key".to_string())),
            (_, None) => Err(SessionError::Config("missing secret key".to_string())),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mask = |key: &Option<String>| if key.is_some() { "<set>" } else { "<unset>" };
        f.debug_struct("Credentials")
            .field("api_key", &mask(&self.api_key))
            .field("secret_key", &mask(&self.secret_key))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct TransportSettings {
    /// Never use the SDK transport, even with a dialog configuration id
    pub disable_sdk: bool,
    /// Retry on the raw transport when the SDK transport cannot be established
    pub fallback_to_raw: bool,
    /// Raw transport endpoint
    pub ws_url: Option<String>,
    /// SDK (EVI chat) endpoint
    pub evi_url: String,
    /// Dialog configuration id
    pub config_id: Option<String>,
    /// Target voice id
    pub voice_id: Option<String>,
    /// Agent instructions
    pub instructions: Option<String>,
    pub keepalive: Keepalive,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            disable_sdk: false,
            fallback_to_raw: false,
            ws_url: None,
            evi_url: DEFAULT_EVI_URL.to_string(),
            config_id: None,
            voice_id: None,
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
            keepalive: Keepalive::default(),
        }
    }
}

/// Which transports to try, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportPlan {
    /// SDK first; raw afterwards only if `fallback` is set
    SdkFirst { fallback: bool },
    RawOnly,
}

impl TransportPlan {
    pub fn first(&self) -> TransportKind {
        match self {
            TransportPlan::SdkFirst { .. } => TransportKind::Sdk,
            TransportPlan::RawOnly => TransportKind::Raw,
        }
    }
}

/// Everything the orchestrator needs for one conversation
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Session identifier used in logs and reports
    pub session_id: String,

    pub credentials: Credentials,

    pub transport: TransportSettings,

    /// Audio format for both directions
    pub audio: AudioParams,

    /// Output device: index, name fragment, or `None` for the default
    pub output_device: Option<String>,

    /// Frames held between capture and the producer
    pub queue_capacity: usize,

    /// Decoded chunks buffered ahead of the speaker
    pub playback_buffer_chunks: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_id: format!("session-{}", uuid::Uuid::new_v4()),
            credentials: Credentials::default(),
            transport: TransportSettings::default(),
            audio: AudioParams::default(),
            output_device: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            playback_buffer_chunks: DEFAULT_PLAYBACK_BUFFER_CHUNKS,
        }
    }
}

impl SessionConfig {
    /// Check everything that must hold before any stream opens
    pub fn validate(&self) -> SessionResult<TransportPlan> {
        self.credentials.require()?;

        if self.audio.sample_rate == 0 || self.audio.channels == 0 || self.audio.frame_samples() == 0 {
            return Err(SessionError::Config(format!(
                "invalid audio parameters: {}Hz, {} channels, {}ms frames",
                self.audio.sample_rate, self.audio.channels, self.audio.frame_ms
            )));
        }

        let plan = self.transport_plan();
        if plan == TransportPlan::RawOnly && self.transport.ws_url.is_none() {
            return Err(SessionError::Config(
                "no dialog configuration id and no WebSocket endpoint configured".to_string(),
            ));
        }

        // Endpoints and header values are checked here so connecting can
        // only fail for network reasons
        match plan {
            TransportPlan::RawOnly => {
                raw::request(self)?;
            }
            TransportPlan::SdkFirst { fallback } => {
                sdk::request(self)?;
                if fallback && self.transport.ws_url.is_some() {
                    raw::request(self)?;
                }
            }
        }

        Ok(plan)
    }

    pub fn transport_plan(&self) -> TransportPlan {
        let has_config_id = self.transport.config_id.as_deref().is_some_and(|id| !id.is_empty());

        if has_config_id && !self.transport.disable_sdk {
            TransportPlan::SdkFirst {
                fallback: self.transport.fallback_to_raw,
            }
        } else {
            TransportPlan::RawOnly
        }
    }

    pub fn handshake(&self) -> Handshake {
        Handshake {
            audio: self.audio,
            config_id: self.transport.config_id.clone(),
            voice_id: self.transport.voice_id.clone(),
            instructions: self.transport.instructions.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_credentials() -> SessionConfig {
        SessionConfig {
            credentials: Credentials {
                api_key: Some("key".to_string()),
                secret_key: Some("secret".to_string()),
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_missing_credentials() {
        let config = SessionConfig::default();
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));

        let mut config = with_credentials();
        config.credentials.secret_key = Some(String::new());
        assert!(matches!(config.validate(), Err(SessionError::Config(msg)) if msg.contains("secret")));
    }

    #[test]
    fn test_config_id_selects_sdk() {
        let mut config = with_credentials();
        config.transport.config_id = Some("cfg".to_string());
        assert_eq!(config.validate().unwrap(), TransportPlan::SdkFirst { fallback: false });

        config.transport.fallback_to_raw = true;
        assert_eq!(config.validate().unwrap(), TransportPlan::SdkFirst { fallback: true });
    }

    #[test]
    fn test_disabled_sdk_goes_raw() {
        let mut config = with_credentials();
        config.transport.config_id = Some("cfg".to_string());
        config.transport.disable_sdk = true;
        config.transport.ws_url = Some("ws://localhost:9000".to_string());
        assert_eq!(config.validate().unwrap(), TransportPlan::RawOnly);
    }

    #[test]
    fn test_raw_without_endpoint_fails_fast() {
        let config = with_credentials();
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_malformed_endpoints_fail_validation() {
        let mut config = with_credentials();
        config.transport.ws_url = Some("not a url".to_string());
        assert!(matches!(config.validate(), Err(SessionError::Config(msg)) if msg.contains("invalid endpoint")));

        let mut config = with_credentials();
        config.transport.config_id = Some("cfg".to_string());
        config.transport.evi_url = "not a url".to_string();
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));

        // The raw endpoint is checked up front when fallback may need it
        let mut config = with_credentials();
        config.transport.config_id = Some("cfg".to_string());
        config.transport.fallback_to_raw = true;
        config.transport.ws_url = Some("bad endpoint".to_string());
        assert!(matches!(config.validate(), Err(SessionError::Config(_))));
    }

    #[test]
    fn test_unsendable_credential_fails_validation() {
        let mut config = with_credentials();
        config.transport.ws_url = Some("ws://localhost:9000".to_string());
        config.credentials.secret_key = Some("line\nbreak".to_string());
        assert!(matches!(config.validate(), Err(SessionError::Config(msg)) if msg.contains("header")));
    }

    #[test]
    fn test_credentials_debug_is_masked() {
        let config = with_credentials();
        let debug = format!("{:?}", config.credentials);
        assert!(!debug.contains("secret\""));
        assert!(debug.contains("<set>"));
    }

    #[test]
    fn test_handshake_carries_identifiers() {
        let mut config = with_credentials();
        config.transport.config_id = Some("cfg".to_string());
        config.transport.voice_id = Some("voice".to_string());

        let handshake = config.handshake();
        assert_eq!(handshake.config_id.as_deref(), Some("cfg"));
        assert_eq!(handshake.voice_id.as_deref(), Some("voice"));
        assert_eq!(handshake.instructions.as_deref(), Some(DEFAULT_INSTRUCTIONS));
        assert_eq!(handshake.audio.frame_samples(), 320);
    }
}
