use anyhow::{Context, Result};
use serde::Deserialize;
use std::time::Duration;

use crate::audio::{AudioParams, DEFAULT_PLAYBACK_BUFFER_CHUNKS, DEFAULT_QUEUE_CAPACITY};
use crate::session::{Credentials, SessionConfig, TransportSettings, DEFAULT_EVI_URL, DEFAULT_INSTRUCTIONS};
use crate::transport::Keepalive;

/// Conventional environment variables and the keys they set
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("HUME_API_KEY", "hume.api_key"),
    ("HUME_SECRET_KEY", "hume.secret_key"),
    ("HUME_WS_URL", "hume.ws_url"),
    ("HUME_EVI_URL", "hume.evi_url"),
    ("HUME_CONFIG_ID", "hume.config_id"),
    ("HUME_VOICE_ID", "hume.voice_id"),
    ("HUME_DISABLE_SDK", "hume.disable_sdk"),
    ("HUME_FALLBACK_WS", "hume.fallback_ws"),
    ("AUDIO_OUTPUT_DEVICE", "audio.output_device"),
];

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub hume: HumeConfig,
    #[serde(default)]
    pub audio: AudioConfig,
    #[serde(default)]
    pub agent: AgentConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "duplex-voice".to_string(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct HumeConfig {
    pub api_key: Option<String>,
    pub secret_key: Option<String>,
    pub ws_url: Option<String>,
    pub evi_url: Option<String>,
    pub config_id: Option<String>,
    pub voice_id: Option<String>,
    #[serde(default)]
    pub disable_sdk: bool,
    #[serde(default)]
    pub fallback_ws: bool,
    pub keepalive_interval_secs: Option<u64>,
    pub keepalive_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub channels: u16,
    pub frame_ms: u32,
    pub output_device: Option<String>,
    pub queue_capacity: usize,
    pub playback_buffer_chunks: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        let params = AudioParams::default();
        Self {
            sample_rate: params.sample_rate,
            channels: params.channels,
            frame_ms: params.frame_ms,
            output_device: None,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            playback_buffer_chunks: DEFAULT_PLAYBACK_BUFFER_CHUNKS,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AgentConfig {
    pub instructions: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            instructions: Some(DEFAULT_INSTRUCTIONS.to_string()),
        }
    }
}

impl Config {
    /// Load from an optional file, then `DUPLEX__SECTION__KEY` variables,
    /// then the conventional `HUME_*` / `AUDIO_OUTPUT_DEVICE` variables.
    pub fn load(path: &str) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("DUPLEX").separator("__"));

        for (var, key) in ENV_OVERRIDES {
            let value = std::env::var(var).ok().filter(|v| !v.is_empty());
            builder = builder
                .set_override_option(*key, value)
                .with_context(|| format!("Failed to apply {}", var))?;
        }

        let settings = builder.build().context("Failed to build configuration")?;

        settings
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Explicit configuration value handed to the orchestrator
    pub fn session_config(&self) -> SessionConfig {
        let defaults = Keepalive::default();
        let keepalive = Keepalive {
            interval: self
                .hume
                .keepalive_interval_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.interval),
            timeout: self
                .hume
                .keepalive_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
        };

        SessionConfig {
            credentials: Credentials {
                api_key: self.hume.api_key.clone(),
                secret_key: self.hume.secret_key.clone(),
            },
            transport: TransportSettings {
                disable_sdk: self.hume.disable_sdk,
                fallback_to_raw: self.hume.fallback_ws,
                ws_url: self.hume.ws_url.clone(),
                evi_url: self
                    .hume
                    .evi_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_EVI_URL.to_string()),
                config_id: self.hume.config_id.clone(),
                voice_id: self.hume.voice_id.clone(),
                instructions: self.agent.instructions.clone(),
                keepalive,
            },
            audio: AudioParams {
                sample_rate: self.audio.sample_rate,
                channels: self.audio.channels,
                frame_ms: self.audio.frame_ms,
            },
            output_device: self.audio.output_device.clone(),
            queue_capacity: self.audio.queue_capacity,
            playback_buffer_chunks: self.audio.playback_buffer_chunks,
            ..SessionConfig::default()
        }
    }
}
