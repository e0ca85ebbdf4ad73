//! Conversation session management
//!
//! This module provides the `SessionOrchestrator` that runs one duplex voice
//! conversation:
//! - Transport selection (SDK first, guarded fallback to raw)
//! - Speaker playback and microphone capture streams
//! - Frame producer and event consumer tasks, raced under one supervisor
//! - Deterministic teardown and a final statistics report

mod config;
mod consumer;
mod orchestrator;
mod producer;
#[allow(clippy::module_inception)]
mod session;
mod stats;

pub use config::{
    Credentials, SessionConfig, TransportPlan, TransportSettings, DEFAULT_EVI_URL, DEFAULT_INSTRUCTIONS,
};
pub use consumer::run_consumer;
pub use orchestrator::SessionOrchestrator;
pub use producer::run_producer;
pub use session::Session;
pub use stats::{EndReason, SessionCounters, SessionStats};
