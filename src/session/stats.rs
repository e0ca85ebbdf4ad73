use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::transport::TransportKind;

/// Why a session ended without error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// The remote side closed the conversation
    RemoteClosed,
    /// The capture stream stopped delivering frames
    CaptureEnded,
    /// Shutdown was requested by the caller
    Interrupted,
}

/// Counters updated by the session tasks
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub frames_sent: AtomicU64,
    pub events_passed: AtomicU64,
}

impl SessionCounters {
    pub fn frame_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn event_passed(&self) {
        self.events_passed.fetch_add(1, Ordering::Relaxed);
    }
}

/// Report returned when a session ends
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Transport the conversation ran on
    pub transport: TransportKind,

    /// Why the session ended
    pub end_reason: EndReason,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Total duration in seconds
    pub duration_secs: f64,

    /// Frames cut by the capture stream (enqueued or dropped)
    pub frames_captured: u64,

    /// Frames sent over the transport
    pub frames_sent: u64,

    /// Frames discarded because the queue was full
    pub frames_dropped: u64,

    /// PCM payloads written to the speaker
    pub payloads_played: u64,

    /// PCM payloads rejected for bad length
    pub payloads_rejected: u64,

    /// Non-audio events passed to listeners
    pub events_passed: u64,
}
