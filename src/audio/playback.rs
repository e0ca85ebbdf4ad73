use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use super::frame::{pcm_from_le_bytes, AudioParams};
use crate::error::SessionResult;

/// Default number of decoded chunks buffered ahead of the output callback
pub const DEFAULT_PLAYBACK_BUFFER_CHUNKS: usize = 32;

/// Hardware-facing half of the playback path.
///
/// `write` may suspend until the device has drained enough buffered audio;
/// that wait is the playback flow control.
#[async_trait::async_trait]
pub trait PlaybackSink: Send + Sync {
    /// Write interleaved samples to the output stream
    async fn write(&self, samples: Vec<i16>) -> SessionResult<()>;
}

/// Outcome of a single playback request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Played {
    Written,
    /// Length not a whole number of frames; dropped without touching the sink
    Rejected,
}

/// Validates raw PCM buffers and forwards them to a [`PlaybackSink`]
#[derive(Clone)]
pub struct PlaybackWriter {
    sink: Arc<dyn PlaybackSink>,
    params: AudioParams,
    played: Arc<AtomicU64>,
    rejected: Arc<AtomicU64>,
}

impl PlaybackWriter {
    pub fn new(sink: Arc<dyn PlaybackSink>, params: AudioParams) -> Self {
        Self {
            sink,
            params,
            played: Arc::new(AtomicU64::new(0)),
            rejected: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Play a raw little-endian PCM buffer.
    ///
    /// Malformed or empty buffers are dropped; only sink failures are errors.
    pub async fn play_pcm(&self, bytes: &[u8]) -> SessionResult<Played> {
        let samples = match pcm_from_le_bytes(bytes, self.params.channels) {
            Some(samples) if !samples.is_empty() => samples,
            _ => {
                debug!("Dropping PCM buffer of {} bytes", bytes.len());
                self.rejected.fetch_add(1, Ordering::Relaxed);
                return Ok(Played::Rejected);
            }
        };

        self.sink.write(samples).await?;
        self.played.fetch_add(1, Ordering::Relaxed);

        Ok(Played::Written)
    }

    pub fn played(&self) -> u64 {
        self.played.load(Ordering::Relaxed)
    }

    pub fn rejected(&self) -> u64 {
        self.rejected.load(Ordering::Relaxed)
    }
}
