use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::stats::SessionCounters;
use crate::audio::FrameReceiver;
use crate::error::SessionResult;
use crate::transport::{AudioChunk, OutboundMessage, Transport};

/// Forward captured frames to the transport, in capture order.
///
/// Returns `Ok(())` when cancelled or when the capture side has gone away;
/// any send failure is returned as-is.
pub async fn run_producer(
    mut frames: FrameReceiver,
    transport: Arc<dyn Transport>,
    counters: Arc<SessionCounters>,
    cancel: CancellationToken,
) -> SessionResult<()> {
    info!("Frame producer started ({} transport)", transport.kind());

    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = frames.recv() => match frame {
                Some(frame) => frame,
                None => {
                    info!("Capture queue closed");
                    break;
                }
            },
        };

        let sequence = frame.sequence;
        let message = OutboundMessage::AudioChunk(AudioChunk::new(frame));

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = transport.send(message) => sent?,
        }

        counters.frame_sent();
        debug!("Sent frame {}", sequence);
    }

    info!("Frame producer stopped");

    Ok(())
}
