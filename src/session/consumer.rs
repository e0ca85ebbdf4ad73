use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::stats::SessionCounters;
use crate::audio::PlaybackWriter;
use crate::error::SessionResult;
use crate::transport::{InboundEvent, Transport};

/// Receive transport events in arrival order and play their audio.
///
/// Non-audio events are offered to `listener` without waiting; a full or
/// missing listener simply drops them. Returns `Ok(())` when cancelled or
/// when the remote side closes.
pub async fn run_consumer(
    transport: Arc<dyn Transport>,
    playback: PlaybackWriter,
    listener: Option<mpsc::Sender<Value>>,
    counters: Arc<SessionCounters>,
    cancel: CancellationToken,
) -> SessionResult<()> {
    info!("Event consumer started ({} transport)", transport.kind());

    loop {
        let event = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            event = transport.receive() => event?,
        };

        match event {
            Some(InboundEvent::AudioPayload(pcm)) => {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    played = playback.play_pcm(&pcm) => {
                        played?;
                    }
                }
            }
            Some(InboundEvent::OtherEvent(value)) => {
                counters.event_passed();
                if let Some(listener) = &listener {
                    if listener.try_send(value).is_err() {
                        debug!("Event listener busy or gone; event dropped");
                    }
                }
            }
            None => {
                info!("Remote side closed the session");
                break;
            }
        }
    }

    info!("Event consumer stopped");

    Ok(())
}
