use std::sync::Arc;
use tokio::sync::mpsc;

use super::device::{DeviceInfo, ResolvedDevice};
use super::frame::AudioParams;
use super::playback::PlaybackSink;
use super::queue::FrameSender;
use crate::error::{SessionError, SessionResult};

/// Channel through which platform audio threads report runtime failures
pub type FaultSender = mpsc::UnboundedSender<SessionError>;
pub type FaultReceiver = mpsc::UnboundedReceiver<SessionError>;

/// A running hardware stream.
///
/// `close` stops and releases the stream; calling it again is a no-op.
pub trait AudioStream {
    fn close(&mut self) -> SessionResult<()>;
}

/// An opened output stream and the sink that feeds it
pub struct OpenedPlayback {
    pub stream: Box<dyn AudioStream>,
    pub sink: Arc<dyn PlaybackSink>,
}

/// Platform audio subsystem.
///
/// Implementations:
/// - `CpalHost` (feature `hardware`): microphone and speakers via cpal
/// - test doubles driving synthetic frames
pub trait AudioHost {
    /// Backend name for logging
    fn name(&self) -> &str;

    /// Enumerate every device, in platform order, with its output channel count
    fn output_devices(&self) -> SessionResult<Vec<DeviceInfo>>;

    /// Open the output stream for the session lifetime
    fn open_playback(
        &mut self,
        params: &AudioParams,
        device: ResolvedDevice,
        faults: FaultSender,
    ) -> SessionResult<OpenedPlayback>;

    /// Open the input stream; completed frames are offered to `frames`
    fn open_capture(
        &mut self,
        params: &AudioParams,
        frames: FrameSender,
        faults: FaultSender,
    ) -> SessionResult<Box<dyn AudioStream>>;
}
