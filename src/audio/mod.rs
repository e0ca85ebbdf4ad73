pub mod device;
pub mod frame;
pub mod host;
pub mod playback;
pub mod queue;

#[cfg(feature = "hardware")]
pub mod cpal_host;

#[cfg(feature = "hardware")]
pub use cpal_host::CpalHost;
pub use device::{resolve_output_device, DeviceInfo, ResolvedDevice};
pub use frame::{f32_to_i16, AudioFrame, AudioParams, PCM_S16LE};
pub use host::{AudioHost, AudioStream, FaultReceiver, FaultSender, OpenedPlayback};
pub use playback::{PlaybackSink, PlaybackWriter, Played, DEFAULT_PLAYBACK_BUFFER_CHUNKS};
pub use queue::{frame_queue, FrameAssembler, FrameReceiver, FrameSender, Offer, QueueStats, DEFAULT_QUEUE_CAPACITY};
