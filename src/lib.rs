pub mod audio;
pub mod config;
pub mod error;
pub mod session;
pub mod transport;

#[cfg(feature = "hardware")]
pub use audio::CpalHost;
pub use audio::{
    resolve_output_device, AudioFrame, AudioHost, AudioParams, AudioStream, DeviceInfo, PlaybackSink,
    ResolvedDevice,
};
pub use config::Config;
pub use error::{SessionError, SessionResult};
pub use session::{EndReason, SessionConfig, SessionOrchestrator, SessionStats};
pub use transport::{InboundEvent, Transport, TransportConnector, TransportKind, WebSocketConnector};
