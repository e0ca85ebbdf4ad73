//! Network session abstraction.
//!
//! Two variants implement the same capability set:
//! - [`SdkTransport`]: the vendor-managed EVI chat session, selected by a
//!   dialog configuration id
//! - [`RawTransport`]: a plain message protocol the engine fully controls
//!
//! Both are used through `Arc<dyn Transport>`. The frame producer only sends
//! and the event consumer only receives, so each direction has exactly one
//! user at a time.

pub mod messages;
pub mod raw;
pub mod sdk;
pub mod ws;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::SessionResult;
use crate::session::SessionConfig;

pub use messages::{decode_inbound, AudioChunk, Handshake, InboundEvent, OutboundMessage, WireMessage};
pub use raw::RawTransport;
pub use sdk::SdkTransport;
pub use ws::Keepalive;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransportKind {
    /// Vendor-managed session
    Sdk,
    /// Raw message protocol
    Raw,
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportKind::Sdk => write!(f, "SDK"),
            TransportKind::Raw => write!(f, "raw"),
        }
    }
}

#[async_trait::async_trait]
pub trait Transport: Send + Sync {
    fn kind(&self) -> TransportKind;

    /// Send one outbound message. A second handshake is rejected.
    async fn send(&self, message: OutboundMessage) -> SessionResult<()>;

    /// Next inbound event; `Ok(None)` once the remote side has closed.
    ///
    /// Malformed messages are skipped internally and never returned.
    async fn receive(&self) -> SessionResult<Option<InboundEvent>>;

    /// Close the session. Idempotent.
    async fn close(&self) -> SessionResult<()>;

    async fn handshake(&self, handshake: Handshake) -> SessionResult<()> {
        self.send(OutboundMessage::Handshake(handshake)).await
    }
}

/// Constructs a connected transport of the requested kind
#[async_trait::async_trait]
pub trait TransportConnector: Send + Sync {
    async fn connect(&self, kind: TransportKind, config: &SessionConfig) -> SessionResult<Arc<dyn Transport>>;
}

/// Connects the WebSocket-backed transports
#[derive(Debug, Default, Clone)]
pub struct WebSocketConnector;

#[async_trait::async_trait]
impl TransportConnector for WebSocketConnector {
    async fn connect(&self, kind: TransportKind, config: &SessionConfig) -> SessionResult<Arc<dyn Transport>> {
        match kind {
            TransportKind::Sdk => Ok(Arc::new(SdkTransport::connect(config).await?)),
            TransportKind::Raw => Ok(Arc::new(RawTransport::connect(config).await?)),
        }
    }
}
