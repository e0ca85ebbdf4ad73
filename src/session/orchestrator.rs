use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::config::{SessionConfig, TransportPlan};
use super::session::Session;
use super::stats::SessionStats;
use crate::audio::{resolve_output_device, AudioHost, ResolvedDevice};
use crate::error::{SessionError, SessionResult};
use crate::transport::{TransportConnector, TransportKind};

/// Selects a transport, runs the session on it, and falls back from the SDK
/// transport to the raw one when allowed.
pub struct SessionOrchestrator {
    config: SessionConfig,
    host: Box<dyn AudioHost>,
    connector: Arc<dyn TransportConnector>,
    listener: Option<mpsc::Sender<Value>>,
    shutdown: CancellationToken,
}

impl SessionOrchestrator {
    pub fn new(config: SessionConfig, host: Box<dyn AudioHost>, connector: Arc<dyn TransportConnector>) -> Self {
        Self {
            config,
            host,
            connector,
            listener: None,
            shutdown: CancellationToken::new(),
        }
    }

    /// Receive non-audio events (transcripts, control messages)
    pub fn with_event_listener(mut self, listener: mpsc::Sender<Value>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Cancelling this token ends the session through normal teardown
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run one conversation until it ends. All streams and the transport are
    /// released before this returns, on every path.
    pub async fn run(&mut self) -> SessionResult<SessionStats> {
        let plan = self.config.validate()?;

        let host = &self.host;
        let device = resolve_output_device(self.config.output_device.as_deref(), || host.output_devices());
        info!(
            "Session {}: {} backend, output device {}, plan {:?}",
            self.config.session_id,
            self.host.name(),
            device,
            plan
        );

        match plan {
            TransportPlan::RawOnly => self.run_on(TransportKind::Raw, device).await,
            TransportPlan::SdkFirst { fallback } => match self.run_on(TransportKind::Sdk, device).await {
                Err(e) if e.is_establish() && fallback => {
                    warn!("SDK transport failed ({}); falling back to raw transport", e);
                    if self.config.transport.ws_url.is_none() {
                        return Err(SessionError::Config(
                            "fallback enabled but no WebSocket endpoint configured".to_string(),
                        ));
                    }
                    self.run_on(TransportKind::Raw, device).await
                }
                Err(e) if e.is_establish() => {
                    info!("Not falling back to raw transport; fallback is disabled");
                    Err(e)
                }
                other => other,
            },
        }
    }

    async fn run_on(&mut self, kind: TransportKind, device: ResolvedDevice) -> SessionResult<SessionStats> {
        let mut session = Session::new(self.config.clone(), kind, device, &self.shutdown);

        session
            .run(
                self.host.as_mut(),
                self.connector.as_ref(),
                self.listener.clone(),
                &self.shutdown,
            )
            .await
    }
}
