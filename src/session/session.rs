use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::consumer::run_consumer;
use super::producer::run_producer;
use super::stats::{EndReason, SessionCounters, SessionStats};
use crate::audio::{
    frame_queue, AudioHost, AudioStream, FaultReceiver, PlaybackWriter, QueueStats, ResolvedDevice,
};
use crate::error::{SessionError, SessionResult};
use crate::transport::{Transport, TransportConnector, TransportKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TaskRole {
    Producer,
    Consumer,
}

type TaskOutcome = (TaskRole, SessionResult<()>);

/// A single conversation on one transport.
///
/// Owns every stream, the transport and both tasks. [`Session::shutdown`]
/// releases all of them exactly once, whichever way the session ends.
pub struct Session {
    config: SessionConfig,
    kind: TransportKind,
    device: ResolvedDevice,
    started_at: DateTime<Utc>,

    playback_stream: Option<Box<dyn AudioStream>>,
    capture_stream: Option<Box<dyn AudioStream>>,
    transport: Option<Arc<dyn Transport>>,
    tasks: JoinSet<TaskOutcome>,
    cancel: CancellationToken,

    counters: Arc<SessionCounters>,
    queue_stats: Option<Arc<QueueStats>>,
    playback: Option<PlaybackWriter>,
    torn_down: bool,
}

impl Session {
    pub fn new(config: SessionConfig, kind: TransportKind, device: ResolvedDevice, shutdown: &CancellationToken) -> Self {
        Self {
            config,
            kind,
            device,
            started_at: Utc::now(),
            playback_stream: None,
            capture_stream: None,
            transport: None,
            tasks: JoinSet::new(),
            cancel: shutdown.child_token(),
            counters: Arc::new(SessionCounters::default()),
            queue_stats: None,
            playback: None,
            torn_down: false,
        }
    }

    pub fn kind(&self) -> TransportKind {
        self.kind
    }

    /// Run the conversation to completion, then tear everything down.
    pub async fn run(
        &mut self,
        host: &mut dyn AudioHost,
        connector: &dyn TransportConnector,
        listener: Option<mpsc::Sender<Value>>,
        shutdown: &CancellationToken,
    ) -> SessionResult<SessionStats> {
        info!("Starting session {} on {} transport", self.config.session_id, self.kind);

        let result = self.run_inner(host, connector, listener, shutdown).await;
        self.shutdown().await;

        match result {
            Ok(reason) => {
                let stats = self.stats(reason);
                info!(
                    "Session {} ended ({:?}): {} frames sent, {} dropped, {} payloads played",
                    stats.session_id, reason, stats.frames_sent, stats.frames_dropped, stats.payloads_played
                );
                Ok(stats)
            }
            Err(e) => {
                error!("Session {} failed: {}", self.config.session_id, e);
                Err(e)
            }
        }
    }

    async fn run_inner(
        &mut self,
        host: &mut dyn AudioHost,
        connector: &dyn TransportConnector,
        listener: Option<mpsc::Sender<Value>>,
        shutdown: &CancellationToken,
    ) -> SessionResult<EndReason> {
        let params = self.config.audio;
        let (fault_tx, fault_rx) = mpsc::unbounded_channel();

        // Playback first, so the first reply is never lost
        let opened = host.open_playback(&params, self.device, fault_tx.clone())?;
        self.playback_stream = Some(opened.stream);
        let playback = PlaybackWriter::new(opened.sink, params);
        self.playback = Some(playback.clone());

        let connected = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(EndReason::Interrupted),
            connected = connector.connect(self.kind, &self.config) => connected,
        };
        let transport = connected.map_err(|e| self.establish_error(e))?;
        self.transport = Some(Arc::clone(&transport));

        let handshake = tokio::select! {
            biased;
            _ = shutdown.cancelled() => return Ok(EndReason::Interrupted),
            sent = transport.handshake(self.config.handshake()) => sent,
        };
        handshake.map_err(|e| self.establish_error(e))?;
        info!("Handshake sent on {} transport", self.kind);

        let (frame_tx, frame_rx) = frame_queue(self.config.queue_capacity);
        self.queue_stats = Some(frame_tx.stats());
        self.capture_stream = Some(host.open_capture(&params, frame_tx, fault_tx)?);

        self.tasks.spawn({
            let transport = Arc::clone(&transport);
            let counters = Arc::clone(&self.counters);
            let cancel = self.cancel.clone();
            async move { (TaskRole::Producer, run_producer(frame_rx, transport, counters, cancel).await) }
        });
        self.tasks.spawn({
            let counters = Arc::clone(&self.counters);
            let cancel = self.cancel.clone();
            async move {
                (
                    TaskRole::Consumer,
                    run_consumer(transport, playback, listener, counters, cancel).await,
                )
            }
        });

        self.supervise(fault_rx, shutdown).await
    }

    /// Wait for the first task to finish, a device fault, or shutdown; then
    /// cancel and reap everything else.
    async fn supervise(&mut self, mut faults: FaultReceiver, shutdown: &CancellationToken) -> SessionResult<EndReason> {
        let first = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!("Shutdown requested");
                Ok(EndReason::Interrupted)
            }
            Some(fault) = faults.recv() => Err(fault),
            joined = self.tasks.join_next() => match joined {
                Some(Ok((TaskRole::Producer, Ok(())))) => Ok(EndReason::CaptureEnded),
                Some(Ok((TaskRole::Consumer, Ok(())))) => Ok(EndReason::RemoteClosed),
                Some(Ok((role, Err(e)))) => {
                    warn!("{:?} failed: {}", role, e);
                    Err(e)
                }
                Some(Err(e)) => Err(SessionError::Task(e.to_string())),
                None => Ok(EndReason::CaptureEnded),
            },
        };

        self.cancel.cancel();
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok((role, Err(e))) => debug!("{:?} also ended with error after cancellation: {}", role, e),
                Ok((role, Ok(()))) => debug!("{:?} stopped", role),
                Err(e) => debug!("Task join error after cancellation: {}", e),
            }
        }

        first
    }

    /// Stop every task and stream and close the transport. Idempotent.
    pub async fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        info!("Tearing down session {}", self.config.session_id);

        self.cancel.cancel();
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}

        if let Some(mut stream) = self.capture_stream.take() {
            if let Err(e) = stream.close() {
                warn!("Failed to close capture stream: {}", e);
            }
        }

        if let Some(mut stream) = self.playback_stream.take() {
            if let Err(e) = stream.close() {
                warn!("Failed to close playback stream: {}", e);
            }
        }

        if let Some(transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                warn!("Failed to close {} transport: {}", self.kind, e);
            }
        }
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    fn establish_error(&self, e: SessionError) -> SessionError {
        match e {
            SessionError::Transport(reason) => SessionError::Establish { kind: self.kind, reason },
            other => other,
        }
    }

    fn stats(&self, end_reason: EndReason) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let (frames_captured, frames_dropped) = self
            .queue_stats
            .as_ref()
            .map(|q| (q.enqueued() + q.dropped(), q.dropped()))
            .unwrap_or_default();
        let (payloads_played, payloads_rejected) = self
            .playback
            .as_ref()
            .map(|p| (p.played(), p.rejected()))
            .unwrap_or_default();

        SessionStats {
            session_id: self.config.session_id.clone(),
            transport: self.kind,
            end_reason,
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            frames_captured,
            frames_sent: self.counters.frames_sent.load(Ordering::Relaxed),
            frames_dropped,
            payloads_played,
            payloads_rejected,
            events_passed: self.counters.events_passed.load(Ordering::Relaxed),
        }
    }
}
