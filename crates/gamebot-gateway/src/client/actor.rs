//! Connection Orchestrator task
//!
//! A single task owns the transport and every subcomponent. It sleeps on the
//! earliest component deadline, the next inbound frame, the in-flight
//! bootstrap and the command channel, and is the only place `ConnectionState`
//! changes. Cancelling a timer is clearing its deadline, so once a command has
//! been handled nothing stale can fire.

use super::state::{ClientSnapshot, ConnectionState};
use crate::bootstrap::{Bootstrap, Established};
use crate::broadcast::EventDispatcher;
use crate::config::ClientConfig;
use crate::error::{GatewayError, GatewayResult, HandshakeFailure};
use crate::events::{GatewayEvent, LifecycleEvent};
use crate::heartbeat::{HeartbeatAction, HeartbeatEngine};
use crate::protocol::{Envelope, FrameCodec, RawFrame, SignalKind};
use crate::reconnect::ReconnectionController;
use crate::resume::{ResumeAction, ResumeController};
use crate::sequencer::Sequencer;
use crate::session::SessionTracker;
use crate::transport::Transport;
use futures::future::BoxFuture;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;

/// Requests from the client handle
#[derive(Debug)]
pub(crate) enum Command {
    Connect(oneshot::Sender<GatewayResult<()>>),
    Disconnect(oneshot::Sender<()>),
}

type PendingBootstrap = BoxFuture<'static, GatewayResult<Established>>;

pub(crate) struct ClientActor {
    config: ClientConfig,
    state: ConnectionState,
    codec: FrameCodec,
    bootstrap: Arc<Bootstrap>,
    transport: Option<Transport>,
    endpoint: String,
    pending: Option<PendingBootstrap>,
    handshake_deadline: Option<Instant>,
    heartbeat: HeartbeatEngine,
    sequencer: Sequencer,
    session: SessionTracker,
    resume: ResumeController,
    reconnect: ReconnectionController,
    dispatcher: Arc<EventDispatcher>,
    snapshot: watch::Sender<ClientSnapshot>,
    commands: mpsc::Receiver<Command>,
    has_been_ready: bool,
}

impl ClientActor {
    pub(crate) fn new(
        config: ClientConfig,
        bootstrap: Arc<Bootstrap>,
        dispatcher: Arc<EventDispatcher>,
        snapshot: watch::Sender<ClientSnapshot>,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            codec: FrameCodec::new(config.compress),
            heartbeat: HeartbeatEngine::new(config.heartbeat.clone()),
            sequencer: Sequencer::new(config.sequencer_capacity),
            session: SessionTracker::new(),
            resume: ResumeController::new(&config.resume),
            reconnect: ReconnectionController::new(&config.reconnect),
            state: ConnectionState::Disconnected,
            transport: None,
            endpoint: String::new(),
            pending: None,
            handshake_deadline: None,
            has_been_ready: false,
            config,
            bootstrap,
            dispatcher,
            snapshot,
            commands,
        }
    }

    /// Run until the client handle is dropped
    pub(crate) async fn run(mut self) {
        tracing::debug!("Gateway client task started");

        loop {
            let deadline = self.next_deadline();

            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                frame = recv_frame(self.transport.as_mut()) => self.on_frame(frame),
                result = poll_pending(self.pending.as_mut()) => {
                    self.pending = None;
                    self.on_established(result);
                }
                () = sleep_until(deadline) => self.on_timer(Instant::now()),
            }

            self.publish_snapshot();
        }

        self.teardown("client dropped");
        self.publish_snapshot();
        tracing::debug!("Gateway client task stopped");
    }

    // === Commands ===

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect(reply) => {
                let result = if self.state == ConnectionState::Disconnected {
                    // A user connect supersedes a pending backoff wait
                    self.reconnect.stop();
                    self.start_cycle();
                    Ok(())
                } else {
                    tracing::debug!(state = %self.state, "connect() while not disconnected");
                    Err(GatewayError::AlreadyConnected(self.state))
                };
                let _ = reply.send(result);
            }
            Command::Disconnect(reply) => {
                self.teardown("disconnect requested");
                // Publish before replying so callers observe the final state
                self.publish_snapshot();
                let _ = reply.send(());
            }
        }
    }

    // === Connection cycle ===

    fn start_cycle(&mut self) {
        let resume = self.session.resume_params();
        tracing::info!(
            resume = resume.is_some(),
            attempt = self.reconnect.attempt(),
            "Starting connection cycle"
        );

        self.set_state(ConnectionState::Connecting);
        self.dispatcher.dispatch_lifecycle(LifecycleEvent::Connecting);
        self.pending = Some(Box::pin(Arc::clone(&self.bootstrap).establish(resume)));
    }

    fn on_established(&mut self, result: GatewayResult<Established>) {
        match result {
            Ok(Established {
                transport,
                endpoint,
            }) => {
                self.transport = Some(transport);
                self.endpoint = endpoint;
                self.handshake_deadline = Some(Instant::now() + self.config.handshake_timeout);
                self.set_state(ConnectionState::Connected);
                self.dispatcher.dispatch_lifecycle(LifecycleEvent::Connected);
            }
            Err(e) => self.fail_cycle(e),
        }
    }

    /// The current connection is unusable: tear it down and maybe retry
    fn fail_cycle(&mut self, error: GatewayError) {
        tracing::warn!(error = %error, code = error.code(), "Connection cycle failed");

        let reason = error.to_string();
        let retryable = error.is_retryable();
        self.drop_connection();
        self.dispatcher.dispatch_lifecycle(LifecycleEvent::Error(error));
        self.enter_disconnected(reason);

        if retryable {
            self.schedule_reconnect();
        } else {
            tracing::error!("Connection cycle failed permanently, not reconnecting");
        }
    }

    fn schedule_reconnect(&mut self) {
        if !self.reconnect.is_enabled() {
            tracing::info!("Auto-reconnect disabled, staying disconnected");
            return;
        }
        if let Err(e) = self.reconnect.schedule(Instant::now()) {
            self.dispatcher.dispatch_lifecycle(LifecycleEvent::Error(e));
        }
    }

    // === Inbound frames ===

    fn on_frame(&mut self, frame: Option<RawFrame>) {
        let Some(frame) = frame else {
            self.on_transport_closed();
            return;
        };
        let Some(envelope) = self.codec.decode(&frame) else {
            return;
        };

        tracing::trace!(envelope = %envelope, "Frame received");

        match envelope.signal {
            SignalKind::Event => self.on_event(envelope),
            SignalKind::Hello => self.on_hello(&envelope),
            SignalKind::Pong => self.heartbeat.on_pong(Instant::now()),
            SignalKind::Reconnect => self.on_reconnect_signal(&envelope),
            SignalKind::ResumeAck => self.on_resume_ack(&envelope),
            SignalKind::Ping | SignalKind::Resume => {
                tracing::debug!(signal = %envelope.signal, "Ignoring client-only signal from server");
            }
        }
    }

    fn on_event(&mut self, envelope: Envelope) {
        let ready = self.sequencer.submit(envelope);
        self.deliver(ready);
    }

    fn deliver(&mut self, envelopes: Vec<Envelope>) {
        for envelope in envelopes {
            if let Some(sn) = envelope.sn {
                self.session.advance(sn);
            }
            self.dispatcher.dispatch_event(GatewayEvent::from(envelope));
        }
    }

    fn on_hello(&mut self, envelope: &Envelope) {
        if self.state != ConnectionState::Connected {
            tracing::debug!(state = %self.state, "Unexpected HELLO, ignoring");
            return;
        }
        let Some(hello) = envelope.as_hello() else {
            tracing::warn!("Malformed HELLO payload, ignoring");
            return;
        };
        if !hello.is_success() {
            self.on_handshake_failed(HandshakeFailure::Rejected { code: hello.code });
            return;
        }

        let session_id = hello.session_id.unwrap_or_default();
        self.handshake_deadline = None;

        if self.session.is_current(&session_id) {
            tracing::info!(
                session_id = %session_id,
                sn = self.sequencer.last_delivered(),
                "Session continued"
            );
        } else {
            // New session: numbering starts over
            let leftover = self.sequencer.force_drain();
            self.deliver(leftover);
            self.sequencer.reset(0);
            self.session.record_session(session_id.clone(), 0, self.endpoint.clone());
        }

        self.set_state(ConnectionState::Authenticated);
        self.heartbeat.start(Instant::now());
        self.reconnect.succeeded();

        let notification = if self.has_been_ready {
            LifecycleEvent::Reconnected { session_id }
        } else {
            self.has_been_ready = true;
            LifecycleEvent::Ready { session_id }
        };
        tracing::info!(event = notification.name(), "Handshake complete");
        self.dispatcher.dispatch_lifecycle(notification);
    }

    /// Only a rejection ends the session; a timeout or early close may still resume
    fn on_handshake_failed(&mut self, failure: HandshakeFailure) {
        tracing::warn!(reason = %failure, "Handshake failed");
        if matches!(failure, HandshakeFailure::Rejected { .. }) {
            self.invalidate_session();
        }
        self.fail_cycle(GatewayError::HandshakeFailed(failure));
    }

    fn on_reconnect_signal(&mut self, envelope: &Envelope) {
        let payload = envelope.as_reconnect().unwrap_or_default();
        tracing::warn!(code = payload.code, err = %payload.err, "Server requested reconnect");

        self.invalidate_session();
        self.drop_connection();
        self.enter_disconnected(format!(
            "server requested reconnect (code {}: {})",
            payload.code, payload.err
        ));
        self.schedule_reconnect();
    }

    fn on_resume_ack(&mut self, envelope: &Envelope) {
        if !self.resume.on_ack() {
            tracing::debug!("RESUME_ACK without a resume in progress, ignoring");
            return;
        }

        let payload = envelope.as_resume_ack().unwrap_or_default();
        self.session.refresh(payload.session_id);
        self.heartbeat.start(Instant::now());

        let session_id = self.session.session_id().unwrap_or_default().to_string();
        tracing::info!(session_id = %session_id, sn = self.sequencer.last_delivered(), "Session resumed");
        self.dispatcher
            .dispatch_lifecycle(LifecycleEvent::Resumed { session_id });
    }

    fn on_transport_closed(&mut self) {
        self.transport = None;

        match self.state {
            ConnectionState::Connected => {
                self.on_handshake_failed(HandshakeFailure::TransportClosed);
            }
            ConnectionState::Authenticated if self.resume.is_active() => {
                tracing::warn!("Transport closed during resume");
                self.resume.expedite(Instant::now());
            }
            ConnectionState::Authenticated => {
                tracing::warn!(
                    session_id = self.session.session_id().unwrap_or_default(),
                    "Transport closed unexpectedly"
                );
                self.drop_connection();
                self.enter_disconnected("transport closed".to_string());
                self.schedule_reconnect();
            }
            ConnectionState::Disconnected | ConnectionState::Connecting => {}
        }
    }

    // === Timers ===

    fn next_deadline(&self) -> Option<Instant> {
        [
            self.handshake_deadline,
            self.heartbeat.deadline(),
            self.resume.deadline(),
            self.reconnect.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    fn on_timer(&mut self, now: Instant) {
        if self.handshake_deadline.is_some_and(|deadline| deadline <= now) {
            self.handshake_deadline = None;
            let timeout_ms = u64::try_from(self.config.handshake_timeout.as_millis()).unwrap_or(u64::MAX);
            self.on_handshake_failed(HandshakeFailure::TimedOut { timeout_ms });
        }
        if self.heartbeat.deadline().is_some_and(|deadline| deadline <= now) {
            self.on_heartbeat_deadline(now);
        }
        if self.resume.deadline().is_some_and(|deadline| deadline <= now) {
            self.on_resume_deadline(now);
        }
        if self.reconnect.deadline().is_some_and(|deadline| deadline <= now)
            && self.reconnect.on_deadline().is_some()
            && self.state == ConnectionState::Disconnected
        {
            self.start_cycle();
        }
    }

    fn on_heartbeat_deadline(&mut self, now: Instant) {
        match self.heartbeat.on_deadline(now) {
            HeartbeatAction::SendPing { probe } => {
                let sn = self.sequencer.last_delivered();
                let sent = self.send(&Envelope::ping(sn));
                tracing::trace!(sn = sn, probe = probe, sent = sent, "PING");
            }
            HeartbeatAction::Wait => {}
            HeartbeatAction::ConnectionLost => {
                self.dispatcher.dispatch_lifecycle(LifecycleEvent::ConnectionLost);
                self.resume.start(now, self.sequencer.last_delivered());
            }
        }
    }

    fn on_resume_deadline(&mut self, now: Instant) {
        match self.resume.on_deadline() {
            ResumeAction::Attempt { attempt, sn } => {
                let sent = self.send(&Envelope::resume(sn));
                tracing::info!(attempt = attempt, sn = sn, sent = sent, "RESUME");
                self.resume.record_attempt(now, sent);
            }
            ResumeAction::Failed { attempts } => {
                self.dispatcher
                    .dispatch_lifecycle(LifecycleEvent::ResumeFailed { attempts });
                self.invalidate_session();
                self.fail_cycle(GatewayError::ResumeFailed { attempts });
            }
        }
    }

    // === Helpers ===

    /// Write an envelope; `false` if the transport is missing or unusable
    fn send(&self, envelope: &Envelope) -> bool {
        let Some(transport) = self.transport.as_ref().filter(|t| t.is_writable()) else {
            return false;
        };
        match self.codec.encode_envelope(envelope) {
            Ok(frame) => transport.send(frame).is_ok(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode envelope");
                false
            }
        }
    }

    /// Deliver what is buffered, then forget the session
    fn invalidate_session(&mut self) {
        let buffered = self.sequencer.force_drain();
        self.deliver(buffered);
        self.session.invalidate();
    }

    /// Stop connection-scoped work and close the transport
    fn drop_connection(&mut self) {
        self.pending = None;
        self.handshake_deadline = None;
        self.heartbeat.stop();
        self.resume.stop();
        if let Some(transport) = self.transport.take() {
            transport.close();
        }
    }

    fn enter_disconnected(&mut self, reason: String) {
        if self.state == ConnectionState::Disconnected {
            return;
        }
        self.set_state(ConnectionState::Disconnected);
        self.dispatcher
            .dispatch_lifecycle(LifecycleEvent::Disconnected { reason });
    }

    /// Cancel everything, including a pending reconnect
    fn teardown(&mut self, reason: &str) {
        self.drop_connection();
        self.reconnect.stop();
        self.enter_disconnected(reason.to_string());
    }

    fn set_state(&mut self, state: ConnectionState) {
        if self.state != state {
            tracing::info!(from = %self.state, to = %state, "Connection state changed");
            self.state = state;
        }
    }

    fn publish_snapshot(&self) {
        let snapshot = ClientSnapshot {
            state: self.state,
            session: self.session.current().cloned(),
            buffer: self.sequencer.status(),
            resuming: self.resume.is_active(),
            reconnect_attempt: self.reconnect.attempt(),
        };
        self.snapshot.send_if_modified(|current| {
            if *current == snapshot {
                false
            } else {
                *current = snapshot;
                true
            }
        });
    }
}

async fn recv_frame(transport: Option<&mut Transport>) -> Option<RawFrame> {
    match transport {
        Some(transport) => transport.recv().await,
        None => std::future::pending().await,
    }
}

async fn poll_pending(pending: Option<&mut PendingBootstrap>) -> GatewayResult<Established> {
    match pending {
        Some(pending) => pending.await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}
