//! Session Gateway
//!
//! Runs one terminal session per spawned task. The task owns the transport
//! and the resolved credential; callers talk to it through a
//! [`SessionHandle`] and read ordered [`SessionUpdate`]s from a channel.
//!
//! Lifecycle rules come from [`transition`]; this module only performs the
//! effects it asks for.

use std::collections::VecDeque;
use std::sync::Arc;

use reqwest::Url;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{encode_init, encode_resize, Geometry, InboundFrame, Utf8StreamDecoder};
use super::state::{transition, Effect, SessionEvent, SessionFailure, SessionState};
use super::transport::{Connector, Transport};
use crate::auth::{CredentialRequest, CredentialResolver, ResolvedCredential};
use crate::endpoint::terminal_ws_url;
use crate::types::{Result, WicketError};

// =============================================================================
// Public types
// =============================================================================

/// Where to connect and the initial terminal size.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub url: String,
    pub geometry: Geometry,
}

impl SessionConfig {
    pub fn new(url: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            url: url.into(),
            geometry,
        }
    }

    /// Target the terminal endpoint under a gateway base URL.
    pub fn for_gateway(base: &Url, geometry: Geometry) -> Result<Self> {
        Ok(Self::new(terminal_ws_url(base)?.to_string(), geometry))
    }
}

/// Delivered in order on the receiver returned by [`SessionGateway::spawn`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionUpdate {
    State(SessionState),
    /// Decoded terminal output.
    Output(String),
}

#[derive(Debug)]
enum Command {
    Input(String),
    Resize(Geometry),
    Disconnect,
}

pub struct SessionGateway;

impl SessionGateway {
    /// Start a session and return immediately.
    ///
    /// Must be called inside a tokio runtime. Dropping the handle disconnects
    /// the session.
    pub fn spawn<C>(
        config: SessionConfig,
        connector: Arc<C>,
        resolver: Arc<CredentialResolver>,
        request: CredentialRequest,
    ) -> (SessionHandle, mpsc::UnboundedReceiver<SessionUpdate>)
    where
        C: Connector + 'static,
    {
        let id = Uuid::new_v4();
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(SessionState::Idle);
        let (geometry_tx, geometry_rx) = watch::channel(config.geometry);
        let (done_tx, done_rx) = watch::channel(false);

        info!(session_id = %id, method = %request.method, "Starting terminal session");

        let driver = Driver {
            id,
            url: config.url,
            geometry: config.geometry,
            connector,
            resolver,
            request: Some(request),
            credential: None,
            transport: None,
            decoder: Utf8StreamDecoder::new(),
            state: SessionState::Idle,
            state_tx,
            geometry_tx,
            updates: update_tx,
            commands: command_rx,
            done: done_tx,
        };
        tokio::spawn(driver.run());

        let handle = SessionHandle {
            id,
            commands: command_tx,
            state: state_rx,
            geometry: geometry_rx,
            done: done_rx,
        };
        (handle, update_rx)
    }
}

// =============================================================================
// Handle
// =============================================================================

/// Caller side of a running session.
pub struct SessionHandle {
    id: Uuid,
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<SessionState>,
    geometry: watch::Receiver<Geometry>,
    done: watch::Receiver<bool>,
}

impl SessionHandle {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state.borrow().clone()
    }

    /// Last geometry sent to the remote PTY (or the initial one).
    pub fn geometry(&self) -> Geometry {
        *self.geometry.borrow()
    }

    /// Forward keystrokes verbatim.
    ///
    /// Returns `Ok(false)` when the session is not streaming yet; the input
    /// is dropped, not queued.
    pub fn send_input(&self, data: impl Into<String>) -> Result<bool> {
        let state = self.state();
        if state.is_terminal() {
            return Err(WicketError::SessionClosed);
        }
        if !state.is_streaming() {
            warn!(
                session_id = %self.id,
                state = state.name(),
                "Dropping input before session is streaming"
            );
            return Ok(false);
        }

        self.commands
            .send(Command::Input(data.into()))
            .map_err(|_| WicketError::SessionClosed)?;
        Ok(true)
    }

    /// Notify the remote PTY of a new size. Fire-and-forget.
    ///
    /// Returns `false` when the resize was dropped: zero dimensions, or the
    /// session is not streaming.
    pub fn resize(&self, rows: u16, cols: u16) -> bool {
        let geometry = Geometry::new(rows, cols);
        if !geometry.is_valid() {
            return false;
        }

        let state = self.state();
        if !state.is_streaming() {
            debug!(
                session_id = %self.id,
                state = state.name(),
                "Dropping resize outside streaming"
            );
            return false;
        }

        self.commands.send(Command::Resize(geometry)).is_ok()
    }

    /// Close the session and wait until its transport is released.
    /// Idempotent.
    pub async fn disconnect(&self) {
        if !self.state().is_terminal() {
            // Send failure means the driver already exited
            let _ = self.commands.send(Command::Disconnect);
        }
        self.closed().await;
    }

    /// Wait for the session to end and return its terminal state.
    pub async fn closed(&self) -> SessionState {
        let mut done = self.done.clone();
        // Err means the driver is gone, which is also done
        let _ = done.wait_for(|finished| *finished).await;
        self.state()
    }
}

// =============================================================================
// Driver
// =============================================================================

enum Step {
    Command(Option<Command>),
    Frame(Option<Result<InboundFrame>>),
}

struct Driver<C: Connector> {
    id: Uuid,
    url: String,
    geometry: Geometry,
    connector: Arc<C>,
    resolver: Arc<CredentialResolver>,
    request: Option<CredentialRequest>,
    credential: Option<ResolvedCredential>,
    transport: Option<C::Transport>,
    decoder: Utf8StreamDecoder,
    state: SessionState,
    state_tx: watch::Sender<SessionState>,
    geometry_tx: watch::Sender<Geometry>,
    updates: mpsc::UnboundedSender<SessionUpdate>,
    commands: mpsc::UnboundedReceiver<Command>,
    done: watch::Sender<bool>,
}

impl<C: Connector + 'static> Driver<C> {
    async fn run(mut self) {
        self.drive().await;
        self.release_transport().await;
        self.done.send_replace(true);
        debug!(session_id = %self.id, state = %self.state, "Session driver finished");
    }

    async fn drive(&mut self) {
        let requires_credential = self
            .request
            .as_ref()
            .is_some_and(CredentialRequest::needs_vault);

        // Password auth or an in-memory key resolves without the vault, so
        // the session goes straight to Connecting.
        if !requires_credential {
            match self.resolve_credential().await {
                event @ (SessionEvent::CredentialFailed(_) | SessionEvent::Disconnect) => {
                    self.apply(event);
                    return;
                }
                _ => {}
            }
        }

        let mut pending: VecDeque<Effect> = self
            .apply(SessionEvent::Start {
                requires_credential,
            })
            .into();

        loop {
            let event = match pending.pop_front() {
                Some(Effect::ResolveCredential) => self.resolve_credential().await,
                Some(Effect::OpenTransport) => self.open_transport().await,
                Some(Effect::SendHandshake) => self.send_handshake().await,
                Some(Effect::ReleaseTransport) => {
                    self.release_transport().await;
                    continue;
                }
                // In-flight futures were already dropped by the select
                Some(Effect::AbandonPending) => continue,
                None if self.state.is_streaming() => match self.stream_step().await {
                    Some(event) => event,
                    None => continue,
                },
                None => break,
            };
            pending.extend(self.apply(event));
        }
    }

    fn apply(&mut self, event: SessionEvent) -> Vec<Effect> {
        let t = transition(&self.state, event);
        if t.changed(&self.state) {
            match &t.next {
                SessionState::Errored(failure) => warn!(
                    session_id = %self.id,
                    from = self.state.name(),
                    code = failure.code(),
                    "Session failed: {}",
                    failure
                ),
                next => info!(
                    session_id = %self.id,
                    from = self.state.name(),
                    to = next.name(),
                    "Session state changed"
                ),
            }

            self.state = t.next.clone();
            self.state_tx.send_replace(t.next.clone());
            let _ = self.updates.send(SessionUpdate::State(t.next));
        }
        t.effects
    }

    async fn resolve_credential(&mut self) -> SessionEvent {
        let Some(request) = self.request.take() else {
            return SessionEvent::CredentialFailed(SessionFailure::Internal(
                "Credential request already consumed".into(),
            ));
        };

        let resolver = Arc::clone(&self.resolver);
        let resolve = resolver.resolve(request);
        tokio::pin!(resolve);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) | None => return SessionEvent::Disconnect,
                    Some(other) => log_dropped(self.id, &other),
                },
                result = &mut resolve => {
                    return match result {
                        Ok(credential) => {
                            self.credential = Some(credential);
                            SessionEvent::CredentialResolved
                        }
                        Err(e) => SessionEvent::CredentialFailed(SessionFailure::from(&e)),
                    };
                }
            }
        }
    }

    async fn open_transport(&mut self) -> SessionEvent {
        let connector = Arc::clone(&self.connector);
        let url = self.url.clone();
        let connect = connector.connect(&url);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => match command {
                    Some(Command::Disconnect) | None => return SessionEvent::Disconnect,
                    Some(other) => log_dropped(self.id, &other),
                },
                result = &mut connect => {
                    return match result {
                        Ok(transport) => {
                            self.transport = Some(transport);
                            SessionEvent::TransportOpened
                        }
                        Err(e) => SessionEvent::TransportOpenFailed(failure_detail(e)),
                    };
                }
            }
        }
    }

    async fn send_handshake(&mut self) -> SessionEvent {
        // The credential is used for exactly this frame, then dropped.
        let credential = self.credential.take();
        let key = credential
            .as_ref()
            .map(ResolvedCredential::handshake_value)
            .unwrap_or("");

        let frame = match encode_init(key, self.geometry) {
            Ok(frame) => frame,
            Err(e) => return SessionEvent::TransportFailed(failure_detail(e)),
        };
        drop(credential);

        let Some(transport) = self.transport.as_mut() else {
            return SessionEvent::TransportFailed("Transport not open".into());
        };

        match transport.send(frame).await {
            Ok(()) => {
                debug!(
                    session_id = %self.id,
                    rows = self.geometry.rows,
                    cols = self.geometry.cols,
                    "Handshake sent"
                );
                SessionEvent::HandshakeSent
            }
            Err(e) => SessionEvent::TransportFailed(failure_detail(e)),
        }
    }

    /// One unit of streaming work. `None` means stay in `Streaming`.
    async fn stream_step(&mut self) -> Option<SessionEvent> {
        let step = {
            let Some(transport) = self.transport.as_mut() else {
                return Some(SessionEvent::TransportFailed("Transport not open".into()));
            };
            tokio::select! {
                biased;
                command = self.commands.recv() => Step::Command(command),
                frame = transport.recv() => Step::Frame(frame),
            }
        };

        match step {
            Step::Command(None) | Step::Command(Some(Command::Disconnect)) => {
                Some(SessionEvent::Disconnect)
            }
            Step::Command(Some(Command::Input(data))) => self.send_text(data).await,
            Step::Command(Some(Command::Resize(geometry))) => {
                self.geometry = geometry;
                self.geometry_tx.send_replace(geometry);
                self.send_text(encode_resize(geometry)).await
            }
            Step::Frame(Some(Ok(InboundFrame::Text(text)))) => {
                self.emit_output(text);
                None
            }
            Step::Frame(Some(Ok(InboundFrame::Binary(bytes)))) => {
                let text = self.decoder.decode(&bytes);
                self.emit_output(text);
                None
            }
            Step::Frame(Some(Ok(InboundFrame::Close))) => {
                self.flush_decoder();
                Some(SessionEvent::TransportClosed)
            }
            Step::Frame(Some(Err(e))) => {
                self.flush_decoder();
                Some(SessionEvent::TransportFailed(failure_detail(e)))
            }
            Step::Frame(None) => {
                self.flush_decoder();
                Some(SessionEvent::TransportFailed(
                    "Stream ended without a close frame".into(),
                ))
            }
        }
    }

    async fn send_text(&mut self, text: String) -> Option<SessionEvent> {
        let transport = self.transport.as_mut()?;
        match transport.send(text).await {
            Ok(()) => None,
            Err(e) => Some(SessionEvent::TransportFailed(failure_detail(e))),
        }
    }

    fn emit_output(&self, text: String) {
        if !text.is_empty() {
            let _ = self.updates.send(SessionUpdate::Output(text));
        }
    }

    fn flush_decoder(&mut self) {
        let rest = self.decoder.finish();
        self.emit_output(rest);
    }

    /// Close the transport if one is held. `take()` makes this run once.
    async fn release_transport(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!(session_id = %self.id, error = %e, "Ignoring transport close error");
            }
            debug!(session_id = %self.id, "Transport released");
        }
    }
}

fn log_dropped(id: Uuid, command: &Command) {
    match command {
        Command::Input(_) => warn!(session_id = %id, "Dropping input before session is streaming"),
        Command::Resize(_) => {
            debug!(session_id = %id, "Dropping resize before session is streaming")
        }
        Command::Disconnect => {}
    }
}

/// Message without the error variant's own prefix.
fn failure_detail(err: WicketError) -> String {
    match err {
        WicketError::TransportOpenFailed(msg) | WicketError::TransportClosedUnexpectedly(msg) => {
            msg
        }
        other => other.to_string(),
    }
}
