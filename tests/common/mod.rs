//! Shared fixtures for integration tests
//!
//! `MockConnector` hands out a single channel-backed transport. The test
//! keeps the matching `MockRemote` to inspect sent frames and inject
//! inbound ones.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use wicket::auth::CredentialResolver;
use wicket::session::{
    Connector, InboundFrame, SessionState, SessionUpdate, Transport,
};
use wicket::vault::{CredentialVault, MemoryStore, SecretKey};
use wicket::{Result, WicketError};

/// Generous: PBKDF2 at full iteration count is slow in debug builds.
pub const TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Transport pair
// =============================================================================

pub struct MockTransport {
    sent: mpsc::UnboundedSender<String>,
    inbound: mpsc::UnboundedReceiver<Result<InboundFrame>>,
    closes: Arc<AtomicUsize>,
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, text: String) -> Result<()> {
        self.sent
            .send(text)
            .map_err(|_| WicketError::TransportClosedUnexpectedly("peer gone".into()))
    }

    async fn recv(&mut self) -> Option<Result<InboundFrame>> {
        self.inbound.recv().await
    }

    async fn close(&mut self) -> Result<()> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct MockConnector {
    transport: Mutex<Option<MockTransport>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    refuse: Option<String>,
    connects: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl Connector for MockConnector {
    type Transport = MockTransport;

    async fn connect(&self, url: &str) -> Result<MockTransport> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        self.urls.lock().unwrap().push(url.to_string());

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(msg) = &self.refuse {
            return Err(WicketError::TransportOpenFailed(msg.clone()));
        }

        self.transport
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| WicketError::TransportOpenFailed("already connected".into()))
    }
}

/// Test side of the mock transport.
pub struct MockRemote {
    sent: mpsc::UnboundedReceiver<String>,
    inbound: Option<mpsc::UnboundedSender<Result<InboundFrame>>>,
    closes: Arc<AtomicUsize>,
    connects: Arc<AtomicUsize>,
    urls: Arc<Mutex<Vec<String>>>,
    gate: Option<oneshot::Sender<()>>,
}

impl MockRemote {
    pub async fn next_sent(&mut self) -> String {
        tokio::time::timeout(TIMEOUT, self.sent.recv())
            .await
            .expect("timed out waiting for a sent frame")
            .expect("transport dropped")
    }

    /// Frames sent so far that have not been read yet.
    pub fn drain_sent(&mut self) -> Vec<String> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.sent.try_recv() {
            frames.push(frame);
        }
        frames
    }

    pub fn push_text(&self, text: &str) {
        self.push(Ok(InboundFrame::Text(text.to_string())));
    }

    pub fn push_binary(&self, bytes: &[u8]) {
        self.push(Ok(InboundFrame::Binary(bytes.to_vec())));
    }

    pub fn push_close(&self) {
        self.push(Ok(InboundFrame::Close));
    }

    pub fn push_error(&self, msg: &str) {
        self.push(Err(WicketError::TransportClosedUnexpectedly(msg.to_string())));
    }

    /// End the inbound stream without a close frame.
    pub fn end_stream(&mut self) {
        self.inbound.take();
    }

    /// Let a gated connect complete.
    pub fn open_gate(&mut self) {
        if let Some(gate) = self.gate.take() {
            let _ = gate.send(());
        }
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }

    fn push(&self, frame: Result<InboundFrame>) {
        if let Some(inbound) = &self.inbound {
            let _ = inbound.send(frame);
        }
    }
}

fn build(gated: bool, refuse: Option<String>) -> (Arc<MockConnector>, MockRemote) {
    let (sent_tx, sent_rx) = mpsc::unbounded_channel();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
    let closes = Arc::new(AtomicUsize::new(0));
    let connects = Arc::new(AtomicUsize::new(0));
    let urls = Arc::new(Mutex::new(Vec::new()));

    let (gate_tx, gate_rx) = if gated {
        let (tx, rx) = oneshot::channel();
        (Some(tx), Some(rx))
    } else {
        (None, None)
    };

    let connector = MockConnector {
        transport: Mutex::new(Some(MockTransport {
            sent: sent_tx,
            inbound: inbound_rx,
            closes: Arc::clone(&closes),
        })),
        gate: Mutex::new(gate_rx),
        refuse,
        connects: Arc::clone(&connects),
        urls: Arc::clone(&urls),
    };

    let remote = MockRemote {
        sent: sent_rx,
        inbound: Some(inbound_tx),
        closes,
        connects,
        urls,
        gate: gate_tx,
    };

    (Arc::new(connector), remote)
}

pub fn mock_pair() -> (Arc<MockConnector>, MockRemote) {
    build(false, None)
}

/// Connect blocks until [`MockRemote::open_gate`].
pub fn gated_pair() -> (Arc<MockConnector>, MockRemote) {
    build(true, None)
}

pub fn refusing_pair(msg: &str) -> (Arc<MockConnector>, MockRemote) {
    build(false, Some(msg.to_string()))
}

// =============================================================================
// Resolvers
// =============================================================================

pub fn empty_resolver() -> Arc<CredentialResolver> {
    Arc::new(CredentialResolver::new(CredentialVault::new(Arc::new(
        MemoryStore::new(),
    ))))
}

pub async fn resolver_with_key(key: &str, passphrase: &str) -> Arc<CredentialResolver> {
    let resolver = empty_resolver();
    resolver
        .vault()
        .save_key("id_ed25519", SecretKey::new(key.to_string()), passphrase.into())
        .await
        .expect("save key");
    resolver
}

// =============================================================================
// Update helpers
// =============================================================================

/// Next state update, skipping output.
pub async fn next_state(updates: &mut mpsc::UnboundedReceiver<SessionUpdate>) -> SessionState {
    tokio::time::timeout(TIMEOUT, async {
        loop {
            match updates.recv().await {
                Some(SessionUpdate::State(state)) => return state,
                Some(SessionUpdate::Output(_)) => continue,
                None => panic!("update channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for a state update")
}

/// Collect state updates until `target` (inclusive).
pub async fn states_until(
    updates: &mut mpsc::UnboundedReceiver<SessionUpdate>,
    target: impl Fn(&SessionState) -> bool,
) -> Vec<SessionState> {
    let mut seen = Vec::new();
    loop {
        let state = next_state(updates).await;
        let done = target(&state) || state.is_terminal();
        seen.push(state);
        if done {
            return seen;
        }
    }
}

/// All output text until the next state update.
pub async fn output_until_state(
    updates: &mut mpsc::UnboundedReceiver<SessionUpdate>,
) -> (String, SessionState) {
    let mut output = String::new();
    let state = tokio::time::timeout(TIMEOUT, async {
        loop {
            match updates.recv().await {
                Some(SessionUpdate::Output(text)) => output.push_str(&text),
                Some(SessionUpdate::State(state)) => return state,
                None => panic!("update channel closed"),
            }
        }
    })
    .await
    .expect("timed out waiting for output");
    (output, state)
}
