use crate::client::connection::{self, HandshakeSlot, SessionTask};
use crate::client::dispatch::LiveEvent;
use crate::client::{AUDIO_INPUT_MIME_TYPE, encoder};
use crate::error::LiveError;
use crate::log::{LogEntry, TrafficLog};
use crate::types::{Blob, Content, FunctionResponse, OutgoingMessage, Part, Role, SessionConfig};
use base64::Engine as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::connect_async;
use tracing::info;
use url::Url;

/// Connection lifecycle. `Failed` is reached from `Connecting` or
/// `Connected` on a transport error; a fresh `connect()` may be attempted
/// from either terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Failed,
}

/// Handle to one live session. Cheap to clone; all clones share the same
/// socket, event channel, and traffic log.
///
/// The session configuration is fixed at build time: changing it requires
/// building a new client.
#[derive(Clone)]
pub struct LiveClient {
    pub(crate) url: String,
    pub(crate) config: SessionConfig,
    pub(crate) state: Arc<StdMutex<ConnectionState>>,
    pub(crate) log: Arc<TrafficLog>,
    pub(crate) events_tx: broadcast::Sender<LiveEvent>,
    pub(crate) outgoing_tx: Arc<StdMutex<Option<mpsc::Sender<OutgoingMessage>>>>,
    pub(crate) shutdown_tx: Arc<StdMutex<Option<oneshot::Sender<()>>>>,
    pub(crate) handshake_tx: HandshakeSlot,
    pub(crate) connect_gate: Arc<tokio::sync::Mutex<()>>,
    /// Bumped by every connect attempt and every disconnect. A connect
    /// whose claimed value is no longer current was cancelled mid-dial; a
    /// session task whose value is no longer current must not touch the
    /// shared state or handshake slot.
    pub(crate) epoch: Arc<AtomicU64>,
}

impl LiveClient {
    /// Open the socket, send the setup frame, and wait for the remote's
    /// setupComplete acknowledgement. Resolves `Ok(())` immediately when
    /// already connected.
    ///
    /// The session is usable only after this resolves: the socket-level
    /// open event alone does not complete the handshake. Fails with
    /// [`LiveError::Handshake`] when the socket closes, errors, or
    /// [`disconnect`](Self::disconnect) is called before setupComplete
    /// arrives. No timeout is enforced here; race externally if needed.
    pub async fn connect(&self) -> Result<(), LiveError> {
        let _gate = self.connect_gate.lock().await;
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        let setup = encoder::setup(&self.config)?;
        let url = Url::parse(&self.url)
            .map_err(|e| LiveError::Config(format!("invalid endpoint url: {e}")))?;

        let attempt = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        self.set_state(ConnectionState::Connecting);
        let (ws, _response) = match connect_async(url.as_str()).await {
            Ok(ok) => ok,
            Err(e) => {
                self.log.push("socket.error", e.to_string());
                self.set_state(ConnectionState::Failed);
                return Err(LiveError::WebSocket(e));
            }
        };
        if self.epoch.load(Ordering::SeqCst) != attempt {
            // disconnect() landed while the dial was in flight; the socket
            // is dropped here without ever becoming the active session.
            self.log.push("socket.close", "disconnected while connecting");
            return Err(LiveError::Handshake(
                "disconnected before setup completed".to_string(),
            ));
        }
        info!("socket open to {url}");
        self.log.push("socket.open", url.as_str());
        let _ = self.events_tx.send(LiveEvent::Open);

        let (outgoing_tx, outgoing_rx) = mpsc::channel(100);
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let (handshake_tx, handshake_rx) = oneshot::channel();
        self.store(&self.outgoing_tx, outgoing_tx);
        self.store(&self.shutdown_tx, shutdown_tx);
        self.store(&self.handshake_tx, handshake_tx);

        if self.epoch.load(Ordering::SeqCst) != attempt {
            // disconnect() raced the slot stores; whatever it did not take
            // is torn down here before anything is spawned.
            self.take_slots();
            self.set_state(ConnectionState::Disconnected);
            self.log.push("socket.close", "disconnected while connecting");
            return Err(LiveError::Handshake(
                "disconnected before setup completed".to_string(),
            ));
        }

        connection::spawn(SessionTask {
            ws,
            setup,
            outgoing_rx,
            shutdown_rx,
            handshake: self.handshake_tx.clone(),
            events: self.events_tx.clone(),
            log: self.log.clone(),
            state: self.state.clone(),
            epoch: attempt,
            current_epoch: self.epoch.clone(),
        });

        handshake_rx.await.map_err(|_| {
            LiveError::Handshake(
                "connection ended or was disconnected before setupComplete".to_string(),
            )
        })
    }

    /// Close the session. Idempotent, fire-and-forget; returns whether a
    /// socket was actually open. A `connect()` still awaiting its
    /// handshake is cancelled and settles with a handshake error.
    pub fn disconnect(&self) -> bool {
        let was_open = matches!(
            self.state(),
            ConnectionState::Connecting | ConnectionState::Connected
        );
        // Invalidating the epoch first covers a connect that is still
        // dialing and has no slots to take yet.
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.take_slots();
        self.set_state(ConnectionState::Disconnected);
        if was_open {
            info!("session disconnected");
        }
        was_open
    }

    /// Empty all session slots, signalling shutdown if a task is running.
    fn take_slots(&self) {
        if let Ok(mut slot) = self.shutdown_tx.lock() {
            if let Some(tx) = slot.take() {
                let _ = tx.send(());
            }
        }
        if let Ok(mut slot) = self.handshake_tx.lock() {
            slot.take();
        }
        if let Ok(mut slot) = self.outgoing_tx.lock() {
            slot.take();
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(ConnectionState::Failed)
    }

    /// Subscribe to session events. Every subscriber observes every event
    /// emitted after subscription; dropping the receiver (even from inside
    /// a handling loop) does not affect other subscribers.
    pub fn subscribe(&self) -> broadcast::Receiver<LiveEvent> {
        self.events_tx.subscribe()
    }

    /// Snapshot of the diagnostic traffic trail.
    pub fn log_entries(&self) -> Vec<LogEntry> {
        self.log.entries()
    }

    /// Send one user text turn.
    pub async fn send_text_turn(
        &self,
        text: impl Into<String>,
        turn_complete: bool,
    ) -> Result<(), LiveError> {
        let turn = Content {
            parts: vec![Part {
                text: Some(text.into()),
                ..Default::default()
            }],
            role: Some(Role::User),
        };
        self.send_client_content(vec![turn], turn_complete).await
    }

    pub async fn send_client_content(
        &self,
        turns: Vec<Content>,
        turn_complete: bool,
    ) -> Result<(), LiveError> {
        let message = encoder::client_content(turns, turn_complete)?;
        self.send_message(message).await
    }

    /// Send pre-encoded media chunks mid-session.
    pub async fn send_realtime_input(&self, chunks: Vec<Blob>) -> Result<(), LiveError> {
        let message = encoder::realtime_input(chunks)?;
        self.send_message(message).await
    }

    /// Send one chunk of 16 kHz mono PCM samples as realtime audio input.
    pub async fn send_audio_chunk(&self, samples: &[i16]) -> Result<(), LiveError> {
        if samples.is_empty() {
            return Ok(());
        }
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        let data = base64::engine::general_purpose::STANDARD.encode(&bytes);
        self.send_realtime_audio(data).await
    }

    /// Send one already base64-encoded 16 kHz mono PCM chunk, as produced
    /// by the capture pipeline.
    pub async fn send_realtime_audio(&self, data: String) -> Result<(), LiveError> {
        self.send_realtime_input(vec![Blob {
            mime_type: AUDIO_INPUT_MIME_TYPE.to_string(),
            data,
        }])
        .await
    }

    /// Answer previously received tool calls by id.
    pub async fn send_tool_response(
        &self,
        responses: Vec<FunctionResponse>,
    ) -> Result<(), LiveError> {
        let message = encoder::tool_response(responses)?;
        self.send_message(message).await
    }

    /// Queue a frame for transmission. Only valid while `Connected`;
    /// nothing is buffered across connection states.
    async fn send_message(&self, message: OutgoingMessage) -> Result<(), LiveError> {
        let sender = {
            if self.state() != ConnectionState::Connected {
                return Err(LiveError::NotConnected);
            }
            self.outgoing_tx
                .lock()
                .ok()
                .and_then(|slot| slot.clone())
                .ok_or(LiveError::NotConnected)?
        };
        sender.send(message).await.map_err(|_| LiveError::Send)
    }

    fn set_state(&self, next: ConnectionState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn store<T>(&self, slot: &Arc<StdMutex<Option<T>>>, value: T) {
        if let Ok(mut guard) = slot.lock() {
            *guard = Some(value);
        }
    }
}
