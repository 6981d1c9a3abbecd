//! Socket lifecycle task.
//!
//! One task per session owns both halves of the WebSocket: outbound frames
//! arrive over an mpsc queue (preserving call order), inbound frames are
//! decoded, logged, classified, and broadcast. The task resolves the
//! caller's pending `connect()` only once the remote acknowledges setup.

use crate::client::dispatch::{LiveEvent, classify};
use crate::client::handle::ConnectionState;
use crate::log::TrafficLog;
use crate::types::{IncomingMessage, OutgoingMessage};
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Shared slot for the pending-handshake resolver. The session task takes
/// it on setupComplete and `disconnect()` takes it to cancel; whoever
/// takes it first wins, so a late setupComplete can never resolve a
/// cancelled connect.
pub(crate) type HandshakeSlot = Arc<StdMutex<Option<oneshot::Sender<()>>>>;

pub(crate) struct SessionTask {
    pub ws: WsStream,
    pub setup: OutgoingMessage,
    pub outgoing_rx: mpsc::Receiver<OutgoingMessage>,
    pub shutdown_rx: oneshot::Receiver<()>,
    pub handshake: HandshakeSlot,
    pub events: broadcast::Sender<LiveEvent>,
    pub log: Arc<TrafficLog>,
    pub state: Arc<StdMutex<ConnectionState>>,
    /// The connect attempt this task belongs to.
    pub epoch: u64,
    /// Live value shared with the client handle; when it moves past
    /// `epoch` this task is stale and must leave state and handshake
    /// slot to the attempt that now owns them.
    pub current_epoch: Arc<AtomicU64>,
}

pub(crate) fn spawn(task: SessionTask) {
    tokio::spawn(task.run());
}

/// The pieces of a session the loop's helpers touch; the socket halves and
/// channel receivers stay with the loop itself.
struct Session {
    handshake: HandshakeSlot,
    events: broadcast::Sender<LiveEvent>,
    log: Arc<TrafficLog>,
    state: Arc<StdMutex<ConnectionState>>,
    epoch: u64,
    current_epoch: Arc<AtomicU64>,
}

impl SessionTask {
    async fn run(self) {
        let SessionTask {
            ws,
            setup,
            mut outgoing_rx,
            mut shutdown_rx,
            handshake,
            events,
            log,
            state,
            epoch,
            current_epoch,
        } = self;
        let session = Session {
            handshake,
            events,
            log,
            state,
            epoch,
            current_epoch,
        };
        let (mut sink, mut stream) = ws.split();

        // The setup frame must be the first thing on the wire.
        match serde_json::to_string(&setup) {
            Ok(json) => {
                session.log.push(setup.kind(), &json);
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    session.fail(e.to_string());
                    return;
                }
            }
            Err(e) => {
                // Setup frames are plain data; serialization cannot
                // realistically fail, but a broken frame must not go out.
                session.fail(format!("failed to serialize setup frame: {e}"));
                return;
            }
        }

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    debug!("session shutdown requested; closing socket");
                    let _ = sink.send(Message::Close(None)).await;
                    session.closed(Some("disconnected by client".to_string()));
                    break;
                }
                outgoing = outgoing_rx.recv() => match outgoing {
                    Some(message) => {
                        let json = match serde_json::to_string(&message) {
                            Ok(json) => json,
                            Err(e) => {
                                error!("dropping unserializable outgoing frame: {e}");
                                continue;
                            }
                        };
                        session.log.push(message.kind(), &json);
                        if let Err(e) = sink.send(Message::Text(json.into())).await {
                            session.fail(e.to_string());
                            break;
                        }
                    }
                    None => {
                        debug!("all client handles gone; closing socket");
                        let _ = sink.send(Message::Close(None)).await;
                        session.closed(None);
                        break;
                    }
                },
                frame = stream.next() => match frame {
                    Some(Ok(Message::Text(text))) => session.handle_frame(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => {
                        // The remote occasionally delivers JSON frames as
                        // binary messages.
                        match std::str::from_utf8(&bytes) {
                            Ok(text) => session.handle_frame(text),
                            Err(_) => {
                                session.log.push("server.error", "<non-utf8 binary frame>");
                                warn!("dropping non-utf8 binary frame ({} bytes)", bytes.len());
                            }
                        }
                    }
                    Some(Ok(Message::Close(close_frame))) => {
                        let reason = close_frame
                            .map(|f| f.reason.to_string())
                            .filter(|r| !r.is_empty());
                        session.closed(reason);
                        break;
                    }
                    Some(Ok(_)) => {} // ping/pong handled by the transport
                    Some(Err(e)) => {
                        session.fail(e.to_string());
                        break;
                    }
                    None => {
                        session.closed(None);
                        break;
                    }
                },
            }
        }

        // A handshake still pending here means the session ended before
        // setupComplete; dropping the sender rejects the caller's connect.
        session.take_handshake();
        debug!("session task finished");
    }
}

impl Session {
    /// Decode, log, and dispatch one inbound frame. Malformed frames are
    /// logged and dropped; they never close the connection.
    fn handle_frame(&self, text: &str) {
        let message: IncomingMessage = match serde_json::from_str(text) {
            Ok(message) => message,
            Err(e) => {
                self.log.push("server.error", text);
                warn!("dropping unrecognized frame: {e}");
                return;
            }
        };
        self.log.push(message.kind(), text);

        if matches!(message, IncomingMessage::SetupComplete(_)) {
            if let Some(resolver) = self.take_handshake() {
                self.set_state(ConnectionState::Connected);
                let _ = resolver.send(());
            }
        }

        for event in classify(message) {
            let _ = self.events.send(event);
        }
    }

    fn closed(&self, reason: Option<String>) {
        self.log
            .push("socket.close", reason.clone().unwrap_or_default());
        self.set_state(ConnectionState::Disconnected);
        let _ = self.events.send(LiveEvent::Close { reason });
    }

    fn fail(&self, detail: String) {
        error!("session transport error: {detail}");
        self.log.push("socket.error", &detail);
        self.set_state(ConnectionState::Failed);
        let _ = self.events.send(LiveEvent::Error(detail));
    }

    /// Whether this task still owns the session's shared state. A
    /// disconnect or newer connect attempt moves the epoch past ours.
    fn owns_session(&self) -> bool {
        self.current_epoch.load(Ordering::SeqCst) == self.epoch
    }

    fn set_state(&self, next: ConnectionState) {
        if !self.owns_session() {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    fn take_handshake(&self) -> Option<oneshot::Sender<()>> {
        if !self.owns_session() {
            return None;
        }
        self.handshake.lock().ok().and_then(|mut slot| slot.take())
    }
}
