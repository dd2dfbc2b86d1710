//! Persistent realtime socket.
//!
//! ARCHITECTURE
//! ============
//! [`RealtimeChannel::connect`] spawns one task that owns the websocket. The
//! task reads the access token from the token store before every connection
//! attempt (so a token refreshed over HTTP is picked up on the next
//! reconnect), passes it as `?token=`, and then multiplexes:
//! - inbound text frames → decoded → `broadcast` to subscribers
//! - outbound [`ClientEvent`]s from an mpsc queue → text frames
//!
//! Conversations joined through the channel are re-joined after every
//! reconnect.
//!
//! ERROR HANDLING
//! ==============
//! Connect failures and dropped sockets are logged and retried with
//! exponential backoff, 1s doubling to 10s, reset after a successful
//! connect. Undecodable frames are logged and skipped. Dropping the channel
//! aborts the task.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};

use crate::session::store::TokenStore;

use super::event::{ClientEvent, RealtimeEvent};

const INITIAL_BACKOFF: Duration = Duration::from_millis(1_000);
const MAX_BACKOFF: Duration = Duration::from_millis(10_000);
const EVENT_CHANNEL_CAPACITY: usize = 256;

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
}

pub struct RealtimeChannel {
    events: broadcast::Sender<RealtimeEvent>,
    status: watch::Receiver<ConnectionStatus>,
    outgoing: mpsc::UnboundedSender<ClientEvent>,
    joined: Arc<Mutex<BTreeSet<String>>>,
    task: JoinHandle<()>,
}

impl RealtimeChannel {
    /// Start the connection task. Must be called inside a tokio runtime.
    #[must_use]
    pub fn connect(url: impl Into<String>, store: Arc<dyn TokenStore>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (status_tx, status) = watch::channel(ConnectionStatus::Disconnected);
        let (outgoing, outgoing_rx) = mpsc::unbounded_channel();
        let joined = Arc::new(Mutex::new(BTreeSet::new()));

        let worker = Worker { url: url.into(), store, events: events.clone(), status: status_tx, joined: joined.clone() };
        let task = tokio::spawn(worker.run(outgoing_rx));

        Self { events, status, outgoing, joined, task }
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<RealtimeEvent> {
        self.events.subscribe()
    }

    #[must_use]
    pub fn status(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.clone()
    }

    /// Queue an event for the socket. Returns `false` once the task is gone.
    pub fn send(&self, event: ClientEvent) -> bool {
        self.outgoing.send(event).is_ok()
    }

    pub fn join_conversation(&self, conversation_id: &str) -> bool {
        lock_joined(&self.joined).insert(conversation_id.to_owned());
        self.send(ClientEvent::JoinConversation { conversation_id: conversation_id.to_owned() })
    }

    pub fn leave_conversation(&self, conversation_id: &str) -> bool {
        lock_joined(&self.joined).remove(conversation_id);
        self.send(ClientEvent::LeaveConversation { conversation_id: conversation_id.to_owned() })
    }

    pub fn start_typing(&self, conversation_id: &str) -> bool {
        self.send(ClientEvent::TypingStart { conversation_id: conversation_id.to_owned() })
    }

    pub fn stop_typing(&self, conversation_id: &str) -> bool {
        self.send(ClientEvent::TypingStop { conversation_id: conversation_id.to_owned() })
    }

    pub fn mark_read(&self, conversation_id: &str) -> bool {
        self.send(ClientEvent::MarkRead { conversation_id: conversation_id.to_owned() })
    }
}

impl Drop for RealtimeChannel {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock_joined(joined: &Mutex<BTreeSet<String>>) -> std::sync::MutexGuard<'_, BTreeSet<String>> {
    joined.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Why a live connection ended.
enum Disconnect {
    /// Server closed or the socket errored; reconnect.
    Lost(String),
    /// Every channel handle is gone; stop.
    Shutdown,
}

struct Worker {
    url: String,
    store: Arc<dyn TokenStore>,
    events: broadcast::Sender<RealtimeEvent>,
    status: watch::Sender<ConnectionStatus>,
    joined: Arc<Mutex<BTreeSet<String>>>,
}

impl Worker {
    async fn run(self, mut outgoing: mpsc::UnboundedReceiver<ClientEvent>) {
        let mut backoff = INITIAL_BACKOFF;

        loop {
            self.status.send_replace(ConnectionStatus::Connecting);

            match self.open().await {
                Ok(socket) => {
                    backoff = INITIAL_BACKOFF;
                    self.status.send_replace(ConnectionStatus::Connected);
                    info!("realtime connected");
                    match self.serve(socket, &mut outgoing).await {
                        Disconnect::Lost(reason) => warn!(reason = %reason, "realtime connection lost"),
                        Disconnect::Shutdown => {
                            self.status.send_replace(ConnectionStatus::Disconnected);
                            return;
                        }
                    }
                }
                Err(e) => warn!(error = %e, "realtime connect failed"),
            }

            self.status.send_replace(ConnectionStatus::Disconnected);
            debug!(backoff = ?backoff, "realtime reconnect scheduled");
            tokio::time::sleep(backoff).await;
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    async fn open(&self) -> Result<Socket, String> {
        let token = self.store.access_token().ok_or_else(|| "no access token".to_owned())?;
        let url = url_with_token(&self.url, &token)?;
        let (socket, _) = connect_async(url.as_str()).await.map_err(|e| e.to_string())?;
        Ok(socket)
    }

    async fn serve(&self, mut socket: Socket, outgoing: &mut mpsc::UnboundedReceiver<ClientEvent>) -> Disconnect {
        let rejoin: Vec<String> = lock_joined(&self.joined).iter().cloned().collect();
        for conversation_id in rejoin {
            if let Err(reason) = send_event(&mut socket, &ClientEvent::JoinConversation { conversation_id }).await {
                return Disconnect::Lost(reason);
            }
        }

        loop {
            tokio::select! {
                inbound = socket.next() => match inbound {
                    Some(Ok(WsMessage::Text(text))) => self.dispatch(&text),
                    Some(Ok(WsMessage::Close(_))) | None => return Disconnect::Lost("closed by server".to_owned()),
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Disconnect::Lost(e.to_string()),
                },
                queued = outgoing.recv() => match queued {
                    Some(event) => {
                        if let Err(reason) = send_event(&mut socket, &event).await {
                            return Disconnect::Lost(reason);
                        }
                    }
                    None => {
                        let _ = socket.close(None).await;
                        return Disconnect::Shutdown;
                    }
                },
            }
        }
    }

    fn dispatch(&self, text: &str) {
        match RealtimeEvent::decode(text) {
            Ok(Some(event)) => {
                // No subscribers is fine.
                let _ = self.events.send(event);
            }
            Ok(None) => debug!("ignoring unknown realtime event"),
            Err(e) => warn!(error = %e, "dropping undecodable realtime frame"),
        }
    }
}

async fn send_event(socket: &mut Socket, event: &ClientEvent) -> Result<(), String> {
    let text = event.encode().map_err(|e| e.to_string())?;
    socket.send(WsMessage::Text(text.into())).await.map_err(|e| e.to_string())
}

/// Append `token` as a query parameter, keeping any existing query.
pub(crate) fn url_with_token(url: &str, token: &str) -> Result<reqwest::Url, String> {
    let mut url = reqwest::Url::parse(url).map_err(|e| format!("invalid realtime url {url}: {e}"))?;
    url.query_pairs_mut().append_pair("token", token);
    Ok(url)
}

#[cfg(test)]
#[path = "channel_test.rs"]
mod tests;
