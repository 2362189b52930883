use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures_util::{SinkExt, StreamExt as _};
use tokio::{
    select,
    sync::{broadcast, watch},
    task::JoinHandle,
};
use tracing::{debug, error, info, warn};

use crate::{
    connect,
    mailbox::Mailbox,
    message::{decode, encode, Frame, PeerId},
    ws, ws_url, Error, WsStream, CHAT_PATH,
};

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Message relayed from another peer.
    Message { sender: PeerId, payload: String },
    /// Line without a sender prefix, e.g. the hub's welcome.
    Server(String),
    /// Local echo of a message that was written to the socket.
    Sent(String),
    ConnectFailed(String),
    /// The session ended and its socket was released.
    Closed,
}

#[derive(Debug)]
enum Exit {
    Local,
    Remote(Option<ws::CloseReason>),
    Dropped,
}

/// One outbound connection to a hub.
///
/// Cloning yields another handle to the same session. The session runs on the
/// actix runtime it was connected from.
#[derive(Debug, Clone)]
pub struct ClientSession {
    shared: Arc<Shared>,
}

#[derive(Debug)]
struct Shared {
    peer_id: PeerId,
    status: watch::Sender<ConnectionStatus>,
    outbound: Mailbox<Frame>,
    events: broadcast::Sender<ClientEvent>,
    output: watch::Sender<String>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Default for ClientSession {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientSession {
    pub fn new() -> Self {
        Self::with_peer_id(PeerId::random())
    }

    pub fn with_peer_id(peer_id: PeerId) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Idle);
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (output, _) = watch::channel(String::new());
        Self {
            shared: Arc::new(Shared {
                peer_id,
                status,
                outbound: Mailbox::new(),
                events,
                output,
                task: Mutex::new(None),
            }),
        }
    }

    pub fn peer_id(&self) -> &PeerId {
        &self.shared.peer_id
    }

    pub fn status(&self) -> ConnectionStatus {
        *self.shared.status.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<ConnectionStatus> {
        self.shared.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.shared.events.subscribe()
    }

    /// Payload of the most recent message from another peer.
    pub fn latest_output(&self) -> watch::Receiver<String> {
        self.shared.output.subscribe()
    }

    /// Queues `text` for the hub, replacing anything not yet written.
    pub fn send(&self, text: impl Into<String>) {
        if let Some(replaced) = self.shared.outbound.put(Frame::Text(text.into())) {
            debug!(?replaced, "Overwrote unsent frame");
        }
    }

    /// Connects to `ws://host:port/chat`. Only valid while idle.
    pub async fn connect(&self, host: &str, port: u16) -> Result<(), Error> {
        self.shared.begin_connect()?;
        self.open(host, port).await
    }

    /// Sends a close frame and waits for the session to wind down.
    pub async fn disconnect(&self) -> Result<(), Error> {
        self.shared.transition(
            "disconnect",
            ConnectionStatus::Connected,
            ConnectionStatus::Disconnecting,
        )?;
        self.close().await;
        Ok(())
    }

    /// Connects when idle, disconnects when connected, otherwise does nothing.
    ///
    /// Returns the status entered, `None` when the toggle was ignored.
    pub fn toggle(&self, host: &str, port: u16) -> Option<ConnectionStatus> {
        if self.shared.begin_connect().is_ok() {
            let session = self.clone();
            let host = host.to_owned();
            actix_rt::spawn(async move {
                let _ = session.open(&host, port).await;
            });
            return Some(ConnectionStatus::Connecting);
        }
        if self
            .shared
            .transition(
                "disconnect",
                ConnectionStatus::Connected,
                ConnectionStatus::Disconnecting,
            )
            .is_ok()
        {
            let session = self.clone();
            actix_rt::spawn(async move { session.close().await });
            return Some(ConnectionStatus::Disconnecting);
        }
        debug!(status = ?self.status(), "Ignoring toggle");
        None
    }

    async fn open(&self, host: &str, port: u16) -> Result<(), Error> {
        let url = ws_url(host, port, CHAT_PATH);
        info!(%url, peer_id = %self.shared.peer_id, "Connecting");
        let ws = match connect(&url).await {
            Ok((res, ws)) => {
                debug!(?res);
                ws
            }
            Err(e) => {
                error!(%url, error = %e, "Could not connect");
                self.shared.emit(ClientEvent::ConnectFailed(e.to_string()));
                self.shared.set_status(ConnectionStatus::Idle);
                return Err(e);
            }
        };
        self.shared.set_status(ConnectionStatus::Connected);
        let handle = actix_rt::spawn(self.shared.clone().run(ws));
        *self.shared.task() = Some(handle);
        Ok(())
    }

    async fn close(&self) {
        self.shared.outbound.put(Frame::Close);
        let task = self.shared.task().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Session task did not finish cleanly");
            }
        }
        let _ = self.shared.transition(
            "finish disconnect",
            ConnectionStatus::Disconnecting,
            ConnectionStatus::Idle,
        );
    }
}

impl Shared {
    fn begin_connect(&self) -> Result<(), Error> {
        self.transition(
            "connect",
            ConnectionStatus::Idle,
            ConnectionStatus::Connecting,
        )?;
        self.outbound.clear();
        Ok(())
    }

    async fn run(self: Arc<Self>, ws: WsStream) {
        let _teardown = Teardown(self.clone());
        // declared after the guard so the socket is released first
        let mut ws = ws;

        let exit = self.relay(&mut ws).await;
        match &exit {
            Ok(Exit::Local) => info!(peer_id = %self.peer_id, "Disconnected"),
            Ok(Exit::Remote(reason)) => info!(?reason, "Hub closed the connection"),
            Ok(Exit::Dropped) => warn!("Connection dropped"),
            Err(e) => error!(error = %e, "Session failed"),
        }
        if !matches!(exit, Ok(Exit::Local)) {
            let _ = ws.send(ws::Message::Close(None)).await;
        }
        let _ = SinkExt::<ws::Message>::close(&mut ws).await;
    }

    async fn relay(&self, ws: &mut WsStream) -> Result<Exit, Error> {
        loop {
            select! {
                frame = self.outbound.recv() => {
                    if let Some(exit) = self.handle_outbound(ws, frame).await? {
                        return Ok(exit);
                    }
                }
                frame = ws.next() => match frame {
                    Some(frame) => {
                        if let Some(exit) = self.handle_inbound(ws, frame?).await? {
                            return Ok(exit);
                        }
                    }
                    None => return Ok(Exit::Dropped),
                }
            }
        }
    }

    async fn handle_outbound(&self, ws: &mut WsStream, frame: Frame) -> Result<Option<Exit>, Error> {
        match frame {
            Frame::Text(text) => {
                let wire = encode(&self.peer_id, &text);
                debug!(%wire, "Sending");
                ws.send(ws::Message::Text(wire.into())).await?;
                self.emit(ClientEvent::Sent(text));
                Ok(None)
            }
            Frame::Close => {
                ws.send(ws::Message::Close(Some(ws::CloseCode::Normal.into())))
                    .await?;
                Ok(Some(Exit::Local))
            }
        }
    }

    async fn handle_inbound(
        &self,
        ws: &mut WsStream,
        frame: ws::Frame,
    ) -> Result<Option<Exit>, Error> {
        match frame {
            ws::Frame::Text(bytes) => {
                let text = std::str::from_utf8(&bytes)?;
                let decoded = decode(text);
                match decoded.sender {
                    Some(sender) if sender == self.peer_id => {
                        debug!(payload = decoded.payload, "Own message relayed back");
                    }
                    Some(sender) => {
                        info!(%sender, payload = decoded.payload, "Received");
                        self.output.send_replace(decoded.payload.to_owned());
                        self.emit(ClientEvent::Message {
                            sender,
                            payload: decoded.payload.to_owned(),
                        });
                    }
                    None => {
                        info!(text, "Server says");
                        self.emit(ClientEvent::Server(text.to_owned()));
                    }
                }
                Ok(None)
            }
            ws::Frame::Ping(bytes) => {
                ws.send(ws::Message::Pong(bytes)).await?;
                Ok(None)
            }
            ws::Frame::Pong(_) => Ok(None),
            ws::Frame::Close(reason) => Ok(Some(Exit::Remote(reason))),
            ws::Frame::Binary(_) | ws::Frame::Continuation(_) => {
                warn!("Ignoring non text frame");
                Ok(None)
            }
        }
    }

    fn transition(
        &self,
        action: &'static str,
        from: ConnectionStatus,
        to: ConnectionStatus,
    ) -> Result<(), Error> {
        let mut actual = from;
        let changed = self.status.send_if_modified(|status| {
            if *status == from {
                *status = to;
                true
            } else {
                actual = *status;
                false
            }
        });
        if changed {
            info!(?from, ?to, "Connection status changed");
            Ok(())
        } else {
            Err(Error::InvalidState {
                action,
                status: actual,
            })
        }
    }

    fn set_status(&self, status: ConnectionStatus) {
        let previous = self.status.send_replace(status);
        if previous != status {
            info!(from = ?previous, to = ?status, "Connection status changed");
        }
    }

    fn emit(&self, event: ClientEvent) {
        let _ = self.events.send(event);
    }

    fn task(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.task.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Puts the session back to idle however the run loop ended.
struct Teardown(Arc<Shared>);

impl Drop for Teardown {
    fn drop(&mut self) {
        let shared = &self.0;
        shared.outbound.clear();
        shared.task().take();
        shared.set_status(ConnectionStatus::Idle);
        shared.emit(ClientEvent::Closed);
    }
}
