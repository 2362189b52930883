use relay_client::PeerId;
use tokio::sync::{broadcast, watch};
use tracing::info;

const EVENT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Attributed message received from a peer.
    Message { sender: PeerId, payload: String },
    /// Activity line, `source` is `server` or the id the line belongs to.
    Log { source: String, line: String },
}

/// Fan-out of hub activity to whoever drives the hub.
#[derive(Debug)]
pub struct Notifier {
    events: broadcast::Sender<HubEvent>,
    output: watch::Sender<String>,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (output, _) = watch::channel(String::new());
        Self { events, output }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.events.subscribe()
    }

    /// Payload of the most recent attributed message.
    pub fn latest_output(&self) -> watch::Receiver<String> {
        self.output.subscribe()
    }

    pub fn log(&self, source: impl Into<String>, line: impl Into<String>) {
        let _ = self.events.send(HubEvent::Log {
            source: source.into(),
            line: line.into(),
        });
    }

    pub fn message(&self, sender: PeerId, payload: &str) {
        info!(%sender, payload, "server receive client message");
        self.log(sender.as_str(), payload);
        self.output.send_replace(payload.to_owned());
        let _ = self.events.send(HubEvent::Message {
            sender,
            payload: payload.to_owned(),
        });
    }
}
