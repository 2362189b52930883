pub use awc::ws;
use awc::{ws::Codec, BoxedSocket, ClientResponse};

mod error;
pub mod mailbox;
pub mod message;
pub mod probe;
pub mod session;
pub mod settings;

pub use error::Error;
pub use message::{decode, encode, Frame, PeerId};
pub use probe::{Candidates, HostProber};
pub use session::{ClientEvent, ClientSession, ConnectionStatus};

/// Port shared by hub and client unless configured otherwise.
pub const DEFAULT_PORT: u16 = 7008;

/// Path the hub relays on.
pub const CHAT_PATH: &str = "/chat";

/// Liveness path, accepts the handshake and nothing else.
pub const OPEN_PATH: &str = "/open";

pub type WsStream = actix_codec::Framed<BoxedSocket, Codec>;

pub fn ws_url(host: &str, port: u16, path: &str) -> String {
    format!("ws://{host}:{port}{path}")
}

/// Performs the websocket handshake against `url`.
pub async fn connect(url: &str) -> Result<(ClientResponse, WsStream), Error> {
    Ok(awc::Client::new().ws(url).connect().await?)
}
