use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use actix::prelude::*;
use actix_web_actors::ws;
use relay_client::decode;
use tracing::{debug, error, info, warn};

pub use ws::start;

use super::{
    events::Notifier,
    registry::{self, Broadcast, ConnectionName, Outgoing, Register, Registry, Unregister},
};

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(15);

/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(15);

/// One accepted `/chat` socket.
///
/// Registers itself when started and unregisters when stopped, whatever made
/// it stop.
pub struct WsConnection {
    name: Option<ConnectionName>,
    heartbeat: Instant,
    registry: Addr<Registry>,
    notifier: Arc<Notifier>,
}

impl WsConnection {
    pub fn new(registry: Addr<Registry>, notifier: Arc<Notifier>) -> Self {
        Self {
            name: None,
            heartbeat: Instant::now(),
            registry,
            notifier,
        }
    }

    /// helper method that sends ping to client every 15 seconds (HEARTBEAT_INTERVAL).
    ///
    /// also this method checks heartbeats from client
    fn heartbeat(&self, ctx: &mut <Self as Actor>::Context) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            // check client heartbeats, the last pong answers the previous ping
            if Instant::now().duration_since(act.heartbeat) > HEARTBEAT_INTERVAL + CLIENT_TIMEOUT {
                // heartbeat timed out
                error!(name = %act.label(), "Websocket Client heartbeat failed, disconnecting!");

                // stop actor
                ctx.stop();

                return;
            }

            ctx.ping(b"");
        });
    }

    fn label(&self) -> String {
        self.name.map(|name| name.to_string()).unwrap_or_default()
    }

    /// Reports attributed messages, then hands the untouched text to everyone.
    fn relay(&self, text: &str) {
        debug!(name = %self.label(), text, "server received");
        self.notifier.log("server", format!("server received :{text}"));
        let decoded = decode(text);
        if let Some(sender) = decoded.sender {
            self.notifier.message(sender, decoded.payload);
        }
        self.registry.do_send(Broadcast(text.to_owned()));
    }
}

impl Handler<Outgoing> for WsConnection {
    type Result = ();

    fn handle(&mut self, msg: Outgoing, ctx: &mut Self::Context) -> Self::Result {
        match msg {
            Outgoing::Text(text) => ctx.text(text),
            Outgoing::Close => {
                info!(name = %self.label(), "Closing connection");
                ctx.close(Some(ws::CloseCode::Normal.into()));
                ctx.stop();
            }
        }
    }
}

impl Actor for WsConnection {
    type Context = ws::WebsocketContext<Self>;

    /// Method is called on actor start. We start the heartbeat process here.
    fn started(&mut self, ctx: &mut Self::Context) {
        self.heartbeat(ctx);

        let addr = ctx.address();
        self.registry
            .send(Register {
                addr: addr.recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(Ok(registered)) => {
                        act.name = Some(registered.name);
                        let welcome = format!(
                            "You are connected! id is {} There are {} users here.",
                            registered.name, registered.count
                        );
                        ctx.text(welcome.as_str());
                        act.notifier
                            .log("server", format!("server send {welcome}"));
                    }
                    Ok(Err(registry::Error::ShuttingDown)) => {
                        warn!("Hub is shutting down, refusing connection");
                        ctx.close(Some(ws::CloseCode::Away.into()));
                        ctx.stop();
                    }
                    Err(e) => {
                        error!(?e);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(name) = self.name.take() {
            info!(%name, "Removing connection");
            self.registry.do_send(Unregister { name });
        }
        Running::Stop
    }
}

/// Handler for ws::Message message
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WsConnection {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.heartbeat = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.heartbeat = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                self.heartbeat = Instant::now();
                self.relay(&text);
            }
            Ok(ws::Message::Binary(_)) => debug!("Ignoring binary frame"),
            Ok(ws::Message::Close(reason)) => {
                self.notifier.log(
                    "server",
                    format!("server received close from:{}", self.label()),
                );
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => ctx.stop(),
            Err(e) => {
                warn!(name = %self.label(), error = %e, "Protocol error");
                ctx.stop();
            }
        }
    }
}

/// Socket behind `/open`: accepts the handshake and waits for the prober to
/// hang up.
pub struct ProbeSocket;

impl Actor for ProbeSocket {
    type Context = ws::WebsocketContext<Self>;
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ProbeSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => ctx.pong(&msg),
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            Ok(_) => {}
            Err(_) => ctx.stop(),
        }
    }
}
