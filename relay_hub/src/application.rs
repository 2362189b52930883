use actix::prelude::*;
use actix_web::{dev::ServerHandle, rt, web, App, HttpServer};
use relay_client::message::{encode, PeerId};
use std::{
    net::TcpListener,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, MutexGuard, PoisonError,
    },
    time::Duration,
};
use tokio::{
    sync::{broadcast, mpsc, watch},
    task::JoinHandle,
};
use tracing::{error, info, warn};

use crate::{settings::Settings, Error};

use self::registry::{Broadcast, Count, Registry, Shutdown};

mod connection;
mod events;
pub mod registry;
mod services;
use services::{chat, health_check, open};

pub use events::{HubEvent, Notifier};

/// Pause before and after the listener is stopped.
const STOP_GRACE: Duration = Duration::from_millis(500);

/// Seconds the workers get to finish in-flight requests on stop.
const SHUTDOWN_TIMEOUT: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerStatus {
    Idle,
    Creating,
    Created,
    Stopping,
}

/// State every request handler of a running hub sees.
pub struct HubContext {
    registry: Addr<Registry>,
    notifier: Arc<Notifier>,
    accepting: Arc<AtomicBool>,
}

impl HubContext {
    fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst)
    }
}

struct Running {
    port: u16,
    server: ServerHandle,
    registry: Addr<Registry>,
    accepting: Arc<AtomicBool>,
    outbound: mpsc::UnboundedSender<String>,
    relay: JoinHandle<()>,
}

impl Running {
    async fn shutdown(self) {
        self.accepting.store(false, Ordering::SeqCst);
        self.relay.abort();
        match self.registry.send(Shutdown).await {
            Ok(closed) => info!(closed, "Sent close to every connection"),
            Err(e) => warn!(error = %e, "Registry gone before shutdown"),
        }
        rt::time::sleep(STOP_GRACE).await;
        self.server.stop(true).await;
        rt::time::sleep(STOP_GRACE).await;
    }
}

/// The hub engine. Owned by whoever drives it; must be used from within an
/// actix system.
pub struct RelayHub {
    host: String,
    status: watch::Sender<ServerStatus>,
    notifier: Arc<Notifier>,
    running: Mutex<Option<Running>>,
}

impl RelayHub {
    pub fn new(configuration: &Settings) -> Self {
        let (status, _) = watch::channel(ServerStatus::Idle);
        Self {
            host: configuration.application.host.clone(),
            status,
            notifier: Arc::new(Notifier::new()),
            running: Mutex::new(None),
        }
    }

    /// Binds `port` (0 picks a free one) and starts accepting on `/chat`.
    ///
    /// Returns the bound port. On failure the hub is idle again. Binding is
    /// synchronous; the server itself runs on the current actix system.
    pub fn start(&self, port: u16) -> Result<u16, Error> {
        self.transition("start", ServerStatus::Idle, ServerStatus::Creating)?;
        match self.launch(port) {
            Ok(running) => {
                let port = running.port;
                *self.running() = Some(running);
                self.set_status(ServerStatus::Created);
                Ok(port)
            }
            Err(e) => {
                error!(error = %e, "Could not start hub");
                self.notifier.log("server", e.to_string());
                self.set_status(ServerStatus::Idle);
                Err(e)
            }
        }
    }

    /// Closes every connection, then the listener.
    pub async fn stop(&self) -> Result<(), Error> {
        self.transition("stop", ServerStatus::Created, ServerStatus::Stopping)?;
        let running = self.running().take();
        if let Some(running) = running {
            running.shutdown().await;
        }
        self.set_status(ServerStatus::Idle);
        Ok(())
    }

    /// Relays an operator message to every connection as `00000:<text>`.
    pub fn send(&self, text: impl Into<String>) -> Result<(), Error> {
        let running = self.running();
        let running = running.as_ref().ok_or(Error::NotRunning)?;
        running
            .outbound
            .send(text.into())
            .map_err(|_| Error::NotRunning)
    }

    pub fn port(&self) -> Option<u16> {
        self.running().as_ref().map(|running| running.port)
    }

    pub async fn connection_count(&self) -> Result<usize, Error> {
        let registry = self
            .running()
            .as_ref()
            .map(|running| running.registry.clone());
        match registry {
            Some(registry) => Ok(registry.send(Count).await?),
            None => Ok(0),
        }
    }

    pub fn status(&self) -> ServerStatus {
        *self.status.borrow()
    }

    pub fn status_changes(&self) -> watch::Receiver<ServerStatus> {
        self.status.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.notifier.subscribe()
    }

    pub fn latest_output(&self) -> watch::Receiver<String> {
        self.notifier.latest_output()
    }

    fn launch(&self, port: u16) -> Result<Running, Error> {
        let address = format!("{}:{}", self.host, port);
        let bind_error = |source| Error::Bind {
            address: address.clone(),
            source,
        };
        let listener = TcpListener::bind(&address).map_err(bind_error)?;
        let port = listener.local_addr().map_err(bind_error)?.port();
        info!("Running on port: {port}");

        let registry = Registry::new(self.notifier.clone()).start();
        let accepting = Arc::new(AtomicBool::new(true));
        let context = web::Data::new(HubContext {
            registry: registry.clone(),
            notifier: self.notifier.clone(),
            accepting: accepting.clone(),
        });
        let server = HttpServer::new(move || {
            App::new()
                .app_data(context.clone())
                .service(health_check)
                .service(chat)
                .service(open)
        })
        .shutdown_timeout(SHUTDOWN_TIMEOUT)
        .disable_signals()
        .listen(listener)
        .map_err(bind_error)?
        .run();
        let server_handle = server.handle();
        rt::spawn(async move {
            if let Err(e) = server.await {
                error!(error = %e, "Server stopped with error");
            }
        });

        let (outbound, rx) = mpsc::unbounded_channel();
        let relay = rt::spawn(relay_outbound(rx, registry.clone(), self.notifier.clone()));

        Ok(Running {
            port,
            server: server_handle,
            registry,
            accepting,
            outbound,
            relay,
        })
    }

    fn transition(
        &self,
        action: &'static str,
        from: ServerStatus,
        to: ServerStatus,
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
            self.log_status(to);
            Ok(())
        } else {
            Err(Error::InvalidState {
                action,
                status: actual,
            })
        }
    }

    fn set_status(&self, status: ServerStatus) {
        self.status.send_replace(status);
        self.log_status(status);
    }

    fn log_status(&self, status: ServerStatus) {
        info!(?status, "Server status changed");
        self.notifier.log("server", format!("serverStatus :{status:?}"));
    }

    fn running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Broadcasts operator messages until the hub stops.
async fn relay_outbound(
    mut rx: mpsc::UnboundedReceiver<String>,
    registry: Addr<Registry>,
    notifier: Arc<Notifier>,
) {
    while let Some(text) = rx.recv().await {
        info!(text, "server send");
        notifier.log("server", text.as_str());
        registry.do_send(Broadcast(encode(&PeerId::system(), &text)));
    }
}
