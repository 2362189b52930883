//! Discovery of reachable hubs by attempting handshakes.

use std::{
    io,
    net::{Ipv4Addr, SocketAddr, UdpSocket},
    time::Duration,
};

use futures_util::{future, stream, SinkExt as _, Stream, StreamExt as _};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::{connect, ws, OPEN_PATH};

pub const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Enough to have a whole /24 in flight at once.
const MAX_IN_FLIGHT: usize = 256;

/// Addresses to probe, as `host:port`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Candidates {
    List(Vec<String>),
    /// Hosts `.1` to `.254` of the /24 around `network`.
    Subnet { network: Ipv4Addr, port: u16 },
}

impl Candidates {
    pub fn list<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(addresses.into_iter().map(Into::into).collect())
    }

    pub fn subnet(address: Ipv4Addr, port: u16) -> Self {
        let [a, b, c, _] = address.octets();
        Self::Subnet {
            network: Ipv4Addr::new(a, b, c, 0),
            port,
        }
    }
}

impl IntoIterator for Candidates {
    type Item = String;
    type IntoIter = Box<dyn Iterator<Item = String> + Send>;

    fn into_iter(self) -> Self::IntoIter {
        match self {
            Candidates::List(addresses) => Box::new(addresses.into_iter()),
            Candidates::Subnet { network, port } => {
                let [a, b, c, _] = network.octets();
                Box::new((1..=254u8).map(move |host| format!("{a}.{b}.{c}.{host}:{port}")))
            }
        }
    }
}

/// IPv4 address of the interface that routes outside the host.
///
/// Connecting a UDP socket only selects a route, nothing is sent.
pub fn local_ipv4() -> io::Result<Ipv4Addr> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;
    socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
    match socket.local_addr()? {
        SocketAddr::V4(addr) if !addr.ip().is_unspecified() => Ok(*addr.ip()),
        addr => Err(io::Error::new(
            io::ErrorKind::AddrNotAvailable,
            format!("no IPv4 route, bound to {addr}"),
        )),
    }
}

#[derive(Debug, Clone)]
pub struct HostProber {
    timeout: Duration,
    path: String,
}

impl Default for HostProber {
    fn default() -> Self {
        Self::new(PROBE_TIMEOUT)
    }
}

impl HostProber {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            path: OPEN_PATH.to_string(),
        }
    }

    /// Probe a different path, e.g. the chat endpoint of an older hub.
    pub fn path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Whether `address` completes a websocket handshake in time. Never fails.
    pub async fn probe_one(&self, address: &str) -> bool {
        let url = format!("ws://{address}{}", self.path);
        match actix_rt::time::timeout(self.timeout, connect(&url)).await {
            Ok(Ok((_res, mut ws))) => {
                let _ = ws
                    .send(ws::Message::Close(Some(ws::CloseCode::Normal.into())))
                    .await;
                debug!(%address, "Hub answered");
                true
            }
            Ok(Err(e)) => {
                debug!(%address, error = %e, "Probe failed");
                false
            }
            Err(_) => {
                debug!(%address, "Probe timed out");
                false
            }
        }
    }

    /// Yields each reachable candidate as soon as its probe succeeds.
    ///
    /// All candidates are probed concurrently. Cancelling `cancel` ends the
    /// stream and drops the probes still in flight.
    pub fn scan_stream<'a, I>(
        &'a self,
        candidates: I,
        cancel: CancellationToken,
    ) -> impl Stream<Item = String> + 'a
    where
        I: IntoIterator<Item = String>,
        I::IntoIter: 'a,
    {
        stream::iter(candidates)
            .map(move |address| async move { self.probe_one(&address).await.then_some(address) })
            .buffer_unordered(MAX_IN_FLIGHT)
            .filter_map(future::ready)
            .take_until(async move { cancel.cancelled().await })
    }

    /// Probes every candidate and returns the reachable ones once all resolved.
    pub async fn scan<I>(&self, candidates: I, cancel: CancellationToken) -> Vec<String>
    where
        I: IntoIterator<Item = String>,
    {
        let found: Vec<String> = self.scan_stream(candidates, cancel).collect().await;
        info!(count = found.len(), ?found, "Scan finished");
        found
    }
}
