use anyhow::{anyhow, Context as _};
use relay_client::{
    probe::local_ipv4, settings::ClientSettings, Candidates, ClientEvent, ClientSession,
    ConnectionStatus, HostProber,
};
use tokio::io::{stdin, AsyncBufReadExt as _, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

fn setup() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug")
    }
    tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

async fn find_hub(settings: &ClientSettings) -> anyhow::Result<String> {
    if let Some(host) = &settings.host {
        return Ok(host.clone());
    }
    let local = local_ipv4().context("Could not determine local address")?;
    info!(%local, "No host configured, scanning subnet");
    let found = HostProber::new(settings.probe_timeout())
        .scan(
            Candidates::subnet(local, settings.port),
            CancellationToken::new(),
        )
        .await;
    let address = found
        .into_iter()
        .next()
        .ok_or_else(|| anyhow!("No hub found around {local}"))?;
    let host = address
        .rsplit_once(':')
        .map(|(host, _)| host.to_string())
        .unwrap_or(address);
    Ok(host)
}

#[actix_rt::main]
async fn main() -> anyhow::Result<()> {
    setup();
    let settings = ClientSettings::from_env()?;
    let host = find_hub(&settings).await?;

    let session = ClientSession::new();
    let mut events = session.subscribe();
    session.connect(&host, settings.port).await?;
    info!(peer_id = %session.peer_id(), %host, "Connected, type to send");

    actix_rt::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                ClientEvent::Message { sender, payload } => println!("[{sender}] {payload}"),
                ClientEvent::Server(line) => println!("[server] {line}"),
                ClientEvent::Sent(payload) => println!("[me] {payload}"),
                ClientEvent::ConnectFailed(reason) => warn!(%reason, "Connection failed"),
                ClientEvent::Closed => break,
            }
        }
    });

    let mut status = session.status_changes();
    let mut lines = BufReader::new(stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => session.send(line),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() || *status.borrow() == ConnectionStatus::Idle {
                    info!("Hub closed the session");
                    return Ok(());
                }
            }
        }
    }

    if let Err(e) = session.disconnect().await {
        warn!(error = %e, "Session already closed");
    }
    Ok(())
}
