use relay_hub::{settings::Settings, HubEvent, RelayHub};
use tokio::io::{stdin, AsyncBufReadExt as _, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

fn setup() {
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "debug")
    }
    tracing_subscriber::fmt::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    setup();
    let settings = Settings::from_env()?;
    let hub = RelayHub::new(&settings);

    let mut events = hub.subscribe();
    actix_web::rt::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                HubEvent::Message { sender, payload } => println!("[{sender}] {payload}"),
                HubEvent::Log { source, line } => println!("({source}) {line}"),
            }
        }
    });

    hub.start(settings.application.port)?;

    let mut lines = BufReader::new(stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    if let Err(e) = hub.send(line) {
                        warn!(error = %e, "Could not relay");
                    }
                }
                None => {
                    tokio::signal::ctrl_c().await?;
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    hub.stop().await?;
    Ok(())
}
