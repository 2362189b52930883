use std::time::Duration;

use relay_client::{Candidates, HostProber, CHAT_PATH};
use relay_hub::HubEvent;
use tokio_util::sync::CancellationToken;

use crate::helper::{closed_port, wait_for, TestApp};

#[actix_web::test]
async fn scan_finds_only_the_hub() {
    let mut app = TestApp::new();
    app.spawn_app();
    let candidates = Candidates::list([
        app.host(),
        format!("127.0.0.1:{}", closed_port()),
    ]);

    let found = HostProber::new(Duration::from_millis(500))
        .scan(candidates, CancellationToken::new())
        .await;

    assert_eq!(found, vec![app.host()]);
}

#[actix_web::test]
async fn probing_the_open_path_leaves_no_connection() {
    let mut app = TestApp::new();
    app.spawn_app();

    assert!(HostProber::default().probe_one(&app.host()).await);
    assert_eq!(app.hub.connection_count().await.unwrap(), 0);
}

#[actix_web::test]
async fn chat_path_handshake_is_released_again() {
    let mut app = TestApp::new();
    app.spawn_app();

    let mut events = app.hub.subscribe();

    let prober = HostProber::default().path(CHAT_PATH);
    assert!(prober.probe_one(&app.host()).await);

    let removed = wait_for(&mut events, |e| {
        matches!(e, HubEvent::Log { line, .. } if line == "Removing user0!")
    })
    .await;
    assert!(removed.is_some());
    assert_eq!(app.hub.connection_count().await.unwrap(), 0);
}
