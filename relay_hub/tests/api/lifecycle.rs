use std::net::TcpListener;

use relay_client::{connect, ws_url, ClientEvent, ClientSession, ConnectionStatus, CHAT_PATH};
use relay_hub::{
    settings::{ApplicationSettings, Settings},
    Error, RelayHub, ServerStatus,
};

use crate::helper::{closed_by_hub, enable_tracing, wait_for, wait_for_status, TestApp};

#[actix_web::test]
async fn start_twice_is_rejected() {
    let mut app = TestApp::new();
    app.spawn_app();

    let result = app.hub.start(0);

    assert!(matches!(
        result,
        Err(Error::InvalidState {
            status: ServerStatus::Created,
            ..
        })
    ));
    assert_eq!(app.hub.port(), Some(app.port));
}

#[actix_web::test]
async fn bind_failure_leaves_hub_idle() {
    enable_tracing();
    let occupied = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = occupied.local_addr().unwrap().port();
    let hub = RelayHub::new(&Settings {
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port,
        },
    });

    let result = hub.start(port);

    assert!(matches!(result, Err(Error::Bind { .. })));
    assert_eq!(hub.status(), ServerStatus::Idle);
    assert_eq!(hub.port(), None);

    let port = hub.start(0).unwrap();
    assert_ne!(port, 0);
    hub.stop().await.unwrap();
}

#[actix_web::test]
async fn stop_closes_every_connection() {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut first = app.raw_client().await;
    let mut second = app.raw_client().await;
    app.wait_for_connections(2).await;
    let health_check = app.path("health_check");

    let (stopped, seen_while_stopping) = tokio::join!(app.hub.stop(), async {
        let first_closed = closed_by_hub(&mut first).await;
        let second_closed = closed_by_hub(&mut second).await;
        let status = app.hub.status();
        // the listener is still up once every close frame is out
        let listening = reqwest::get(&health_check)
            .await
            .map(|response| response.status().is_success())
            .unwrap_or(false);
        (first_closed, second_closed, status, listening)
    });

    stopped.unwrap();
    assert_eq!(
        seen_while_stopping,
        (true, true, ServerStatus::Stopping, true)
    );
    assert_eq!(app.hub.status(), ServerStatus::Idle);
    assert_eq!(app.hub.port(), None);
    assert_eq!(app.hub.connection_count().await.unwrap(), 0);
    assert!(connect(&ws_url(&app.address, app.port, CHAT_PATH))
        .await
        .is_err());
}

#[actix_web::test]
async fn stop_and_send_need_a_running_hub() {
    let app = TestApp::new();

    assert!(matches!(
        app.hub.stop().await,
        Err(Error::InvalidState {
            status: ServerStatus::Idle,
            ..
        })
    ));
    assert!(matches!(app.hub.send("anyone?"), Err(Error::NotRunning)));
}

#[actix_web::test]
async fn hub_can_restart_after_stop() {
    let mut app = TestApp::new();
    app.spawn_app();
    app.hub.stop().await.unwrap();

    app.spawn_app();

    assert_eq!(app.hub.status(), ServerStatus::Created);
    let _ws = app.raw_client().await;
    app.wait_for_connections(1).await;
}

#[actix_web::test]
async fn session_disconnect_returns_to_idle() {
    let mut app = TestApp::new();
    app.spawn_app();
    let session = app.session("12345").await;
    let mut events = session.subscribe();
    assert_eq!(session.status(), ConnectionStatus::Connected);

    session.disconnect().await.unwrap();

    assert_eq!(session.status(), ConnectionStatus::Idle);
    assert_eq!(
        wait_for(&mut events, |e| *e == ClientEvent::Closed).await,
        Some(ClientEvent::Closed)
    );
    app.wait_for_connections(0).await;
}

#[actix_web::test]
async fn session_toggles_between_connected_and_idle() {
    let mut app = TestApp::new();
    app.spawn_app();
    let session = ClientSession::new();
    let mut status = session.status_changes();

    assert_eq!(
        session.toggle(&app.address, app.port),
        Some(ConnectionStatus::Connecting)
    );
    assert!(wait_for_status(&mut status, ConnectionStatus::Connected).await);

    assert_eq!(
        session.toggle(&app.address, app.port),
        Some(ConnectionStatus::Disconnecting)
    );
    assert!(wait_for_status(&mut status, ConnectionStatus::Idle).await);
}

#[actix_web::test]
async fn toggle_is_ignored_while_disconnecting() {
    let mut app = TestApp::new();
    app.spawn_app();
    let session = app.session("12345").await;
    let mut status = session.status_changes();

    assert_eq!(
        session.toggle(&app.address, app.port),
        Some(ConnectionStatus::Disconnecting)
    );
    assert_eq!(session.toggle(&app.address, app.port), None);
    assert_eq!(session.status(), ConnectionStatus::Disconnecting);

    assert!(wait_for_status(&mut status, ConnectionStatus::Idle).await);
    assert!(matches!(
        session.disconnect().await,
        Err(relay_client::Error::InvalidState {
            status: ConnectionStatus::Idle,
            ..
        })
    ));
}

#[actix_web::test]
async fn session_goes_idle_when_hub_stops() {
    let mut app = TestApp::new();
    app.spawn_app();
    let session = app.session("12345").await;
    let mut status = session.status_changes();
    let mut events = session.subscribe();

    app.hub.stop().await.unwrap();

    assert!(wait_for_status(&mut status, ConnectionStatus::Idle).await);
    assert_eq!(
        wait_for(&mut events, |e| *e == ClientEvent::Closed).await,
        Some(ClientEvent::Closed)
    );
}
