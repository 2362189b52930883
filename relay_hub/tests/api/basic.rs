use futures_util::{SinkExt as _, StreamExt as _};
use relay_client::{connect, ws, ws_url, OPEN_PATH};
use relay_hub::ServerStatus;

use crate::helper::{next_text, TestApp};

#[actix_web::test]
async fn spawn_test_app() {
    let mut app = TestApp::new();
    app.spawn_app();
    assert_ne!(app.port, 0);
    assert_eq!(app.hub.port(), Some(app.port));
    assert_eq!(app.hub.status(), ServerStatus::Created);
}

#[actix_web::test]
async fn health_check_works() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let response = reqwest::Client::new()
        .get(&app.path("health_check"))
        .send()
        .await?;
    assert!(response.status().is_success());
    assert_eq!(Some(0), response.content_length());
    Ok(())
}

#[actix_web::test]
async fn client_ping_pong() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut ws = app.raw_client().await;

    ws.send(ws::Message::Ping(actix_web::web::Bytes::new()))
        .await?;

    let mut got_pong = false;
    if let Some(Ok(ws::Frame::Pong(_))) = ws.next().await {
        got_pong = true;
    }
    assert!(got_pong);
    Ok(())
}

#[actix_web::test]
async fn welcome_names_connection_and_counts_users() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let url = ws_url(&app.address, app.port, "/chat");

    let (_res, mut first) = connect(&url).await?;
    assert_eq!(
        next_text(&mut first).await.as_deref(),
        Some("You are connected! id is user0 There are 1 users here.")
    );
    let (_res, mut second) = connect(&url).await?;
    assert_eq!(
        next_text(&mut second).await.as_deref(),
        Some("You are connected! id is user1 There are 2 users here.")
    );
    Ok(())
}

#[actix_web::test]
async fn open_path_does_not_register() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();

    let (_res, mut ws) = connect(&ws_url(&app.address, app.port, OPEN_PATH)).await?;
    ws.send(ws::Message::Ping(actix_web::web::Bytes::new()))
        .await?;
    assert!(matches!(ws.next().await, Some(Ok(ws::Frame::Pong(_)))));

    assert_eq!(app.hub.connection_count().await?, 0);
    Ok(())
}
