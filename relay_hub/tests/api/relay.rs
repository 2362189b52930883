use std::time::Duration;

use actix_web::rt::time::sleep;
use futures_util::SinkExt as _;
use relay_client::{ws, ClientEvent, PeerId};
use relay_hub::HubEvent;

use crate::helper::{next_text, wait_for, TestApp};

fn message(sender: &str, payload: &str) -> ClientEvent {
    ClientEvent::Message {
        sender: sender.parse().unwrap(),
        payload: payload.to_string(),
    }
}

#[actix_web::test]
async fn message_reaches_other_peer_with_sender() {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut hub_events = app.hub.subscribe();
    let alice = app.session("12345").await;
    let bob = app.session("54321").await;
    let mut alice_events = alice.subscribe();
    let mut bob_events = bob.subscribe();

    alice.send("hello");

    let expected = message("12345", "hello");
    assert_eq!(
        wait_for(&mut bob_events, |e| matches!(e, ClientEvent::Message { .. })).await,
        Some(expected)
    );
    assert_eq!(
        wait_for(&mut alice_events, |e| matches!(e, ClientEvent::Sent(_))).await,
        Some(ClientEvent::Sent("hello".to_string()))
    );
    assert_eq!(
        wait_for(&mut hub_events, |e| matches!(e, HubEvent::Message { .. })).await,
        Some(HubEvent::Message {
            sender: "12345".parse().unwrap(),
            payload: "hello".to_string(),
        })
    );
    assert_eq!(*app.hub.latest_output().borrow(), "hello");
    assert_eq!(*bob.latest_output().borrow(), "hello");

    // the hub echoes back to alice, her session drops her own id
    sleep(Duration::from_millis(200)).await;
    while let Ok(event) = alice_events.try_recv() {
        assert!(!matches!(event, ClientEvent::Message { .. }), "{event:?}");
    }
}

#[actix_web::test]
async fn hub_echoes_raw_text_to_sender() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut ws = app.raw_client().await;

    ws.send(ws::Message::Text("12345:a:b:c".into())).await?;
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("12345:a:b:c"));

    ws.send(ws::Message::Text("no prefix".into())).await?;
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("no prefix"));
    Ok(())
}

#[actix_web::test]
async fn unattributed_text_is_relayed_but_not_reported() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut hub_events = app.hub.subscribe();
    let mut ws = app.raw_client().await;

    ws.send(ws::Message::Text("hi:there".into())).await?;
    assert_eq!(next_text(&mut ws).await.as_deref(), Some("hi:there"));

    let reported = wait_for(&mut hub_events, |e| {
        matches!(e, HubEvent::Log { line, .. } if line.contains("hi:there"))
    })
    .await;
    assert!(reported.is_some());
    while let Ok(event) = hub_events.try_recv() {
        assert!(!matches!(event, HubEvent::Message { .. }), "{event:?}");
    }
    assert_eq!(*app.hub.latest_output().borrow(), "");
    Ok(())
}

#[actix_web::test]
async fn operator_message_is_framed_with_system_id() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut ws = app.raw_client().await;
    let session = app.session("11111").await;
    let mut events = session.subscribe();

    app.hub.send("maintenance at noon")?;

    assert_eq!(
        next_text(&mut ws).await.as_deref(),
        Some("00000:maintenance at noon")
    );
    assert_eq!(
        wait_for(&mut events, |e| matches!(e, ClientEvent::Message { .. })).await,
        Some(ClientEvent::Message {
            sender: PeerId::system(),
            payload: "maintenance at noon".to_string(),
        })
    );
    Ok(())
}

#[actix_web::test]
async fn departure_is_announced_to_the_rest() -> anyhow::Result<()> {
    let mut app = TestApp::new();
    app.spawn_app();
    let mut leaving = app.raw_client().await;
    let mut staying = app.raw_client().await;

    leaving
        .send(ws::Message::Close(Some(ws::CloseCode::Normal.into())))
        .await?;

    assert_eq!(
        next_text(&mut staying).await.as_deref(),
        Some("00000:exits user0")
    );
    app.wait_for_connections(1).await;
    Ok(())
}

#[actix_web::test]
async fn unsent_message_is_replaced_by_newer_one() {
    let mut app = TestApp::new();
    app.spawn_app();
    let alice = app.session("12345").await;
    let bob = app.session("54321").await;
    let mut bob_events = bob.subscribe();

    alice.send("first");
    alice.send("second");

    assert_eq!(
        wait_for(&mut bob_events, |e| matches!(e, ClientEvent::Message { .. })).await,
        Some(message("12345", "second"))
    );
}
