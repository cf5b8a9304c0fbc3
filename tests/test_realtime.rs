//! End-to-end WebSocket sessions against a live server.

use futures::StreamExt;
use pixelwar::store::MemoryStore;
use pixelwar::types::CellKey;
use pixelwar::ServerConfig;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;

mod common;
use common::*;

#[tokio::test]
async fn test_new_viewer_receives_snapshot_then_deltas() {
    let server = TestServer::start().await;

    let mut painter = server.connect().await;
    let init = next_event(&mut painter).await;
    assert_eq!(init["event"], "init_state");
    assert_eq!(init["data"], json!([]));

    send_event(&mut painter, "paint_pixel", json!({ "key": "4,2", "color": "#FF0000" })).await;
    let echo = next_named(&mut painter, "pixel_update").await;
    assert_eq!(echo["data"], json!({ "key": "4,2", "color": "#FF0000" }));

    let mut viewer = server.connect().await;
    let init = next_event(&mut viewer).await;
    assert_eq!(init["event"], "init_state");
    assert_eq!(init["data"], json!([["4,2", "#FF0000"]]));

    send_event(&mut painter, "paint_pixel", json!({ "key": "4,2", "color": "#00FF00" })).await;
    send_event(&mut painter, "erase_pixel", json!({ "key": "4,2" })).await;

    let update = next_event(&mut viewer).await;
    assert_eq!(update["event"], "pixel_update");
    assert_eq!(update["data"]["color"], "#00FF00");
    let erase = next_event(&mut viewer).await;
    assert_eq!(erase["event"], "pixel_erase");
    assert_eq!(erase["data"], json!({ "key": "4,2" }));

    server.stop().await;
}

#[tokio::test]
async fn test_batch_paint_over_socket() {
    let server = TestServer::start().await;
    let mut ws = server.connect().await;
    next_named(&mut ws, "init_state").await;

    send_event(
        &mut ws,
        "batch_paint",
        json!({ "updates": [
            { "key": "0,0", "color": "#111111" },
            { "key": "0,1", "color": "#222222" }
        ]}),
    )
    .await;

    let batch = next_named(&mut ws, "batch_update").await;
    assert_eq!(
        batch["data"],
        json!([
            { "key": "0,0", "color": "#111111" },
            { "key": "0,1", "color": "#222222" }
        ])
    );

    server.state.engine.flush().await;
    assert_eq!(server.store.cell_count(), 2);
    server.stop().await;
}

#[tokio::test]
async fn test_unreadable_frames_are_ignored() {
    let server = TestServer::start().await;
    let mut ws = server.connect().await;
    next_named(&mut ws, "init_state").await;

    send_event(&mut ws, "no_such_event", json!({})).await;
    send_raw(&mut ws, "not json at all").await;
    send_event(&mut ws, "paint_pixel", json!({ "color": "#FFFFFF" })).await;
    send_event(&mut ws, "paint_pixel", json!({ "key": "1,1", "color": "#FFFFFF" })).await;

    let update = next_named(&mut ws, "pixel_update").await;
    assert_eq!(update["data"]["key"], "1,1");

    server.stop().await;
}

#[tokio::test]
async fn test_global_chat_reaches_joined_viewers() {
    let server = TestServer::start().await;
    let mut alice = server.connect().await;
    let mut bob = server.connect().await;
    next_named(&mut alice, "init_state").await;
    next_named(&mut bob, "init_state").await;

    send_raw(&mut alice, r#"{"event":"join_global_room"}"#).await;
    // Alice's own echo proves her join was processed.
    send_event(
        &mut alice,
        "global_chat_message",
        json!({ "message": "ping", "sender": "alice" }),
    )
    .await;
    next_named(&mut alice, "global_message").await;

    send_event(
        &mut bob,
        "global_chat_message",
        json!({ "message": "hello", "sender": "bob", "tag": "RED" }),
    )
    .await;
    let msg = next_named(&mut alice, "global_message").await;
    assert_eq!(msg["data"]["message"], "hello");
    assert_eq!(msg["data"]["tag"], "RED");
    assert!(msg["data"]["timestamp"].is_string());

    server.stop().await;
}

#[tokio::test]
async fn test_alliance_override_visible_to_viewers() {
    let server = TestServer::start().await;
    let wallet = TestWallet::new(61);
    server
        .state
        .alliances
        .create(&wallet.creds("create"), "Violet", "VIO", Some("#8F00FF"))
        .await
        .expect("create");

    let mut ws = server.connect().await;
    next_named(&mut ws, "init_state").await;
    send_event(
        &mut ws,
        "paint_pixel",
        json!({ "key": "9,9", "color": "#000000", "walletAddress": wallet.address }),
    )
    .await;

    let update = next_named(&mut ws, "pixel_update").await;
    assert_eq!(update["data"]["color"], "#8F00FF");

    server.stop().await;
}

#[tokio::test]
async fn test_shutdown_flushes_pending_writes() {
    let server = TestServer::start().await;
    let store = server.store.clone();
    let mut ws = server.connect().await;
    next_named(&mut ws, "init_state").await;

    send_event(&mut ws, "paint_pixel", json!({ "key": "5,5", "color": "#123456" })).await;
    next_named(&mut ws, "pixel_update").await;
    drop(ws);

    let engine = server.state.engine.clone();
    server.stop().await;
    engine.flush().await;
    assert_eq!(store.cell("5,5").map(|c| c.color).as_deref(), Some("#123456"));
}

#[tokio::test]
async fn test_lagging_viewer_gets_fresh_snapshot() {
    let config = ServerConfig {
        broadcast_capacity: 2,
        ..Default::default()
    };
    let server = TestServer::start_with(Arc::new(MemoryStore::new()), config).await;
    let mut viewer = server.connect().await;
    next_named(&mut viewer, "init_state").await;

    // No yield in between, so the viewer task cannot drain its receiver.
    let coordinator = server.state.engine.coordinator();
    for i in 0..10 {
        coordinator
            .paint(CellKey::from_indices(i, 0), "#ABCDEF".into(), None)
            .await
            .expect("paint");
    }

    let resync = next_event(&mut viewer).await;
    assert_eq!(resync["event"], "init_state");
    assert_eq!(resync["data"].as_array().map(Vec::len), Some(10));

    coordinator
        .paint(CellKey::new("0,1"), "#000000".into(), None)
        .await
        .expect("paint");
    let update = next_event(&mut viewer).await;
    assert_eq!(update["event"], "pixel_update");

    server.stop().await;
}

#[tokio::test]
async fn test_heartbeat_pings_idle_viewer() {
    let config = ServerConfig {
        heartbeat_secs: 1,
        ..Default::default()
    };
    let server = TestServer::start_with(Arc::new(MemoryStore::new()), config).await;
    let mut ws = server.connect().await;
    next_named(&mut ws, "init_state").await;

    let ping = tokio::time::timeout(Duration::from_millis(TEST_TIMEOUT_MS), async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await;
    assert!(matches!(ping, Ok(true)), "no ping within timeout");

    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_unregisters_session() {
    let server = TestServer::start().await;
    let mut ws = server.connect().await;
    next_named(&mut ws, "init_state").await;
    assert_eq!(server.state.engine.rooms().session_count(), 1);

    drop(ws);
    let engine = server.state.engine.clone();
    assert!(
        wait_for_condition(TEST_TIMEOUT_MS, || engine.rooms().session_count() == 0).await
    );

    server.stop().await;
}
