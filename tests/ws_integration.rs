/// Integration tests: WebSocket client -> gateway -> room -> SQLite store.
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;

use auth::{encode_claims, BearerDecoder, Claims};
use room::{RoomConfig, RoomRegistry};
use tilerealm::config::SecuritySection;
use tilerealm::gateway::{self, GatewayState};
use tilerealm::store::SqliteWorldStore;
use world_db::WorldDb;

const OWNER: i64 = 1;
const GUEST: i64 = 2;

type WsClient = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn fast_config() -> RoomConfig {
    RoomConfig {
        tick_period: Duration::from_millis(20),
        ..RoomConfig::default()
    }
}

fn token(account_id: i64, email: &str) -> String {
    encode_claims(&Claims {
        account_id,
        email: email.to_string(),
    })
}

/// Boot a gateway on an ephemeral port backed by an in-memory database
/// seeded with one world owned by OWNER. Returns the address and world id.
async fn spawn_server(config: RoomConfig) -> (SocketAddr, i64) {
    let db = WorldDb::open_memory().unwrap();
    let world = db.world().create(OWNER, "Emberfall", 42).unwrap();
    let store = Arc::new(SqliteWorldStore::new(db));
    let registry = Arc::new(RoomRegistry::new(store, config));
    let state = GatewayState::new(registry, Arc::new(BearerDecoder), SecuritySection::default());
    let app = gateway::router(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, world.id)
}

async fn connect(addr: SocketAddr) -> WsClient {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    ws
}

async fn send_json(ws: &mut WsClient, value: serde_json::Value) {
    ws.send(Message::Text(value.to_string().into()))
        .await
        .unwrap();
}

/// Next text frame as JSON; panics on close or timeout.
async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for server message")
            .expect("connection ended")
            .expect("read error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).unwrap(),
            Message::Close(frame) => panic!("unexpected close: {frame:?}"),
            _ => continue,
        }
    }
}

/// Read frames until the server closes, returning the close code.
async fn next_close_code(ws: &mut WsClient) -> u16 {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for close");
        match msg {
            Some(Ok(Message::Close(Some(frame)))) => return u16::from(frame.code),
            Some(Ok(_)) => continue,
            Some(Err(_)) | None => panic!("connection ended without close frame"),
        }
    }
}

async fn join(ws: &mut WsClient, world_id: i64, account_id: i64, email: &str, name: &str) {
    send_json(
        ws,
        serde_json::json!({
            "type": "join",
            "token": token(account_id, email),
            "world_save_id": world_id,
            "character_name": name,
        }),
    )
    .await;
}

#[tokio::test]
async fn join_receives_welcome_and_snapshot() {
    let (addr, world_id) = spawn_server(fast_config()).await;
    let mut ws = connect(addr).await;

    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;

    let welcome = next_json(&mut ws).await;
    assert_eq!(welcome["type"], "welcome");
    assert_eq!(welcome["world_id"], world_id);
    assert_eq!(welcome["world_name"], "Emberfall");
    assert_eq!(welcome["map"]["width"], 64);
    assert_eq!(welcome["map"]["height"], 64);

    let patch = next_json(&mut ws).await;
    assert_eq!(patch["type"], "state_patch");
    let added = patch["added"].as_array().unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(added[0]["name"], "Mara");
    assert_eq!(added[0]["x"], welcome["map"]["spawn_x"]);
    assert_eq!(added[0]["y"], welcome["map"]["spawn_y"]);
    assert_eq!(added[0]["last_processed_seq"], 0);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn movement_is_applied_and_acknowledged() {
    let (addr, world_id) = spawn_server(fast_config()).await;
    let mut ws = connect(addr).await;

    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;
    let welcome = next_json(&mut ws).await;
    let spawn_x = welcome["map"]["spawn_x"].as_i64().unwrap();
    let spawn_y = welcome["map"]["spawn_y"].as_i64().unwrap();
    let _snapshot = next_json(&mut ws).await;

    send_json(
        &mut ws,
        serde_json::json!({"type": "input", "sequence_number": 1, "direction": "up"}),
    )
    .await;

    let patch = next_json(&mut ws).await;
    assert_eq!(patch["type"], "state_patch");
    let changed = patch["changed"].as_array().unwrap();
    assert_eq!(changed.len(), 1);
    // The spawn clearing guarantees the tile above spawn is walkable.
    assert_eq!(changed[0]["x"].as_i64().unwrap(), spawn_x);
    assert_eq!(changed[0]["y"].as_i64().unwrap(), spawn_y - 1);
    assert_eq!(changed[0]["last_processed_seq"], 1);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn malformed_messages_are_dropped_not_fatal() {
    let (addr, world_id) = spawn_server(fast_config()).await;
    let mut ws = connect(addr).await;

    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;
    let _welcome = next_json(&mut ws).await;
    let _snapshot = next_json(&mut ws).await;

    ws.send(Message::Text("not json".to_string().into()))
        .await
        .unwrap();
    send_json(
        &mut ws,
        serde_json::json!({"type": "input", "sequence_number": 1, "direction": "down"}),
    )
    .await;

    let patch = next_json(&mut ws).await;
    assert_eq!(patch["type"], "state_patch");
    assert_eq!(patch["changed"][0]["last_processed_seq"], 1);

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn invalid_token_closes_4001() {
    let (addr, world_id) = spawn_server(fast_config()).await;
    let mut ws = connect(addr).await;

    send_json(
        &mut ws,
        serde_json::json!({
            "type": "join",
            "token": "garbage",
            "world_save_id": world_id,
            "character_name": null,
        }),
    )
    .await;

    assert_eq!(next_close_code(&mut ws).await, 4001);
}

#[tokio::test]
async fn unknown_world_closes_4003() {
    let (addr, _world_id) = spawn_server(fast_config()).await;
    let mut ws = connect(addr).await;

    join(&mut ws, 9999, OWNER, "owner@example.com", "Mara").await;
    assert_eq!(next_close_code(&mut ws).await, 4003);
}

#[tokio::test]
async fn cold_open_ownership_is_enforced() {
    let (addr, world_id) = spawn_server(fast_config()).await;

    // A non-owner cannot open a cold world.
    let mut guest = connect(addr).await;
    join(&mut guest, world_id, GUEST, "guest@example.com", "Bram").await;
    assert_eq!(next_close_code(&mut guest).await, 4002);

    // The owner warms the room.
    let mut owner = connect(addr).await;
    join(&mut owner, world_id, OWNER, "owner@example.com", "Mara").await;
    let welcome = next_json(&mut owner).await;
    assert_eq!(welcome["type"], "welcome");
    let _snapshot = next_json(&mut owner).await;

    // Now the same guest account is admitted and sees both players.
    let mut guest = connect(addr).await;
    join(&mut guest, world_id, GUEST, "guest@example.com", "Bram").await;
    let welcome = next_json(&mut guest).await;
    assert_eq!(welcome["type"], "welcome");
    let snapshot = next_json(&mut guest).await;
    assert_eq!(snapshot["added"].as_array().unwrap().len(), 2);

    // The owner is told about the guest.
    let patch = next_json(&mut owner).await;
    assert_eq!(patch["type"], "state_patch");
    assert_eq!(patch["added"].as_array().unwrap().len(), 1);
    assert_eq!(patch["added"][0]["name"], "Bram");

    owner.close(None).await.unwrap();
    guest.close(None).await.unwrap();
}

#[tokio::test]
async fn idle_warning_then_kick_closes_4005() {
    let config = RoomConfig {
        tick_period: Duration::from_millis(20),
        idle_check_interval: Duration::from_millis(50),
        idle_warn_after: Duration::from_millis(200),
        idle_kick_after: Duration::from_millis(500),
        ..RoomConfig::default()
    };
    let (addr, world_id) = spawn_server(config).await;
    let mut ws = connect(addr).await;

    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;
    let _welcome = next_json(&mut ws).await;
    let _snapshot = next_json(&mut ws).await;

    let warning = next_json(&mut ws).await;
    assert_eq!(warning["type"], "idle_warning");

    let kick = next_json(&mut ws).await;
    assert_eq!(kick["type"], "idle_kick");

    assert_eq!(next_close_code(&mut ws).await, 4005);
}

#[tokio::test]
async fn ping_pong() {
    let (addr, world_id) = spawn_server(fast_config()).await;
    let mut ws = connect(addr).await;

    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;
    let _welcome = next_json(&mut ws).await;
    let _snapshot = next_json(&mut ws).await;

    send_json(&mut ws, serde_json::json!({"type": "ping"})).await;
    let pong = next_json(&mut ws).await;
    assert_eq!(pong["type"], "pong");

    ws.close(None).await.unwrap();
}

#[tokio::test]
async fn position_survives_reconnect() {
    let (addr, world_id) = spawn_server(fast_config()).await;

    let mut ws = connect(addr).await;
    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;
    let welcome = next_json(&mut ws).await;
    let spawn_x = welcome["map"]["spawn_x"].as_i64().unwrap();
    let spawn_y = welcome["map"]["spawn_y"].as_i64().unwrap();
    let _snapshot = next_json(&mut ws).await;

    send_json(
        &mut ws,
        serde_json::json!({"type": "input", "sequence_number": 1, "direction": "right"}),
    )
    .await;
    let patch = next_json(&mut ws).await;
    assert_eq!(patch["changed"][0]["x"].as_i64().unwrap(), spawn_x + 1);

    // Disconnect; the leave save and room disposal are asynchronous.
    ws.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;

    // Rejoin lands on the saved tile, not the spawn.
    let mut ws = connect(addr).await;
    join(&mut ws, world_id, OWNER, "owner@example.com", "Mara").await;
    let _welcome = next_json(&mut ws).await;
    let snapshot = next_json(&mut ws).await;
    let added = snapshot["added"].as_array().unwrap();
    assert_eq!(added[0]["x"].as_i64().unwrap(), spawn_x + 1);
    assert_eq!(added[0]["y"].as_i64().unwrap(), spawn_y);
    // A fresh session starts its sequence discipline over.
    assert_eq!(added[0]["last_processed_seq"], 0);

    ws.close(None).await.unwrap();
}
