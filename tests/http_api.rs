//! HTTP surface integration: room lifecycle over the real router.

use std::net::SocketAddr;

use tokio::net::TcpListener;

use arena_game_server::app::AppState;
use arena_game_server::config::Config;
use arena_game_server::http::build_router;
use arena_game_server::ws::protocol::{JoinAck, JoinError, RoomDescriptor};

fn test_config() -> Config {
    Config {
        server_addr: "127.0.0.1:0".parse().unwrap(),
        log_level: "warn".into(),
        client_origin: "*".into(),
        bot_fill: 5,
        empty_grace_secs: 30,
        waiting_grace_secs: 300,
        maps_path: None,
    }
}

async fn spawn_server() -> SocketAddr {
    let state = AppState::new(test_config()).unwrap();
    let router = build_router(state);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

async fn create_room(
    client: &reqwest::Client,
    addr: SocketAddr,
    name: &str,
    max_players: usize,
) -> RoomDescriptor {
    let resp = client
        .post(format!("http://{addr}/rooms"))
        .json(&serde_json::json!({
            "name": name,
            "map": "arena",
            "maxPlayers": max_players,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    resp.json().await.unwrap()
}

#[tokio::test]
async fn health_reports_ok() {
    let addr = spawn_server().await;
    let body: serde_json::Value = reqwest::get(format!("http://{addr}/health"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn create_list_join_roundtrip() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let room = create_room(&client, addr, "Lime Arena", 8).await;
    assert_eq!(room.name, "Lime Arena");

    let rooms: Vec<RoomDescriptor> = client
        .get(format!("http://{addr}/rooms"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(rooms.iter().any(|r| r.id == room.id));

    let resp = client
        .post(format!("http://{addr}/join"))
        .json(&serde_json::json!({
            "roomId": room.id,
            "displayName": "tester",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let ack: JoinAck = resp.json().await.unwrap();
    assert!(!ack.player_id.as_str().is_empty());
    // Spawn lands inside the arena bounds.
    assert!(ack.spawn.x.abs() <= 12.0 && ack.spawn.z.abs() <= 12.0);
}

#[tokio::test]
async fn join_full_room_conflicts() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let room = create_room(&client, addr, "Tiny", 1).await;

    let first = client
        .post(format!("http://{addr}/join"))
        .json(&serde_json::json!({"roomId": room.id, "displayName": "one"}))
        .send()
        .await
        .unwrap();
    assert_eq!(first.status(), 200);

    let second = client
        .post(format!("http://{addr}/join"))
        .json(&serde_json::json!({"roomId": room.id, "displayName": "two"}))
        .send()
        .await
        .unwrap();
    assert_eq!(second.status(), 409);
    let err: JoinError = second.json().await.unwrap();
    assert_eq!(err.kind, "room_full");
}

#[tokio::test]
async fn join_unknown_room_is_not_found() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{addr}/join"))
        .json(&serde_json::json!({
            "roomId": uuid::Uuid::new_v4(),
            "displayName": "ghost",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn end_room_removes_it() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let room = create_room(&client, addr, "Doomed", 8).await;

    let resp = client
        .delete(format!("http://{addr}/rooms/{}", room.id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // The room task processes End on its next tick; poll until gone.
    let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(2);
    loop {
        let rooms: Vec<RoomDescriptor> = client
            .get(format!("http://{addr}/rooms"))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        if !rooms.iter().any(|r| r.id == room.id) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "room was not reaped after End"
        );
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
    }

    let resp = client
        .delete(format!("http://{addr}/rooms/{}", room.id))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn kick_player_lifecycle() {
    let addr = spawn_server().await;
    let client = reqwest::Client::new();

    let room = create_room(&client, addr, "Kicky", 8).await;
    let ack: JoinAck = client
        .post(format!("http://{addr}/join"))
        .json(&serde_json::json!({"roomId": room.id, "displayName": "victim"}))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .post(format!("http://{addr}/rooms/{}/kick", room.id))
        .json(&serde_json::json!({"playerId": ack.player_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 204);

    // A second kick finds no such player.
    let resp = client
        .post(format!("http://{addr}/rooms/{}/kick", room.id))
        .json(&serde_json::json!({"playerId": ack.player_id}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}
