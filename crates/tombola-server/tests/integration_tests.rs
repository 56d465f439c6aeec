// Integration tests for the tombola server.
//
// A real listener on an ephemeral port, the application loop, and
// tokio-tungstenite clients talking JSON over WebSocket.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use tombola_core::RoundConfig;
use tombola_server::app::{self, AppState};
use tombola_server::config::{Config, DrawSection, ServerSection};
use tombola_server::ws_server;

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

// ===========================================================================
// Test helpers
// ===========================================================================

fn inline_config(round: RoundConfig) -> Config {
    Config {
        server: ServerSection {
            bind: "127.0.0.1".into(),
            port: 0,
        },
        round,
        draw: DrawSection {
            auto_draw_interval_ms: 0,
            seed: Some(7),
        },
        admin_password: "secret".into(),
    }
}

/// Start the listener and app loop; returns the `ws://` URL.
async fn start_server(round: RoundConfig) -> String {
    let config = inline_config(round);
    let listener = ws_server::bind(&config.listen_addr()).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = AppState::new(config).unwrap();

    let (ws_tx, ws_rx) = mpsc::channel(64);
    tokio::spawn(ws_server::run(listener, ws_tx));
    tokio::spawn(app::run(ws_rx, state));

    format!("ws://{addr}")
}

async fn connect(url: &str) -> Client {
    let (mut client, _) = connect_async(url).await.unwrap();
    let hydrate = recv(&mut client).await;
    assert_eq!(hydrate["type"], "hydrate");
    client
}

async fn send(client: &mut Client, msg: Value) {
    client
        .send(Message::Text(msg.to_string().into()))
        .await
        .unwrap();
}

async fn recv(client: &mut Client) -> Value {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .expect("timed out waiting for server message")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = frame {
            return serde_json::from_str(text.as_str()).unwrap();
        }
    }
}

async fn recv_type(client: &mut Client, ty: &str) -> Value {
    let msg = recv(client).await;
    assert_eq!(msg["type"], ty, "unexpected message: {msg}");
    msg
}

async fn login(client: &mut Client) {
    send(client, json!({"type": "login", "password": "secret"})).await;
    let reply = recv_type(client, "login").await;
    assert_eq!(reply["payload"]["ok"], true);
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn hydrate_hides_operator_state() {
    let url = start_server(RoundConfig::new(10, 3, 2)).await;
    let (mut client, _) = connect_async(url.as_str()).await.unwrap();

    let hydrate = recv_type(&mut client, "hydrate").await;
    let payload = &hydrate["payload"];
    assert_eq!(payload["config"]["max"], 10);
    assert_eq!(payload["drawn"], json!([]));
    assert_eq!(payload["isRoundActive"], true);
    assert!(payload.get("presetQueue").is_none());
    assert!(payload.get("plannedWinners").is_none());
}

#[tokio::test]
async fn unauthorized_operator_request_is_rejected() {
    let url = start_server(RoundConfig::default()).await;
    let mut client = connect(&url).await;

    send(&mut client, json!({"type": "admin:state"})).await;
    let reply = recv_type(&mut client, "error").await;
    assert_eq!(reply["payload"]["message"], "unauthorized");

    send(&mut client, json!({"type": "login", "password": "wrong"})).await;
    recv_type(&mut client, "error").await;
}

#[tokio::test]
async fn preset_round_plays_out_across_clients() {
    let url = start_server(RoundConfig::new(5, 2, 1)).await;
    let mut admin = connect(&url).await;
    let mut player = connect(&url).await;
    login(&mut admin).await;

    send(&mut admin, json!({"type": "admin:preset", "numbers": [3, 3]})).await;
    let preset = recv_type(&mut admin, "preset").await;
    assert_eq!(preset["payload"]["added"], 2);

    send(&mut player, json!({"type": "public:draw"})).await;
    let draw = recv_type(&mut player, "draw").await;
    assert_eq!(draw["payload"]["number"], 3);
    assert_eq!(draw["payload"]["counts"]["3"], 1);
    let ack = recv_type(&mut player, "ack").await;
    assert_eq!(ack["payload"]["number"], 3);
    recv_type(&mut admin, "draw").await;

    send(&mut admin, json!({"type": "admin:draw"})).await;
    let draw = recv_type(&mut admin, "draw").await;
    assert_eq!(draw["payload"]["winners"], json!([3]));
    let over = recv_type(&mut admin, "round:over").await;
    assert_eq!(over["payload"]["winners"], json!([3]));
    recv_type(&mut admin, "ack").await;

    recv_type(&mut player, "draw").await;
    recv_type(&mut player, "round:over").await;

    // A late joiner sees the finished round.
    let (mut late, _) = connect_async(url.as_str()).await.unwrap();
    let hydrate = recv_type(&mut late, "hydrate").await;
    assert_eq!(hydrate["payload"]["isRoundActive"], false);
    assert_eq!(hydrate["payload"]["winners"], json!([3]));
}

#[tokio::test]
async fn config_change_broadcasts_reset() {
    let url = start_server(RoundConfig::new(10, 3, 2)).await;
    let mut admin = connect(&url).await;
    let mut player = connect(&url).await;
    login(&mut admin).await;

    send(
        &mut admin,
        json!({"type": "admin:config", "max": 20, "touchesToWin": 4}),
    )
    .await;
    let reset = recv_type(&mut admin, "round:reset").await;
    assert_eq!(reset["payload"]["config"]["max"], 20);
    let reply = recv_type(&mut admin, "config").await;
    assert_eq!(reply["payload"]["config"]["touchesToWin"], 4);
    assert_eq!(reply["payload"]["config"]["winnersPerRound"], 2);

    let reset = recv_type(&mut player, "round:reset").await;
    assert_eq!(reset["payload"]["config"]["max"], 20);
}

#[tokio::test]
async fn stealth_plan_produces_planned_winner() {
    let url = start_server(RoundConfig::new(10, 2, 3)).await;
    let mut admin = connect(&url).await;
    login(&mut admin).await;

    send(
        &mut admin,
        json!({"type": "admin:plan", "winners": [6], "gapMin": 1, "gapMax": 1}),
    )
    .await;
    let plan = recv_type(&mut admin, "plan").await;
    assert_eq!(plan["payload"]["plannedWinners"], json!([6]));
    assert_eq!(plan["payload"]["stealthLeft"], 4);

    for _ in 0..4 {
        send(&mut admin, json!({"type": "admin:draw"})).await;
        loop {
            if recv(&mut admin).await["type"] == "ack" {
                break;
            }
        }
    }

    send(&mut admin, json!({"type": "admin:state"})).await;
    let state = recv_type(&mut admin, "admin:state").await;
    let winners = state["payload"]["winners"].as_array().unwrap();
    assert!(winners.contains(&json!(6)), "planned target did not win: {state}");

    send(&mut admin, json!({"type": "admin:plan:get"})).await;
    let plan = recv_type(&mut admin, "plan").await;
    assert_eq!(plan["payload"]["stealthLeft"], 0);
}
