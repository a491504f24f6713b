//! End-to-end: surface WebSocket in, peer WebSocket out.

use futures_util::{SinkExt, StreamExt};
use parking_lot::RwLock;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use stick_relay::config::AppConfig;
use stick_relay::controller::Controller;
use stick_relay::peer::PeerSocket;
use stick_relay::surface::{self, SurfaceState};
use stick_relay::transmit::ControllerSnapshot;

async fn next_json<S>(ws: &mut S) -> Value
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let message = tokio::time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timed out waiting for message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = message {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Read peer frames until one matches `joystick1`
async fn wait_for_joystick1(peer: &mut WebSocketStream<TcpStream>, x: f64, y: f64) -> Value {
    loop {
        let frame = next_json(peer).await;
        assert_eq!(frame["event"], "joystickData");
        if frame["data"]["joystick1"] == json!({ "x": x, "y": y }) {
            return frame;
        }
    }
}

/// Relay wired between a fake peer and a live surface server
struct Relay {
    peer: WebSocketStream<TcpStream>,
    surface_addr: SocketAddr,
    stop_tx: oneshot::Sender<()>,
    run: JoinHandle<()>,
}

impl Relay {
    async fn start() -> Self {
        let mut config = AppConfig::default();
        config.transmit.frame_rate_hz = 120;
        config.peer.reconnect_delay_ms = 50;

        // Remote peer
        let peer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_url = format!("ws://{}", peer_listener.local_addr().unwrap());
        let emitter = Arc::new(PeerSocket::spawn(&peer_url, &config.peer));

        // Controller and surface server
        let (update_tx, _) = broadcast::channel(256);
        let (input_tx, input_rx) = mpsc::channel(64);
        let latest = Arc::new(RwLock::new(ControllerSnapshot::default()));
        let controller = Controller::new(&config, emitter, update_tx.clone(), latest.clone()).unwrap();

        let state = Arc::new(SurfaceState::new(input_tx, update_tx, latest, controller.layout()));

        let surface_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let surface_addr = surface_listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(surface_listener, surface::build_router(state)).await.unwrap();
        });

        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let run = tokio::spawn(controller.run(input_rx, async move {
            let _ = stop_rx.await;
        }));

        // The first frame always goes out, with both sticks centered
        let (tcp, _) = peer_listener.accept().await.unwrap();
        let mut peer = tokio_tungstenite::accept_async(tcp).await.unwrap();
        let first = next_json(&mut peer).await;
        assert_eq!(first["event"], "joystickData");
        assert_eq!(first["data"]["joystick2"], json!({ "x": 0.0, "y": 0.0 }));

        Self {
            peer,
            surface_addr,
            stop_tx,
            run,
        }
    }

    /// Open a surface session and consume its layout message
    async fn connect_surface(&self) -> WebSocketStream<MaybeTlsStream<TcpStream>> {
        let (mut surface_ws, _) =
            tokio_tungstenite::connect_async(format!("ws://{}/ws", self.surface_addr))
                .await
                .unwrap();
        let layout = next_json(&mut surface_ws).await;
        assert_eq!(layout["type"], "layout");
        assert_eq!(layout["sticks"][0]["element"], "stick1");
        assert_eq!(layout["sticks"][1]["status_element"], "status2");
        surface_ws
    }

    async fn stop(self) {
        let _ = self.stop_tx.send(());
        self.run.await.unwrap();
    }
}

fn send(value: Value) -> Message {
    Message::Text(value.to_string())
}

fn touch(phase: &str, stick: Option<&str>, id: i64, x: f64, y: f64) -> Message {
    let mut event = json!({
        "phase": phase,
        "pointer": { "kind": "touch", "changed_touches": [{ "identifier": id, "client_x": x, "client_y": y }] }
    });
    if let Some(stick) = stick {
        event["stick"] = json!(stick);
    }
    send(event)
}

#[tokio::test]
async fn test_surface_drag_reaches_peer() {
    let mut relay = Relay::start().await;
    let mut surface_ws = relay.connect_surface().await;

    surface_ws.send(touch("down", Some("stick1"), 0, 100.0, 100.0)).await.unwrap();
    surface_ws.send(touch("move", None, 0, 140.0, 100.0)).await.unwrap();

    let frame = wait_for_joystick1(&mut relay.peer, 0.5714, 0.0).await;
    assert_eq!(frame["data"]["joystick2"], json!({ "x": 0.0, "y": 0.0 }));

    // The surface sees the knob follow the raw drag
    loop {
        let update = next_json(&mut surface_ws).await;
        if update["type"] == "visual" && update["x"] == json!(40.0) {
            assert_eq!(update["element"], "stick1");
            assert_eq!(update["transition_ms"], 0);
            break;
        }
    }

    // Malformed events are dropped without closing the session
    surface_ws.send(Message::Text("not json".to_string())).await.unwrap();

    surface_ws.send(touch("up", None, 0, 140.0, 100.0)).await.unwrap();

    wait_for_joystick1(&mut relay.peer, 0.0, 0.0).await;

    relay.stop().await;
}

#[tokio::test]
async fn test_surface_dropped_mid_drag_recenters() {
    let mut relay = Relay::start().await;
    let mut surface_ws = relay.connect_surface().await;

    surface_ws.send(touch("down", Some("stick1"), 0, 0.0, 0.0)).await.unwrap();
    surface_ws.send(touch("move", None, 0, 100.0, 0.0)).await.unwrap();
    wait_for_joystick1(&mut relay.peer, 1.0, 0.0).await;

    // Page goes away without lifting the finger
    drop(surface_ws);

    wait_for_joystick1(&mut relay.peer, 0.0, 0.0).await;

    relay.stop().await;
}

#[tokio::test]
async fn test_second_surface_cannot_hijack_drag() {
    let mut relay = Relay::start().await;
    let mut phone_a = relay.connect_surface().await;
    let mut phone_b = relay.connect_surface().await;

    phone_a.send(touch("down", Some("stick1"), 0, 100.0, 100.0)).await.unwrap();
    phone_a.send(touch("move", None, 0, 140.0, 100.0)).await.unwrap();
    wait_for_joystick1(&mut relay.peer, 0.5714, 0.0).await;

    // Same touch id on another device, dragging stick2
    phone_b.send(touch("move", None, 0, 100.0, 400.0)).await.unwrap();
    phone_b.send(touch("down", Some("stick2"), 0, 0.0, 0.0)).await.unwrap();
    phone_b.send(touch("move", None, 0, 0.0, 100.0)).await.unwrap();

    let frame = loop {
        let frame = next_json(&mut relay.peer).await;
        if frame["data"]["joystick2"] == json!({ "x": 0.0, "y": 1.0 }) {
            break frame;
        }
        assert_eq!(frame["data"]["joystick1"], json!({ "x": 0.5714, "y": 0.0 }));
    };
    assert_eq!(frame["data"]["joystick1"], json!({ "x": 0.5714, "y": 0.0 }));

    relay.stop().await;
}
