//! Control surface server
//!
//! Serves the embedded stick page and a WebSocket the page uses to forward
//! pointer events and receive knob positions and status lines. Also exposes
//! a small JSON API.
//!
//! Routes:
//! - `GET /` and `GET /assets/*path`: page assets
//! - `GET /ws`: surface WebSocket
//! - `GET /api/snapshot`: latest stick values
//! - `GET /api/health`: health check

pub mod assets;
pub mod protocol;
pub mod status;

use anyhow::{Context, Result};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use parking_lot::RwLock;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::controller::ControllerInput;
use crate::stick::SessionId;
use crate::transmit::ControllerSnapshot;
pub use protocol::{StickLayout, SurfaceEvent, SurfaceUpdate};
pub use status::SurfaceStatus;

/// Shared state for surface handlers
pub struct SurfaceState {
    /// Pointer events and attach notices for the controller
    pub input_tx: mpsc::Sender<ControllerInput>,
    /// Updates fanned out to every surface
    pub update_tx: broadcast::Sender<SurfaceUpdate>,
    /// Latest snapshot published by the controller
    pub latest: Arc<RwLock<ControllerSnapshot>>,
    /// Sticks the page should bind
    pub layout: Vec<StickLayout>,
    next_session: AtomicU64,
}

impl SurfaceState {
    pub fn new(
        input_tx: mpsc::Sender<ControllerInput>,
        update_tx: broadcast::Sender<SurfaceUpdate>,
        latest: Arc<RwLock<ControllerSnapshot>>,
        layout: Vec<StickLayout>,
    ) -> Self {
        Self {
            input_tx,
            update_tx,
            latest,
            layout,
            next_session: AtomicU64::new(1),
        }
    }

    /// Allocate an id for a new surface connection
    fn open_session(&self) -> SessionId {
        self.next_session.fetch_add(1, Ordering::Relaxed)
    }
}

/// Build the surface router
pub fn build_router(state: Arc<SurfaceState>) -> Router {
    let api = Router::new()
        .route("/snapshot", get(get_snapshot))
        .route("/health", get(health_check))
        .layer(CorsLayer::permissive());

    Router::new()
        .route("/", get(assets::index))
        .route("/assets/*path", get(assets::asset))
        .route("/ws", get(surface_ws))
        .nest("/api", api)
        .with_state(state)
}

/// GET /api/snapshot - Latest values of both sticks
async fn get_snapshot(State(state): State<Arc<SurfaceState>>) -> Json<ControllerSnapshot> {
    Json(*state.latest.read())
}

/// GET /api/health - Health check endpoint
async fn health_check() -> &'static str {
    "ok"
}

/// GET /ws - Surface WebSocket
async fn surface_ws(
    ws: WebSocketUpgrade,
    State(state): State<Arc<SurfaceState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_surface(socket, state))
}

/// Run one surface session until either side goes away
async fn handle_surface(mut socket: WebSocket, state: Arc<SurfaceState>) {
    let session = state.open_session();
    debug!("Surface {} connected", session);

    // Subscribe before announcing so the resync triggered below is not missed
    let mut updates = state.update_tx.subscribe();

    let layout = SurfaceUpdate::Layout {
        sticks: state.layout.clone(),
    };
    if send_update(&mut socket, &layout).await.is_err() {
        return;
    }
    if state.input_tx.send(ControllerInput::SurfaceAttached).await.is_err() {
        return;
    }

    loop {
        tokio::select! {
            result = updates.recv() => {
                match result {
                    Ok(update) => {
                        if send_update(&mut socket, &update).await.is_err() {
                            debug!("Surface disconnected");
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Update channel closed");
                        break;
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("Surface lagged by {} updates", n);
                    }
                }
            }
            result = socket.recv() => {
                match result {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<SurfaceEvent>(&text) {
                            Ok(event) => {
                                let input = ControllerInput::Pointer {
                                    session,
                                    phase: event.phase,
                                    stick: event.stick,
                                    event: event.pointer,
                                };
                                if state.input_tx.send(input).await.is_err() {
                                    debug!("Controller stopped, closing surface");
                                    break;
                                }
                            }
                            Err(e) => warn!("Dropping malformed surface event: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("Surface closed connection");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {
                        // Ignore binary and pong frames
                    }
                    Some(Err(e)) => {
                        warn!("Surface WebSocket error: {}", e);
                        break;
                    }
                }
            }
        }
    }

    // Drags this surface started must not outlive it
    let _ = state
        .input_tx
        .send(ControllerInput::SurfaceDetached { session })
        .await;
    debug!("Surface {} session ended", session);
}

async fn send_update(socket: &mut WebSocket, update: &SurfaceUpdate) -> Result<()> {
    let text = serde_json::to_string(update).context("Failed to encode surface update")?;
    socket
        .send(Message::Text(text))
        .await
        .context("Failed to send surface update")?;
    Ok(())
}

/// Start the surface server, stopping when `shutdown` resolves
pub async fn start_server(
    state: Arc<SurfaceState>,
    addr: SocketAddr,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind surface server on {}", addr))?;

    info!("🕹️  Control surface on http://{}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .context("Surface server error")?;

    Ok(())
}
