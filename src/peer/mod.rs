//! Peer socket: delivers snapshots to the remote peer
//!
//! [`PeerSocket::spawn`] starts a background task that keeps a WebSocket
//! connection to the peer open. `emit` never waits on the network: it replaces
//! the pending frame in a `watch` channel and the connection task sends
//! whatever is newest, so a slow peer only ever sees the latest snapshot.

pub mod frame;

use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};

use crate::config::PeerConfig;
use crate::transmit::{ControllerSnapshot, Emitter};
pub use frame::{EnginePacket, FrameError, Framing};

type PeerStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Emitter backed by a WebSocket connection to the peer
pub struct PeerSocket {
    framing: Framing,
    pending: watch::Sender<Option<String>>,
    task: JoinHandle<()>,
}

impl PeerSocket {
    /// Start the connection task for `url`.
    pub fn spawn(url: &str, config: &PeerConfig) -> Self {
        let (pending, rx) = watch::channel(None);
        let url = frame::resolve_url(url, config.framing);
        let framing = config.framing;
        let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);

        let task = tokio::spawn(run_connection(url, framing, reconnect_delay, rx));

        Self {
            framing,
            pending,
            task,
        }
    }

    /// Stop the connection task
    pub fn shutdown(&self) {
        self.task.abort();
    }
}

impl Drop for PeerSocket {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[async_trait]
impl Emitter for PeerSocket {
    fn name(&self) -> &str {
        "peer"
    }

    async fn emit(&self, event: &str, payload: &ControllerSnapshot) {
        match frame::encode_event(self.framing, event, payload) {
            Ok(text) => {
                // Overwrites any frame the connection task has not sent yet
                self.pending.send_replace(Some(text));
            }
            Err(e) => warn!("Failed to encode '{}' for peer: {}", event, e),
        }
    }
}

/// Connect, pump frames, reconnect after `reconnect_delay` on failure.
async fn run_connection(
    url: String,
    framing: Framing,
    reconnect_delay: Duration,
    mut rx: watch::Receiver<Option<String>>,
) {
    loop {
        info!("🔌 Connecting to peer at {}", url);

        match connect_async(url.as_str()).await {
            Ok((stream, _response)) => {
                info!("✅ Peer connected");
                match pump(stream, framing, &mut rx).await {
                    Ok(()) => {
                        debug!("Peer emitter closed, stopping connection task");
                        return;
                    }
                    Err(e) => warn!("Peer connection lost: {:#}", e),
                }
            }
            Err(e) => warn!("Failed to connect to peer {}: {}", url, e),
        }

        tokio::time::sleep(reconnect_delay).await;
    }
}

/// Drive one connection until it fails (`Err`) or the emitter is dropped (`Ok`).
async fn pump(
    stream: PeerStream,
    framing: Framing,
    rx: &mut watch::Receiver<Option<String>>,
) -> Result<()> {
    let (mut sink, mut incoming) = stream.split();

    if framing == Framing::SocketIo {
        await_open(&mut incoming).await?;
        sink.send(Message::Text(frame::SOCKET_IO_CONNECT.to_string()))
            .await
            .context("Failed to send namespace connect")?;
        // Events sent before the ack are rejected by the server
        await_namespace(&mut sink, &mut incoming).await?;
    }

    // Bring a (re)connected peer up to date with the newest snapshot
    let latest = rx.borrow_and_update().clone();
    if let Some(text) = latest {
        sink.send(Message::Text(text))
            .await
            .context("Failed to send snapshot")?;
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    let _ = sink.send(Message::Close(None)).await;
                    return Ok(());
                }
                let latest = rx.borrow_and_update().clone();
                if let Some(text) = latest {
                    sink.send(Message::Text(text))
                        .await
                        .context("Failed to send snapshot")?;
                }
            }
            message = incoming.next() => {
                match message {
                    Some(Ok(Message::Text(text))) if framing == Framing::SocketIo => {
                        match frame::decode_engine_packet(&text) {
                            Ok(EnginePacket::Ping(payload)) => {
                                sink.send(Message::Text(frame::pong_for(&payload)))
                                    .await
                                    .context("Failed to answer ping")?;
                            }
                            Ok(EnginePacket::Close) => anyhow::bail!("peer closed the session"),
                            Ok(packet) if packet.is_connect_error() => {
                                anyhow::bail!("peer refused namespace connect: {:?}", packet)
                            }
                            Ok(packet) => debug!("Peer packet: {:?}", packet),
                            Err(e) => debug!("Ignoring undecodable peer frame: {}", e),
                        }
                    }
                    Some(Ok(Message::Close(reason))) => {
                        anyhow::bail!("peer sent close: {:?}", reason)
                    }
                    Some(Ok(_)) => {
                        // Pings are answered by tungstenite; everything else is unused
                    }
                    Some(Err(e)) => return Err(e).context("Peer socket error"),
                    None => anyhow::bail!("peer stream ended"),
                }
            }
        }
    }
}

/// Wait for the Engine.IO open packet.
async fn await_open<S>(incoming: &mut S) -> Result<()>
where
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = incoming.next().await {
        if let Message::Text(text) = message.context("Peer socket error during handshake")? {
            if let Ok(EnginePacket::Open(params)) = frame::decode_engine_packet(&text) {
                debug!("Engine.IO session opened: {}", params);
                return Ok(());
            }
        }
    }
    anyhow::bail!("peer closed before Engine.IO open")
}

/// Wait for the server to accept the namespace connect, answering pings meanwhile.
async fn await_namespace<K, S>(sink: &mut K, incoming: &mut S) -> Result<()>
where
    K: Sink<Message, Error = tungstenite::Error> + Unpin,
    S: Stream<Item = Result<Message, tungstenite::Error>> + Unpin,
{
    while let Some(message) = incoming.next().await {
        let Message::Text(text) = message.context("Peer socket error during namespace connect")? else {
            continue;
        };
        match frame::decode_engine_packet(&text) {
            Ok(packet) if packet.is_connect_ack() => {
                debug!("Namespace connected: {:?}", packet);
                return Ok(());
            }
            Ok(packet) if packet.is_connect_error() => {
                anyhow::bail!("peer refused namespace connect: {:?}", packet)
            }
            Ok(EnginePacket::Ping(payload)) => {
                sink.send(Message::Text(frame::pong_for(&payload)))
                    .await
                    .context("Failed to answer ping")?;
            }
            Ok(EnginePacket::Close) => anyhow::bail!("peer closed the session"),
            Ok(packet) => debug!("Peer packet before namespace ack: {:?}", packet),
            Err(e) => debug!("Ignoring undecodable peer frame: {}", e),
        }
    }
    anyhow::bail!("peer closed before accepting the namespace")
}
