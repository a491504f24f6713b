//! Wire framing for events sent to the peer.
//!
//! Two framings are supported:
//!
//! - **Json**: one text frame per event, `{"event":"<name>","data":<payload>}`
//! - **SocketIo**: Socket.IO v4 over the Engine.IO websocket transport.
//!   Events are `42["<name>",<payload>]` (Engine.IO *message* + Socket.IO
//!   *event*). The client connects to the default namespace with `40` after the
//!   server's open packet, and answers Engine.IO pings (`2`) with pongs (`3`).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Query appended to a bare URL for the Socket.IO websocket transport
pub const SOCKET_IO_PATH: &str = "/socket.io/?EIO=4&transport=websocket";

/// Namespace connect request for the default namespace
pub const SOCKET_IO_CONNECT: &str = "40";

/// Engine.IO pong without payload
pub const ENGINE_IO_PONG: &str = "3";

/// How events are framed on the peer connection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Framing {
    #[default]
    Json,
    #[serde(rename = "socketio")]
    SocketIo,
}

/// Frame encoding/decoding errors
#[derive(Debug, Error)]
pub enum FrameError {
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("empty Engine.IO packet")]
    Empty,
    #[error("unknown Engine.IO packet type '{0}'")]
    UnknownPacket(char),
}

/// Engine.IO packet received from a Socket.IO peer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnginePacket {
    /// `0{...}` handshake with session parameters
    Open(String),
    /// `1`
    Close,
    /// `2` heartbeat probe, optionally with payload
    Ping(String),
    /// `3`
    Pong(String),
    /// `4...` Socket.IO packet
    Message(String),
    /// `5` upgrade / `6` noop
    Noop,
}

impl EnginePacket {
    /// Whether a message packet accepts the namespace connect (`40...`).
    pub fn is_connect_ack(&self) -> bool {
        matches!(self, EnginePacket::Message(body) if body.starts_with('0'))
    }

    /// Whether a message packet is a Socket.IO connect error (`44...`).
    pub fn is_connect_error(&self) -> bool {
        matches!(self, EnginePacket::Message(body) if body.starts_with('4'))
    }
}

#[derive(Serialize)]
struct Envelope<'a, T: Serialize> {
    event: &'a str,
    data: &'a T,
}

/// Encode one event for the wire.
pub fn encode_event<T: Serialize>(
    framing: Framing,
    event: &str,
    payload: &T,
) -> Result<String, FrameError> {
    match framing {
        Framing::Json => Ok(serde_json::to_string(&Envelope { event, data: payload })?),
        Framing::SocketIo => {
            let args = (event, payload);
            Ok(format!("42{}", serde_json::to_string(&args)?))
        }
    }
}

/// Decode an Engine.IO text packet.
pub fn decode_engine_packet(text: &str) -> Result<EnginePacket, FrameError> {
    let mut chars = text.chars();
    let kind = chars.next().ok_or(FrameError::Empty)?;
    let body = chars.as_str().to_string();

    match kind {
        '0' => Ok(EnginePacket::Open(body)),
        '1' => Ok(EnginePacket::Close),
        '2' => Ok(EnginePacket::Ping(body)),
        '3' => Ok(EnginePacket::Pong(body)),
        '4' => Ok(EnginePacket::Message(body)),
        '5' | '6' => Ok(EnginePacket::Noop),
        other => Err(FrameError::UnknownPacket(other)),
    }
}

/// Pong answering `ping`, echoing its payload.
pub fn pong_for(ping_payload: &str) -> String {
    format!("{}{}", ENGINE_IO_PONG, ping_payload)
}

/// Resolve the URL to dial for a framing.
///
/// For Socket.IO, a URL without an Engine.IO query gets the default
/// `/socket.io/` transport path appended.
pub fn resolve_url(url: &str, framing: Framing) -> String {
    match framing {
        Framing::Json => url.to_string(),
        Framing::SocketIo if url.contains("EIO=") => url.to_string(),
        Framing::SocketIo => format!("{}{}", url.trim_end_matches('/'), SOCKET_IO_PATH),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stick::StickValue;
    use crate::transmit::ControllerSnapshot;

    fn snapshot() -> ControllerSnapshot {
        ControllerSnapshot {
            joystick1: StickValue { x: 0.5714, y: 0.0 },
            joystick2: StickValue::CENTER,
        }
    }

    #[test]
    fn test_json_envelope() {
        let text = encode_event(Framing::Json, "joystickData", &snapshot()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["event"], "joystickData");
        assert_eq!(value["data"]["joystick1"]["x"], 0.5714);
        assert_eq!(value["data"]["joystick2"]["y"], 0.0);
    }

    #[test]
    fn test_socket_io_event() {
        let text = encode_event(Framing::SocketIo, "joystickData", &snapshot()).unwrap();
        assert!(text.starts_with("42[\"joystickData\",{"));

        let args: serde_json::Value = serde_json::from_str(&text[2..]).unwrap();
        assert_eq!(args[1]["joystick1"]["x"], 0.5714);
    }

    #[test]
    fn test_decode_engine_packets() {
        assert_eq!(
            decode_engine_packet(r#"0{"sid":"abc","pingInterval":25000}"#).unwrap(),
            EnginePacket::Open(r#"{"sid":"abc","pingInterval":25000}"#.to_string())
        );
        assert_eq!(decode_engine_packet("2").unwrap(), EnginePacket::Ping(String::new()));
        assert_eq!(decode_engine_packet("2probe").unwrap(), EnginePacket::Ping("probe".to_string()));
        assert_eq!(decode_engine_packet("6").unwrap(), EnginePacket::Noop);
        assert!(matches!(decode_engine_packet(""), Err(FrameError::Empty)));
        assert!(matches!(decode_engine_packet("x"), Err(FrameError::UnknownPacket('x'))));
    }

    #[test]
    fn test_connect_error_detection() {
        let packet = decode_engine_packet(r#"44{"message":"unauthorized"}"#).unwrap();
        assert!(packet.is_connect_error());
        assert!(!decode_engine_packet(r#"40{"sid":"x"}"#).unwrap().is_connect_error());
        assert!(!packet.is_connect_ack());
    }

    #[test]
    fn test_connect_ack_detection() {
        assert!(decode_engine_packet(r#"40{"sid":"x"}"#).unwrap().is_connect_ack());
        assert!(!decode_engine_packet("0{}").unwrap().is_connect_ack());
        assert!(!decode_engine_packet(r#"42["joystickData",{}]"#).unwrap().is_connect_ack());
    }

    #[test]
    fn test_pong_echoes_payload() {
        assert_eq!(pong_for(""), "3");
        assert_eq!(pong_for("probe"), "3probe");
    }

    #[test]
    fn test_resolve_url() {
        assert_eq!(resolve_url("ws://host:3000/feed", Framing::Json), "ws://host:3000/feed");
        assert_eq!(
            resolve_url("ws://host:3000/", Framing::SocketIo),
            "ws://host:3000/socket.io/?EIO=4&transport=websocket"
        );
        assert_eq!(
            resolve_url("ws://host/socket.io/?EIO=4&transport=websocket", Framing::SocketIo),
            "ws://host/socket.io/?EIO=4&transport=websocket"
        );
    }
}
