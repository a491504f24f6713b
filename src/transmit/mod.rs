//! Per-frame transmit loop
//!
//! Each frame the controller calls [`TransmitContext::tick`], which refreshes
//! the status lines, snapshots both sticks and emits the snapshot to the peer
//! only when its serialization differs from the previous frame's. There is no
//! queue: if frames are skipped only the latest differing snapshot goes out.

pub mod snapshot;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::stick::StickPair;
pub use snapshot::ControllerSnapshot;

/// Default event name used when emitting snapshots
pub const DEFAULT_EVENT_NAME: &str = "joystickData";

/// Destination for snapshots (the peer socket or a stand-in).
///
/// Emitting is fire-and-forget: implementations report their own failures and
/// the transmit loop never observes them.
#[async_trait]
pub trait Emitter: Send + Sync {
    /// Emitter name for logging (e.g., "peer", "log")
    fn name(&self) -> &str;

    /// Send `payload` under `event`.
    async fn emit(&self, event: &str, payload: &ControllerSnapshot);
}

/// Receiver of the human-readable status lines.
pub trait StatusSink: Send {
    /// Replace the text of a status element.
    fn set_status(&mut self, element: &str, text: &str);

    /// Forget anything cached so the next writes are delivered in full.
    fn invalidate(&mut self) {}
}

/// Emitter used when no peer is configured: logs every snapshot.
#[derive(Debug, Default)]
pub struct LogEmitter;

#[async_trait]
impl Emitter for LogEmitter {
    fn name(&self) -> &str {
        "log"
    }

    async fn emit(&self, event: &str, payload: &ControllerSnapshot) {
        debug!(
            "📤 {} joystick1=({}, {}) joystick2=({}, {})",
            event,
            payload.joystick1.x,
            payload.joystick1.y,
            payload.joystick2.x,
            payload.joystick2.y
        );
    }
}

/// Whether a tick sent anything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Emitted,
    Unchanged,
}

/// State carried between frames of the transmit loop.
pub struct TransmitContext {
    event_name: String,
    previous: String,
    emitter: Arc<dyn Emitter>,
    status: Box<dyn StatusSink>,
}

impl TransmitContext {
    pub fn new(
        event_name: impl Into<String>,
        emitter: Arc<dyn Emitter>,
        status: Box<dyn StatusSink>,
    ) -> Self {
        Self {
            event_name: event_name.into(),
            previous: String::new(),
            emitter,
            status,
        }
    }

    pub fn event_name(&self) -> &str {
        &self.event_name
    }

    /// Serialization of the last emitted snapshot (empty before the first frame).
    pub fn previous(&self) -> &str {
        &self.previous
    }

    pub fn status_mut(&mut self) -> &mut dyn StatusSink {
        self.status.as_mut()
    }

    /// Run one frame: update status text, diff, and emit on change.
    pub async fn tick(&mut self, sticks: &StickPair) -> TickOutcome {
        for stick in sticks.iter() {
            self.status.set_status(stick.status_element(), &stick.status_text());
        }

        let snapshot = sticks.snapshot();
        let current = match snapshot.serialize() {
            Ok(s) => s,
            Err(e) => {
                warn!("Failed to serialize controller snapshot: {}", e);
                return TickOutcome::Unchanged;
            }
        };

        if current == self.previous {
            return TickOutcome::Unchanged;
        }

        self.emitter.emit(&self.event_name, &snapshot).await;
        self.previous = current;
        TickOutcome::Emitted
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SticksConfig;
    use crate::stick::{PointerEvent, PointerInput, StickValue};
    use parking_lot::Mutex;

    /// Emitter that records every call
    #[derive(Default)]
    pub(crate) struct RecordingEmitter {
        pub emitted: Mutex<Vec<(String, ControllerSnapshot)>>,
    }

    #[async_trait]
    impl Emitter for RecordingEmitter {
        fn name(&self) -> &str {
            "recording"
        }

        async fn emit(&self, event: &str, payload: &ControllerSnapshot) {
            self.emitted.lock().push((event.to_string(), *payload));
        }
    }

    /// Status sink that shares what it received with the test
    #[derive(Default, Clone)]
    pub(crate) struct RecordingStatus {
        pub lines: Arc<Mutex<Vec<(String, String)>>>,
    }

    impl StatusSink for RecordingStatus {
        fn set_status(&mut self, element: &str, text: &str) {
            self.lines.lock().push((element.to_string(), text.to_string()));
        }
    }

    fn setup() -> (TransmitContext, Arc<RecordingEmitter>, RecordingStatus, StickPair) {
        let emitter = Arc::new(RecordingEmitter::default());
        let status = RecordingStatus::default();
        let ctx = TransmitContext::new(DEFAULT_EVENT_NAME, emitter.clone(), Box::new(status.clone()));
        let sticks = StickPair::new(&SticksConfig::default()).unwrap();
        (ctx, emitter, status, sticks)
    }

    #[tokio::test]
    async fn test_first_frame_emits_center() {
        let (mut ctx, emitter, _, sticks) = setup();

        assert_eq!(ctx.tick(&sticks).await, TickOutcome::Emitted);

        let emitted = emitter.emitted.lock();
        assert_eq!(emitted.len(), 1);
        assert_eq!(emitted[0].0, "joystickData");
        assert_eq!(emitted[0].1, ControllerSnapshot::default());
    }

    #[tokio::test]
    async fn test_unchanged_frames_do_not_emit() {
        let (mut ctx, emitter, _, sticks) = setup();

        ctx.tick(&sticks).await;
        assert_eq!(ctx.tick(&sticks).await, TickOutcome::Unchanged);
        assert_eq!(ctx.tick(&sticks).await, TickOutcome::Unchanged);
        assert_eq!(emitter.emitted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_change_emits_exactly_once() {
        let (mut ctx, emitter, _, mut sticks) = setup();
        ctx.tick(&sticks).await;

        sticks.joystick1.on_pointer_down(0, &PointerEvent::mouse(0.0, 0.0));
        sticks.joystick1.on_pointer_move(0, &PointerEvent::mouse(40.0, 0.0));

        assert_eq!(ctx.tick(&sticks).await, TickOutcome::Emitted);
        assert_eq!(ctx.tick(&sticks).await, TickOutcome::Unchanged);

        let emitted = emitter.emitted.lock();
        assert_eq!(emitted.len(), 2);
        assert_eq!(emitted[1].1.joystick1, StickValue { x: 0.5714, y: 0.0 });
        assert_eq!(ctx.previous(), emitted[1].1.serialize().unwrap());
    }

    #[tokio::test]
    async fn test_move_inside_deadzone_does_not_emit() {
        let (mut ctx, emitter, _, mut sticks) = setup();
        ctx.tick(&sticks).await;

        sticks.joystick2.on_pointer_down(0, &PointerEvent::mouse(0.0, 0.0));
        sticks.joystick2.on_pointer_move(0, &PointerEvent::mouse(0.0, 4.0));

        assert_eq!(ctx.tick(&sticks).await, TickOutcome::Unchanged);
        assert_eq!(emitter.emitted.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_status_written_every_frame() {
        let (mut ctx, _, status, sticks) = setup();

        ctx.tick(&sticks).await;
        ctx.tick(&sticks).await;

        let lines = status.lines.lock();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], ("status1".to_string(), r#"Joystick 1: {"x":0,"y":0}"#.to_string()));
        assert_eq!(lines[1], ("status2".to_string(), r#"Joystick 2: {"x":0,"y":0}"#.to_string()));
    }
}
