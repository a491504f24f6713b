//! Status lines pushed to the surface.

use std::collections::HashMap;
use tokio::sync::broadcast;

use super::protocol::SurfaceUpdate;
use crate::transmit::StatusSink;

/// Status sink that broadcasts text to connected surfaces.
///
/// The transmit loop writes both lines every frame; only text that differs
/// from what was last sent for an element goes over the wire.
pub struct SurfaceStatus {
    updates: broadcast::Sender<SurfaceUpdate>,
    last_sent: HashMap<String, String>,
}

impl SurfaceStatus {
    pub fn new(updates: broadcast::Sender<SurfaceUpdate>) -> Self {
        Self {
            updates,
            last_sent: HashMap::new(),
        }
    }
}

impl StatusSink for SurfaceStatus {
    fn set_status(&mut self, element: &str, text: &str) {
        if self.last_sent.get(element).map(String::as_str) == Some(text) {
            return;
        }
        self.last_sent.insert(element.to_string(), text.to_string());

        // No subscribers is fine: nobody is looking at the surface
        let _ = self.updates.send(SurfaceUpdate::Status {
            element: element.to_string(),
            text: text.to_string(),
        });
    }

    fn invalidate(&mut self) {
        self.last_sent.clear();
    }
}
