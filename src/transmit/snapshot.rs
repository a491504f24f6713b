//! Combined stick values sent to the peer each time they change.

use serde::{Deserialize, Serialize};

use crate::stick::StickValue;

/// Values of both sticks at one frame.
///
/// Serializes as `{"joystick1":{"x":..,"y":..},"joystick2":{"x":..,"y":..}}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ControllerSnapshot {
    pub joystick1: StickValue,
    pub joystick2: StickValue,
}

impl ControllerSnapshot {
    /// Compact JSON used both as the change-detection key and the payload.
    pub fn serialize(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
