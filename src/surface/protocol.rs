//! Messages exchanged with the browser surface over `/ws`.

use serde::{Deserialize, Serialize};

use crate::stick::{PointerEvent, PointerPhase, StickVisual, StickWidget};

/// Pointer event forwarded by the surface.
///
/// ```json
/// {"phase":"down","stick":"stick1","pointer":{"kind":"mouse","client_x":10,"client_y":20}}
/// {"phase":"move","pointer":{"kind":"touch","changed_touches":[...]}}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceEvent {
    pub phase: PointerPhase,
    /// Element the event landed on; only meaningful for `down`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stick: Option<String>,
    pub pointer: PointerEvent,
}

/// Layout entry describing one stick to the surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StickLayout {
    pub element: String,
    pub status_element: String,
    pub label: String,
    pub max_distance: f64,
}

impl From<&StickWidget> for StickLayout {
    fn from(widget: &StickWidget) -> Self {
        Self {
            element: widget.element().to_string(),
            status_element: widget.status_element().to_string(),
            label: widget.label().to_string(),
            max_distance: widget.max_distance(),
        }
    }
}

/// Update pushed to every connected surface
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SurfaceUpdate {
    /// Sticks to bind, sent once on connect
    Layout { sticks: Vec<StickLayout> },
    /// Knob position of one stick
    Visual {
        element: String,
        x: f64,
        y: f64,
        transition_ms: u64,
    },
    /// Status line text
    Status { element: String, text: String },
}

impl SurfaceUpdate {
    pub fn visual(element: &str, visual: StickVisual) -> Self {
        SurfaceUpdate::Visual {
            element: element.to_string(),
            x: visual.translate.x,
            y: visual.translate.y,
            transition_ms: visual.transition.duration().as_millis() as u64,
        }
    }
}
