//! Pointer and touch events as forwarded by the surface.

use serde::{Deserialize, Serialize};

use super::geometry::Point;

/// Touch identifier assigned by the browser, stable for the life of a touch.
///
/// Only unique within one surface: every device numbers its touches from 0.
pub type TouchId = i64;

/// Surface connection a pointer event arrived on.
pub type SessionId = u64;

/// One entry of a touch event's `changedTouches` list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchPoint {
    pub identifier: TouchId,
    pub client_x: f64,
    pub client_y: f64,
}

impl TouchPoint {
    pub fn client(&self) -> Point {
        Point::new(self.client_x, self.client_y)
    }
}

/// A mouse or touch event in client (viewport) coordinates.
///
/// Wire form:
/// - `{"kind":"mouse","client_x":10,"client_y":20}`
/// - `{"kind":"touch","changed_touches":[{"identifier":0,"client_x":10,"client_y":20}]}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PointerEvent {
    Mouse { client_x: f64, client_y: f64 },
    Touch { changed_touches: Vec<TouchPoint> },
}

impl PointerEvent {
    pub fn mouse(x: f64, y: f64) -> Self {
        PointerEvent::Mouse {
            client_x: x,
            client_y: y,
        }
    }

    pub fn touch(identifier: TouchId, x: f64, y: f64) -> Self {
        PointerEvent::Touch {
            changed_touches: vec![TouchPoint {
                identifier,
                client_x: x,
                client_y: y,
            }],
        }
    }

    /// First changed touch, or the mouse position.
    ///
    /// Returns `None` for a touch event with an empty `changed_touches` list.
    pub fn primary(&self) -> Option<(Point, Option<TouchId>)> {
        match self {
            PointerEvent::Mouse { client_x, client_y } => {
                Some((Point::new(*client_x, *client_y), None))
            }
            PointerEvent::Touch { changed_touches } => changed_touches
                .first()
                .map(|t| (t.client(), Some(t.identifier))),
        }
    }

    /// Position of the pointer this widget is following.
    ///
    /// Mouse events always match. Touch events match only if one of the
    /// changed touches carries `tracked`.
    pub fn position_for(&self, tracked: Option<TouchId>) -> Option<Point> {
        match self {
            PointerEvent::Mouse { client_x, client_y } => Some(Point::new(*client_x, *client_y)),
            PointerEvent::Touch { changed_touches } => {
                let tracked = tracked?;
                changed_touches
                    .iter()
                    .find(|t| t.identifier == tracked)
                    .map(TouchPoint::client)
            }
        }
    }
}

/// Phase of a pointer interaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// `mousedown` / `touchstart` on a stick element
    Down,
    /// `mousemove` / `touchmove` anywhere on the document
    Move,
    /// `mouseup` / `touchend` anywhere on the document
    Up,
}
