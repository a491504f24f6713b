//! Stick geometry: displacement clamping and radial deadzone remapping.
//!
//! All functions here are pure so the drag math can be tested without a
//! surface attached.
//!
//! # Deadzone
//!
//! The deadzone is radial (circular), not per-axis. A displacement shorter
//! than the deadzone maps to zero; anything longer is rescaled linearly so the
//! deadzone edge maps to 0 and `max_distance` maps to `max_distance`:
//!
//! ```text
//! scaled = max_distance / (max_distance - deadzone) * (distance - deadzone)
//! ```
//!
//! # Example
//! ```
//! use stick_relay::stick::geometry::{normalize_drag, Point};
//!
//! let value = normalize_drag(Point::new(40.0, 0.0), 64.0, 8.0);
//! assert_eq!(value.x, 0.5714);
//! assert_eq!(value.y, 0.0);
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal places kept in a normalized stick value.
pub const VALUE_PRECISION: i32 = 4;

/// Raw pixel coordinates on the surface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Vector from `origin` to `self`.
    pub fn offset_from(self, origin: Point) -> Point {
        Point::new(self.x - origin.x, self.y - origin.y)
    }

    pub fn length(self) -> f64 {
        self.x.hypot(self.y)
    }
}

/// Normalized stick value, each axis in [-1.0, 1.0].
///
/// Serializes as `{"x":..,"y":..}`. `Display` renders the same shape with the
/// shortest number formatting (`0` rather than `0.0`), which is what the status
/// text shows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct StickValue {
    pub x: f64,
    pub y: f64,
}

impl StickValue {
    pub const CENTER: StickValue = StickValue { x: 0.0, y: 0.0 };

    /// Build a value, rounding each axis to [`VALUE_PRECISION`] decimals and
    /// clamping it to [-1.0, 1.0].
    pub fn rounded(x: f64, y: f64) -> Self {
        Self {
            x: round_axis(x),
            y: round_axis(y),
        }
    }

    pub fn magnitude(self) -> f64 {
        self.x.hypot(self.y)
    }

    pub fn is_centered(self) -> bool {
        self.x == 0.0 && self.y == 0.0
    }
}

impl fmt::Display for StickValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{\"x\":{},\"y\":{}}}", self.x, self.y)
    }
}

/// Displacement after clamping to the stick's reach.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClampedDrag {
    /// Direction of the drag in radians, as returned by `atan2(y, x)`.
    pub angle: f64,
    /// Drag length, at most `max_distance`.
    pub distance: f64,
}

impl ClampedDrag {
    /// Knob position in pixels relative to the stick center.
    pub fn position(&self) -> Point {
        polar(self.distance, self.angle)
    }
}

/// Clamp a raw drag vector to `max_distance`, keeping its direction.
pub fn clamp_drag(diff: Point, max_distance: f64) -> ClampedDrag {
    ClampedDrag {
        angle: diff.y.atan2(diff.x),
        distance: diff.length().min(max_distance),
    }
}

/// Remap a clamped distance through the radial deadzone.
///
/// Returns 0 inside the deadzone and rescales `[deadzone, max_distance]`
/// onto `[0, max_distance]`.
pub fn apply_deadzone(distance: f64, max_distance: f64, deadzone: f64) -> f64 {
    if distance <= deadzone {
        return 0.0;
    }
    (max_distance / (max_distance - deadzone)) * (distance - deadzone)
}

/// Full pipeline for one drag: clamp, deadzone, normalize, round.
pub fn normalize_drag(diff: Point, max_distance: f64, deadzone: f64) -> StickValue {
    let drag = clamp_drag(diff, max_distance);
    let scaled = apply_deadzone(drag.distance, max_distance, deadzone);
    let position = polar(scaled, drag.angle);

    StickValue::rounded(position.x / max_distance, position.y / max_distance)
}

fn polar(distance: f64, angle: f64) -> Point {
    Point::new(distance * angle.cos(), distance * angle.sin())
}

fn round_axis(value: f64) -> f64 {
    let factor = 10f64.powi(VALUE_PRECISION);
    let rounded = ((value * factor).round() / factor).clamp(-1.0, 1.0);
    // Rounding tiny negatives yields -0.0, which must not leak into the wire format
    if rounded == 0.0 {
        0.0
    } else {
        rounded
    }
}
