//! Virtual analog stick widgets
//!
//! A [`StickWidget`] follows one pointer (mouse or a single touch) from the
//! moment it lands on the stick element until it is released, and turns the
//! drag into a normalized [`StickValue`]. Surface events reach widgets through
//! the [`PointerInput`] trait, tagged with the surface session they came from;
//! a drag only follows events from the session that started it.

pub mod event;
pub mod geometry;

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

use crate::config::{StickConfig, SticksConfig};
use crate::transmit::snapshot::ControllerSnapshot;

pub use event::{PointerEvent, PointerPhase, SessionId, TouchId, TouchPoint};
pub use geometry::{Point, StickValue};

/// Duration of the knob's return-to-center animation after release.
pub const RETURN_TRANSITION: Duration = Duration::from_millis(200);

/// Errors raised while building a stick widget
#[derive(Debug, Error, PartialEq)]
pub enum StickError {
    #[error("stick element id cannot be empty")]
    EmptyElement,
    #[error("max_distance must be positive (got {0})")]
    InvalidMaxDistance(f64),
    #[error("deadzone must be in [0, max_distance) (got {deadzone}, max_distance {max_distance})")]
    InvalidDeadzone { deadzone: f64, max_distance: f64 },
}

/// Check that a stick configuration describes usable geometry.
pub fn check_geometry(config: &StickConfig) -> Result<(), StickError> {
    if config.element.trim().is_empty() {
        return Err(StickError::EmptyElement);
    }
    if !config.max_distance.is_finite() || config.max_distance <= 0.0 {
        return Err(StickError::InvalidMaxDistance(config.max_distance));
    }
    if config.deadzone.is_nan() || config.deadzone < 0.0 || config.deadzone >= config.max_distance {
        return Err(StickError::InvalidDeadzone {
            deadzone: config.deadzone,
            max_distance: config.max_distance,
        });
    }
    Ok(())
}

/// Result of feeding one event to a widget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputOutcome {
    /// The event did not concern this widget
    Ignored,
    /// Widget state (value and/or visual) changed
    Changed,
}

impl InputOutcome {
    pub fn is_changed(self) -> bool {
        self == InputOutcome::Changed
    }
}

/// Input capability implemented by every stick widget.
pub trait PointerInput {
    /// Pointer landed on the widget's element.
    fn on_pointer_down(&mut self, session: SessionId, event: &PointerEvent) -> InputOutcome;

    /// Pointer moved anywhere on the surface.
    fn on_pointer_move(&mut self, session: SessionId, event: &PointerEvent) -> InputOutcome;

    /// Pointer released anywhere on the surface.
    fn on_pointer_up(&mut self, session: SessionId, event: &PointerEvent) -> InputOutcome;

    /// The surface behind `session` disconnected.
    fn on_session_end(&mut self, session: SessionId) -> InputOutcome;

    /// Dispatch by phase.
    fn on_pointer(&mut self, session: SessionId, phase: PointerPhase, event: &PointerEvent) -> InputOutcome {
        match phase {
            PointerPhase::Down => self.on_pointer_down(session, event),
            PointerPhase::Move => self.on_pointer_move(session, event),
            PointerPhase::Up => self.on_pointer_up(session, event),
        }
    }
}

/// Knob transition applied by the surface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Follow the pointer without animation (`0s`)
    Immediate,
    /// Animate back to center over [`RETURN_TRANSITION`]
    Return,
}

impl Transition {
    pub fn duration(self) -> Duration {
        match self {
            Transition::Immediate => Duration::ZERO,
            Transition::Return => RETURN_TRANSITION,
        }
    }
}

/// What the surface should draw for a stick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StickVisual {
    /// Knob translation in pixels, clamped but not deadzone-adjusted
    pub translate: Point,
    pub transition: Transition,
}

impl Default for StickVisual {
    fn default() -> Self {
        Self {
            translate: Point::ORIGIN,
            transition: Transition::Return,
        }
    }
}

/// Drag tracking state for one stick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StickState {
    pub active: bool,
    /// Surface that started the drag
    pub session: Option<SessionId>,
    pub drag_origin: Option<Point>,
    pub tracked_touch: Option<TouchId>,
    pub value: StickValue,
}

/// A single on-screen analog stick.
#[derive(Debug, Clone)]
pub struct StickWidget {
    element: String,
    status_element: String,
    label: String,
    max_distance: f64,
    deadzone: f64,
    state: StickState,
    visual: StickVisual,
}

impl StickWidget {
    /// Build a widget bound to `config.element`.
    pub fn new(config: &StickConfig) -> Result<Self, StickError> {
        check_geometry(config)?;

        Ok(Self {
            element: config.element.clone(),
            status_element: config.status_element.clone(),
            label: config.label.clone(),
            max_distance: config.max_distance,
            deadzone: config.deadzone,
            state: StickState::default(),
            visual: StickVisual::default(),
        })
    }

    /// Surface element the widget is bound to.
    pub fn element(&self) -> &str {
        &self.element
    }

    /// Surface element that shows this stick's status line.
    pub fn status_element(&self) -> &str {
        &self.status_element
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn value(&self) -> StickValue {
        self.state.value
    }

    pub fn state(&self) -> &StickState {
        &self.state
    }

    pub fn visual(&self) -> StickVisual {
        self.visual
    }

    pub fn is_active(&self) -> bool {
        self.state.active
    }

    /// Status line, e.g. `Joystick 1: {"x":0.5,"y":0}`.
    pub fn status_text(&self) -> String {
        format!("{}: {}", self.label, self.state.value)
    }

    fn is_driven_by(&self, session: SessionId) -> bool {
        self.state.active && self.state.session == Some(session)
    }

    fn release(&mut self) {
        self.visual = StickVisual {
            translate: Point::ORIGIN,
            transition: Transition::Return,
        };
        self.state = StickState::default();
    }
}

impl PointerInput for StickWidget {
    fn on_pointer_down(&mut self, session: SessionId, event: &PointerEvent) -> InputOutcome {
        if self.state.active && !self.is_driven_by(session) {
            trace!("{}: ignoring down from surface {}, held by another", self.element, session);
            return InputOutcome::Ignored;
        }
        // One touch per stick: later fingers wait until the tracked one lifts
        if self.state.active && self.state.tracked_touch.is_some() {
            trace!("{}: ignoring down, touch already tracked", self.element);
            return InputOutcome::Ignored;
        }

        let Some((origin, touch)) = event.primary() else {
            debug!("{}: touch down without changed touches", self.element);
            return InputOutcome::Ignored;
        };

        self.state.active = true;
        self.state.session = Some(session);
        self.state.drag_origin = Some(origin);
        self.state.tracked_touch = touch;
        self.visual.transition = Transition::Immediate;

        trace!(
            "{}: drag start at ({}, {}) surface={} touch={:?}",
            self.element,
            origin.x,
            origin.y,
            session,
            touch
        );
        InputOutcome::Changed
    }

    fn on_pointer_move(&mut self, session: SessionId, event: &PointerEvent) -> InputOutcome {
        if !self.is_driven_by(session) {
            return InputOutcome::Ignored;
        }
        let Some(origin) = self.state.drag_origin else {
            return InputOutcome::Ignored;
        };
        // Touches belonging to other sticks are not ours to follow
        let Some(position) = event.position_for(self.state.tracked_touch) else {
            return InputOutcome::Ignored;
        };

        let diff = position.offset_from(origin);
        let drag = geometry::clamp_drag(diff, self.max_distance);

        self.visual.translate = drag.position();
        self.state.value = geometry::normalize_drag(diff, self.max_distance, self.deadzone);

        InputOutcome::Changed
    }

    fn on_pointer_up(&mut self, session: SessionId, event: &PointerEvent) -> InputOutcome {
        if !self.is_driven_by(session) {
            return InputOutcome::Ignored;
        }
        if event.position_for(self.state.tracked_touch).is_none() {
            return InputOutcome::Ignored;
        }

        self.release();
        trace!("{}: released", self.element);
        InputOutcome::Changed
    }

    fn on_session_end(&mut self, session: SessionId) -> InputOutcome {
        if !self.is_driven_by(session) {
            return InputOutcome::Ignored;
        }

        self.release();
        debug!("{}: released, surface {} disconnected mid-drag", self.element, session);
        InputOutcome::Changed
    }
}

/// The two sticks of the control surface.
#[derive(Debug, Clone)]
pub struct StickPair {
    pub joystick1: StickWidget,
    pub joystick2: StickWidget,
}

impl StickPair {
    pub fn new(config: &SticksConfig) -> Result<Self, StickError> {
        Ok(Self {
            joystick1: StickWidget::new(&config.joystick1)?,
            joystick2: StickWidget::new(&config.joystick2)?,
        })
    }

    /// Current values of both sticks.
    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            joystick1: self.joystick1.value(),
            joystick2: self.joystick2.value(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StickWidget> {
        [&self.joystick1, &self.joystick2].into_iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut StickWidget> {
        [&mut self.joystick1, &mut self.joystick2].into_iter()
    }

    pub fn by_element_mut(&mut self, element: &str) -> Option<&mut StickWidget> {
        self.iter_mut().find(|w| w.element() == element)
    }
}
