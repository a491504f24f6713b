//! Top-level controller
//!
//! Owns both stick widgets and the transmit context. A single task alternates
//! between surface input and frame ticks, so pointer handlers and the
//! transmit loop never run at the same time and widget state needs no locks.

use anyhow::{Context, Result};
use parking_lot::RwLock;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace};

use crate::config::AppConfig;
use crate::stick::{PointerEvent, PointerInput, PointerPhase, SessionId, StickPair, StickWidget};
use crate::surface::{StickLayout, SurfaceStatus, SurfaceUpdate};
use crate::transmit::{ControllerSnapshot, Emitter, TickOutcome, TransmitContext};

/// Input delivered to the controller task
#[derive(Debug, Clone, PartialEq)]
pub enum ControllerInput {
    /// Pointer event from a surface
    Pointer {
        session: SessionId,
        phase: PointerPhase,
        /// Element the event landed on (`down` only)
        stick: Option<String>,
        event: PointerEvent,
    },
    /// A surface connected and needs the current picture
    SurfaceAttached,
    /// A surface went away; drags it was driving end here
    SurfaceDetached { session: SessionId },
}

/// Owner of the sticks and the transmit loop
pub struct Controller {
    sticks: StickPair,
    transmit: TransmitContext,
    frame_interval: Duration,
    updates: broadcast::Sender<SurfaceUpdate>,
    latest: Arc<RwLock<ControllerSnapshot>>,
}

impl Controller {
    /// Build the controller from configuration.
    ///
    /// Status lines and knob positions are broadcast on `updates`; the newest
    /// snapshot is published to `latest` after every frame.
    pub fn new(
        config: &AppConfig,
        emitter: Arc<dyn Emitter>,
        updates: broadcast::Sender<SurfaceUpdate>,
        latest: Arc<RwLock<ControllerSnapshot>>,
    ) -> Result<Self> {
        let sticks = StickPair::new(&config.sticks).context("Failed to create stick widgets")?;

        let status = SurfaceStatus::new(updates.clone());
        let transmit = TransmitContext::new(
            config.transmit.event_name.clone(),
            emitter,
            Box::new(status),
        );

        Ok(Self {
            sticks,
            transmit,
            frame_interval: Duration::from_secs(1) / config.transmit.frame_rate_hz.max(1),
            updates,
            latest,
        })
    }

    pub fn sticks(&self) -> &StickPair {
        &self.sticks
    }

    pub fn frame_interval(&self) -> Duration {
        self.frame_interval
    }

    /// Layout announced to surfaces on connect
    pub fn layout(&self) -> Vec<StickLayout> {
        self.sticks.iter().map(StickLayout::from).collect()
    }

    /// Apply one surface input.
    pub fn handle_input(&mut self, input: ControllerInput) {
        match input {
            ControllerInput::Pointer {
                session,
                phase,
                stick,
                event,
            } => self.handle_pointer(session, phase, stick.as_deref(), &event),
            ControllerInput::SurfaceAttached => {
                debug!("Surface attached, resending state");
                self.transmit.status_mut().invalidate();
                for widget in self.sticks.iter() {
                    let _ = self
                        .updates
                        .send(SurfaceUpdate::visual(widget.element(), widget.visual()));
                }
            }
            ControllerInput::SurfaceDetached { session } => {
                debug!("Surface {} detached", session);
                for widget in self.sticks.iter_mut() {
                    if widget.on_session_end(session).is_changed() {
                        let _ = self
                            .updates
                            .send(SurfaceUpdate::visual(widget.element(), widget.visual()));
                    }
                }
            }
        }
    }

    fn handle_pointer(
        &mut self,
        session: SessionId,
        phase: PointerPhase,
        stick: Option<&str>,
        event: &PointerEvent,
    ) {
        let updates = &self.updates;
        let dispatch = |widget: &mut StickWidget| {
            if widget.on_pointer(session, phase, event).is_changed() {
                let _ = updates.send(SurfaceUpdate::visual(widget.element(), widget.visual()));
            }
        };

        match phase {
            // Down is bound to the stick element itself
            PointerPhase::Down => match stick.and_then(|id| self.sticks.by_element_mut(id)) {
                Some(widget) => dispatch(widget),
                None => trace!("Down on unknown element {:?}", stick),
            },
            // Move and up listen on the whole document; widgets skip other surfaces
            PointerPhase::Move | PointerPhase::Up => {
                for widget in self.sticks.iter_mut() {
                    dispatch(widget);
                }
            }
        }
    }

    /// Run one transmit frame and publish the snapshot.
    pub async fn frame(&mut self) -> TickOutcome {
        let outcome = self.transmit.tick(&self.sticks).await;
        *self.latest.write() = self.sticks.snapshot();
        outcome
    }

    /// Process input and frames until `shutdown` resolves.
    pub async fn run(
        mut self,
        mut input_rx: mpsc::Receiver<ControllerInput>,
        shutdown: impl Future<Output = ()>,
    ) {
        let mut ticker = tokio::time::interval(self.frame_interval);
        // Late frames are dropped rather than replayed in a burst
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Transmit loop running every {:?} (event '{}')",
            self.frame_interval,
            self.transmit.event_name()
        );

        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                Some(input) = input_rx.recv() => {
                    self.handle_input(input);
                }
                _ = ticker.tick() => {
                    if self.frame().await == TickOutcome::Emitted {
                        trace!("Snapshot emitted: {}", self.transmit.previous());
                    }
                }
                _ = &mut shutdown => {
                    info!("Shutdown signal received, stopping transmit loop");
                    break;
                }
            }
        }
    }
}
