//! Stick Relay
//!
//! Virtual analog-stick control surface. A browser page forwards pointer and
//! touch events; the sticks turn drags into normalized values, and a per-frame
//! loop emits both sticks' values to a remote peer whenever they change.

pub mod config;
pub mod controller;
pub mod peer;
pub mod stick;
pub mod surface;
pub mod transmit;

pub use config::AppConfig;
pub use controller::{Controller, ControllerInput};
pub use stick::{PointerEvent, PointerInput, StickValue, StickWidget};
pub use transmit::{ControllerSnapshot, Emitter, TransmitContext};
