//! ld-brakes: vacuum brake pipe and cylinder models.
//!
//! Pressure-propagation and brake-cylinder force computation for a straight
//! vacuum brake pipe, with altitude-corrected maximum vacuum and
//! edge-triggered sound events.

pub mod car;
pub mod error;
pub mod events;
pub mod pipe;

pub use car::{CarBrakeParams, CarBrakeSnapshot, CarVacuumBrake};
pub use error::{BrakeError, BrakeResult};
pub use events::{BrakeControllerState, BrakeEvent, PressureTrend, TrendEvent};
pub use pipe::{BrakePipe, BrakePipeParams, PipeContext};
