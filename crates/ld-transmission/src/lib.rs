//! ld-transmission: gear selection and diesel prime-mover models.
//!
//! Contains:
//! - [`Gear`] / [`GearBoxParams`]: per-gear records and their configuration
//! - [`GearBox`]: the gear-selection state machine with clutch dynamics
//! - [`DieselEngine`]: rate-limited RPM model with torque/power tables

pub mod engine;
pub mod error;
pub mod gear;
pub mod gearbox;

pub use engine::{DieselEngine, DieselEngineParams, EngineStatus};
pub use error::{TransmissionError, TransmissionResult};
pub use gear::{Gear, GearBoxEngineBraking, GearBoxOperation, GearBoxParams};
pub use gearbox::{GearBox, GearBoxContext, GearBoxSnapshot, GearEvent};
