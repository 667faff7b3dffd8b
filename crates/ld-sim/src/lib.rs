//! ld-sim: per-tick orchestration of the traction and brake models.
//!
//! One fixed-timestep caller drives everything: the diesel engine, the
//! gearbox state machine (commits visible same-tick to force computation),
//! the DC traction motor, and the vacuum brake (lead pipe before follower
//! cylinders).

pub mod context;
pub mod error;
pub mod locomotive;
pub mod train;

pub use context::{Direction, SimEvent, TickInputs, TickOutputs};
pub use error::{SimError, SimResult};
pub use locomotive::{Locomotive, LocomotiveSnapshot};
pub use train::Train;
