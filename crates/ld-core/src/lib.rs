//! ld-core: stable foundation for locodyn.
//!
//! Contains:
//! - units (pressure/volume conversions + physical constants)
//! - numeric (Real + tolerances + float helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{LdError, LdResult};
pub use numeric::*;
pub use units::*;
