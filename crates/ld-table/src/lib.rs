//! ld-table: tabulated function lookup for the traction and brake models.
//!
//! Contains:
//! - [`Table`]: 1D monotonic x→y samples with step-lookup semantics and an
//!   optional cubic-spline second-derivative fit
//! - [`Surface`]: 2D lookup over a monotonic outer axis of [`Table`] rows

pub mod error;
pub mod surface;
pub mod table;

pub use error::{TableError, TableResult};
pub use surface::Surface;
pub use table::{Table, TableSnapshot};
