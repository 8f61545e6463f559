//! # Motion profile manager module
//!
//! Bridges an offline computed [`Trajectory`] into the dual closed loop
//! (position on the primary loop, heading on the auxiliary loop) of the
//! drivetrain's master motor controller.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod params;
mod state;
mod traj;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// Internal
pub use params::*;
pub use state::*;
pub use traj::*;
