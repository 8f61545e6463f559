//! # Drivetrain control module
//!
//! Top level owner of the drivetrain. Manual driving shapes operator input
//! into per side power, profile following hands the drivetrain to a
//! follower which runs the closed loop on the right master.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod helper;
mod params;
mod state;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;

// Internal
pub use helper::*;
pub use params::*;
pub use state::*;

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// What the drivetrain is currently doing.
///
/// Profile following ends only when the follower is stopped, a finished
/// follower still counts as following until then.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DriveMode {
    Idle,
    ManualDriving,
    ProfileFollowing
}
