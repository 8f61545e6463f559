//! # Drivetrain library.
//!
//! This library allows the drivetrain executable, benchmarks and other crates
//! in the workspace to access items defined inside the drive crate.

// ------------------------------------------------------------------------------------------------
// MODULES
// ------------------------------------------------------------------------------------------------

/// Drivetrain control - arbitrates between manual driving and trajectory following
pub mod drive_ctrl;

/// Equipment - narrow device capabilities, device wrappers and simulated devices
pub mod eqpt;

/// Followers - things which drive the robot along a trajectory
pub mod follower;

/// Motor groups - one master and its followers driven as one side of the drivetrain
pub mod motor_group;

/// Motion profile manager - streams trajectories into the master's dual closed loop
pub mod mp_mgr;
