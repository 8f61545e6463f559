//! # Trajectory followers
//!
//! A follower executes one trajectory on the drivetrain. The drivetrain owns
//! at most one active follower at a time and builds them through a
//! [`FollowerFactory`].

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use crate::{
    eqpt::{Gyro, HeadingSensor, MotorController},
    motor_group::MotorGroup,
    mp_mgr::Trajectory
};

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Something which drives the robot along a trajectory.
pub trait Follower {
    /// Begin following.
    fn start(&mut self);

    /// Stop following and release the drivetrain.
    fn end(&mut self);

    /// Returns true once the whole trajectory has been executed.
    fn is_finished(&self) -> bool;

    /// Returns true if points are not reaching the hardware fast enough.
    fn is_underrun(&self) -> bool {
        false
    }
}

/// Builds followers bound to the drivetrain's hardware.
pub trait FollowerFactory<M: MotorController, G: HeadingSensor> {
    type Follower: Follower;

    /// Create a follower for `trajectory`.
    ///
    /// `flipped` mirrors the path left to right and `reverse` drives it
    /// backwards. With `zero_gyro` the follower zeroes the heading when it
    /// starts, otherwise the heading is left untouched.
    fn create(
        &mut self,
        target: FollowTarget<'_, M, G>,
        trajectory: &Trajectory,
        flipped: bool,
        reverse: bool,
        zero_gyro: bool
    ) -> Self::Follower;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// The drivetrain hardware a follower is bound to.
pub struct FollowTarget<'a, M: MotorController, G: HeadingSensor> {
    pub left: &'a MotorGroup<M>,

    /// The right group's master fuses both encoders and the heading sensor
    /// and runs the closed loops.
    pub right: &'a MotorGroup<M>,

    pub gyro: &'a Gyro<G>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<'a, M: MotorController, G: HeadingSensor> FollowTarget<'a, M, G> {
    /// The motor controller which runs the fused closed loops.
    pub fn master(&self) -> &'a M {
        self.right.master().device()
    }
}
