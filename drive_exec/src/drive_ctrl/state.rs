//! Implementations for the drivetrain controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, trace};

// Internal
use super::{CheesyDriveHelper, DriveHelper, DriveMode, DriveSignal, Params};
use crate::{
    eqpt::{CriticalDevice, Gyro, HeadingSensor, MotorController, PidLoop, Shifter},
    follower::{FollowTarget, Follower, FollowerFactory},
    motor_group::MotorGroup,
    mp_mgr::{self, MpManager, Trajectory}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Owner of the drivetrain hardware.
///
/// Arbitrates between manual driving, where operator input is shaped by the
/// drive helper and written to both sides, and profile following, where a
/// follower built by the factory drives the closed loop on the right master.
pub struct DriveCtrl<M, G, F, H = CheesyDriveHelper>
where
    M: MotorController,
    G: HeadingSensor,
    F: FollowerFactory<M, G>,
    H: DriveHelper
{
    left: MotorGroup<M>,
    right: MotorGroup<M>,
    gyro: Gyro<G>,
    shifter: Option<Box<dyn Shifter>>,

    helper: H,
    factory: F,
    follow: FollowState<F::Follower>,
    manual: bool,

    control_coefficient: f64,
    inverted: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// The follower slot. At most one follower is active at a time.
enum FollowState<F> {
    /// No follower has been started.
    Idle,

    Active(F),

    /// The last follower has been stopped but its completion can still be
    /// queried.
    Ended(F)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M, G, F, H> DriveCtrl<M, G, F, H>
where
    M: MotorController,
    G: HeadingSensor,
    F: FollowerFactory<M, G>,
    H: DriveHelper
{
    /// Bind the drivetrain hardware.
    ///
    /// The helper is seeded with a neutral input, the sensor fusion is
    /// configured on the masters, and the seeded output is commanded so the
    /// drivetrain starts in a known state.
    pub fn new(
        left: MotorGroup<M>,
        right: MotorGroup<M>,
        gyro: Gyro<G>,
        mut helper: H,
        factory: F,
        params: &Params,
        mp_params: &mp_mgr::Params
    ) -> Self {
        let signal = helper.drive(0.0, 0.0, true, true);

        MpManager::config_sensor_fusion(
            left.master().device(),
            right.master().device(),
            gyro.device(),
            mp_params
        );

        let ctrl = Self {
            left,
            right,
            gyro,
            shifter: None,
            helper,
            factory,
            follow: FollowState::Idle,
            manual: false,
            control_coefficient: params.joystick_coefficient,
            inverted: false
        };

        ctrl.write_signal(signal);

        debug!(
            "Drivetrain bound: left {}, right {}, gyro {}",
            ctrl.left.master(), ctrl.right.master(), ctrl.gyro
        );

        ctrl
    }

    /// Attach a gear shifter.
    pub fn with_shifter<S: Shifter + 'static>(mut self, shifter: S) -> Self {
        self.shifter = Some(Box::new(shifter));
        self
    }

    // ---- MANUAL DRIVING ----

    /// Shaped drive with quick turn always on.
    pub fn arcade_drive(&mut self, throttle: f64, turn: f64, high_gear: bool) {
        self.cheesy_drive(throttle, turn, true, high_gear);
    }

    /// Shaped drive.
    ///
    /// `throttle` is the raw forward/back axis, where pushing forward gives a
    /// negative value, and `turn` the raw left/right axis. Both are scaled by
    /// the joystick coefficient before shaping.
    pub fn cheesy_drive(&mut self, throttle: f64, turn: f64, quick_turn: bool, high_gear: bool) {
        let c = self.control_coefficient;
        let signal = self.helper.drive(-throttle * c, turn * c, quick_turn, high_gear);

        let signal = if self.inverted {
            signal.inverted()
        }
        else {
            signal
        };

        self.write_signal(signal);
        self.manual = true;
    }

    /// Unshaped differential mix of `x` (turn) and `y` (throttle).
    ///
    /// The joystick coefficient and inversion are not applied and the
    /// result is not clamped.
    pub fn manual_arcade_drive(&mut self, x: f64, y: f64) {
        self.write_signal(DriveSignal::new(-y + x, -y - x));
        self.manual = true;
    }

    // ---- PROFILE FOLLOWING ----

    /// Start following `trajectory`, zeroing the heading first.
    pub fn start_mp(&mut self, trajectory: &Trajectory) {
        self.start_mp_with(trajectory, true);
    }

    /// Start following `trajectory`.
    ///
    /// Any active follower is stopped before the new one is built. Zeroing
    /// the heading is left to the follower, which does it on start.
    pub fn start_mp_with(&mut self, trajectory: &Trajectory, zero_gyro: bool) {
        self.stop_mp();

        let target = FollowTarget {
            left: &self.left,
            right: &self.right,
            gyro: &self.gyro
        };
        let mut follower = self.factory.create(
            target,
            trajectory,
            trajectory.is_flipped(),
            false,
            zero_gyro
        );

        follower.start();
        self.follow = FollowState::Active(follower);

        info!(
            "Following trajectory of {} points ({} ms)",
            trajectory.len(),
            trajectory.duration_ms()
        );
    }

    /// Stop the active follower, if there is one.
    pub fn stop_mp(&mut self) {
        match std::mem::replace(&mut self.follow, FollowState::Idle) {
            FollowState::Active(mut f) => {
                f.end();
                self.follow = FollowState::Ended(f);
                self.manual = false;
                info!("Trajectory following stopped");
            },
            other => self.follow = other
        }
    }

    /// Returns true if the last started follower has finished.
    ///
    /// False if no follower has been started.
    pub fn is_mp_done(&self) -> bool {
        match self.follow {
            FollowState::Idle => false,
            FollowState::Active(ref f) | FollowState::Ended(ref f) => f.is_finished()
        }
    }

    /// Returns true if the active follower is underrunning.
    pub fn is_mp_underrun(&self) -> bool {
        match self.follow {
            FollowState::Active(ref f) => f.is_underrun(),
            _ => false
        }
    }

    /// The active or most recently stopped follower.
    pub fn follower(&self) -> Option<&F::Follower> {
        match self.follow {
            FollowState::Idle => None,
            FollowState::Active(ref f) | FollowState::Ended(ref f) => Some(f)
        }
    }

    pub fn mode(&self) -> DriveMode {
        match self.follow {
            FollowState::Active(_) => DriveMode::ProfileFollowing,
            _ if self.manual => DriveMode::ManualDriving,
            _ => DriveMode::Idle
        }
    }

    // ---- MAINTENANCE ----

    /// Put both sides in coast mode.
    pub fn coast(&self) {
        self.left.coast();
        self.right.coast();
    }

    /// Put both sides in brake mode.
    pub fn brake(&self) {
        self.left.brake();
        self.right.brake();
    }

    /// Reset both position counters.
    ///
    /// Must not be called while a follower is active.
    pub fn zero_encoders(&self) {
        self.left.master().device().set_selected_sensor_position(0.0, PidLoop::Primary);
        self.right.master().device().set_quadrature_position(0.0, 0);
    }

    // ---- ACCESSORS ----

    /// Fused distance travelled, as seen by the right master's primary loop.
    ///
    /// Units: sensor units
    pub fn distance(&self) -> f64 {
        self.right.master().device().selected_sensor_position(PidLoop::Primary)
    }

    pub fn joystick_coefficient(&self) -> f64 {
        self.control_coefficient
    }

    pub fn set_joystick_coefficient(&mut self, coefficient: f64) {
        self.control_coefficient = coefficient;
    }

    pub fn is_inverted(&self) -> bool {
        self.inverted
    }

    /// Swap the front and back of the drivetrain for shaped driving.
    pub fn set_inverted(&mut self, inverted: bool) {
        self.inverted = inverted;
    }

    /// Current gear, high if no shifter is attached.
    pub fn is_high_gear(&self) -> bool {
        self.shifter.as_ref().map_or(true, |s| s.is_high())
    }

    pub fn left(&self) -> &MotorGroup<M> {
        &self.left
    }

    pub fn right(&self) -> &MotorGroup<M> {
        &self.right
    }

    pub fn gyro(&self) -> &Gyro<G> {
        &self.gyro
    }

    pub fn shifter(&self) -> Option<&dyn Shifter> {
        self.shifter.as_deref()
    }

    fn write_signal(&self, signal: DriveSignal) {
        trace!("Drive demand: left {:.3}, right {:.3}", signal.left, signal.right);

        self.left.set_percent_output(signal.left);
        self.right.set_percent_output(signal.right);
    }
}

impl<M, G, F, H> CriticalDevice for DriveCtrl<M, G, F, H>
where
    M: MotorController,
    G: HeadingSensor,
    F: FollowerFactory<M, G>,
    H: DriveHelper
{
    /// OK only if both sides, the heading sensor and both encoders are OK.
    fn is_ok(&self) -> bool {
        self.left.is_ok()
            && self.right.is_ok()
            && self.gyro.is_ok()
            && self.left.is_encoder_ok()
            && self.right.is_encoder_ok()
    }
}
