//! # Equipment interfaces
//!
//! Narrow capability traits for the devices the drivetrain talks to. Vendor
//! wrappers implement these, and the drivetrain only depends on the
//! capabilities it needs, which is what lets the simulated devices in
//! [`sim`] stand in for real hardware.
//!
//! Devices are handles onto hardware whose state lives in firmware, so all
//! operations take `&self` and handles are cheap to clone. All calls are
//! expected to come from the single control loop thread.

// ---------------------------------------------------------------------------
// MODULES
// ---------------------------------------------------------------------------

mod gyro;
mod motor;
pub mod sim;

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::warn;
use serde::{Deserialize, Serialize};

// Internal
pub use gyro::*;
pub use motor::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of closed loop gain slots available on a motor controller.
pub const NUM_GAIN_SLOTS: u8 = 4;

/// Timeout used for blocking configuration calls.
///
/// Units: milliseconds
pub const CONFIG_TIMEOUT_MS: u32 = 100;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A device whose failure should stop the drivetrain from being trusted.
pub trait CriticalDevice {
    /// Returns true if the device is functioning properly.
    fn is_ok(&self) -> bool;
}

/// A device which can be identified on the bus.
pub trait Identified {
    /// The bus ID of the device.
    fn device_id(&self) -> u8;

    /// A short name for the kind of device, e.g. `"TalonSRX"`.
    fn device_kind(&self) -> &'static str;

    /// A useful string about the device, e.g. `"[TalonSRX:3]"`.
    fn describe(&self) -> String {
        format!("[{}:{}]", self.device_kind(), self.device_id())
    }
}

/// A device which drives an output.
pub trait PoweredDevice {
    /// Command a normalised output between -1 and +1.
    fn set_percent_output(&self, value: f64);

    /// Set the behaviour of the output when no power is being commanded.
    fn set_neutral_mode(&self, mode: NeutralMode);
}

/// The vendor API of a smart motor controller with closed loop and motion
/// profile support.
pub trait MotorController: PoweredDevice + Identified + Clone {
    /// Installed firmware version.
    fn firmware_version(&self) -> u16;

    /// Returns true if any fault is currently active.
    fn has_any_fault(&self) -> bool;

    /// Returns true if the locally attached encoder is present.
    fn is_sensor_present(&self) -> bool;

    /// Restore factory configuration.
    fn config_factory_default(&self);

    /// Clear all sticky faults.
    fn clear_sticky_faults(&self);

    /// Clear the latched motion profile underrun flag.
    fn clear_motion_profile_has_underrun(&self);

    /// Configure the output deadband around neutral.
    fn config_neutral_deadband(&self, deadband: f64);

    /// Mirror the output of the controller with the given ID.
    fn follow(&self, master_id: u8);

    /// Position of the selected feedback sensor of the given loop.
    fn selected_sensor_position(&self, pid_loop: PidLoop) -> f64;

    /// Overwrite the position of the selected feedback sensor of the given
    /// loop.
    fn set_selected_sensor_position(&self, position: f64, pid_loop: PidLoop);

    /// Overwrite the position of the locally attached quadrature encoder.
    fn set_quadrature_position(&self, position: f64, timeout_ms: u32);

    /// Select the feedback device of the given loop.
    fn config_selected_feedback_sensor(&self, device: FeedbackDevice, pid_loop: PidLoop);

    /// Scale the feedback of the given loop.
    fn config_selected_feedback_coefficient(&self, coefficient: f64, pid_loop: PidLoop);

    /// Expose another device's sensor as remote sensor `ordinal` (0 or 1).
    fn config_remote_feedback_filter(
        &self,
        device_id: u8,
        source: RemoteSensorSource,
        ordinal: u8
    );

    /// Select which device feeds a term of the sensor sum.
    fn config_sensor_term(&self, term: SensorTerm, device: FeedbackDevice);

    /// Write a closed loop gain slot.
    fn config_slot(&self, slot: u8, gains: &SlotGains);

    /// Change how often a status frame is sent.
    fn set_status_frame_period(&self, frame: StatusFrame, period_ms: u8);

    /// Hand a point stream to the controller and begin executing it in arc
    /// mode (position on the primary loop, heading on the auxiliary loop)
    /// once `min_buffered_points` have been buffered.
    fn start_motion_profile(&self, stream: PointStream, min_buffered_points: u32);

    /// Returns true once the last point of the running profile has been
    /// executed.
    fn is_motion_profile_finished(&self) -> bool;

    /// Current status of the motion profile executor.
    fn motion_profile_status(&self) -> MotionProfileStatus;

    /// Drop every buffered point and stop executing the profile.
    fn clear_motion_profile_trajectories(&self);
}

/// The vendor API of a heading sensor.
pub trait HeadingSensor: Identified + Clone {
    /// Installed firmware version.
    fn firmware_version(&self) -> u16;

    /// Returns true if any fault is currently active.
    fn has_any_fault(&self) -> bool;

    /// Current yaw.
    ///
    /// Units: degrees
    fn yaw_deg(&self) -> f64;

    /// Overwrite the current yaw.
    ///
    /// Units: degrees
    fn set_yaw(&self, yaw_deg: f64);

    /// Reset the yaw reference so that the current heading reads zero.
    fn zero_yaw(&self) {
        self.set_yaw(0.0);
    }
}

/// A two speed gearbox shifter.
pub trait Shifter {
    /// Returns true if the gearbox is in high gear.
    fn is_high(&self) -> bool;
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

/// Output behaviour when no power is commanded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NeutralMode {
    Coast,
    Brake
}

/// The two simultaneous closed loops of a motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PidLoop {
    /// Position/velocity loop
    Primary,

    /// Heading loop
    Auxiliary
}

/// Sources of feedback for a closed loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackDevice {
    QuadEncoder,
    RemoteSensor0,
    RemoteSensor1,
    SensorSum
}

/// Kinds of sensor that can be read from a remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteSensorSource {
    /// The selected sensor of another motor controller
    MotorSelectedSensor,

    /// The yaw of a heading sensor
    PigeonYaw
}

/// Terms of the feedback sensor sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SensorTerm {
    Sum0,
    Sum1
}

/// Periodic status frames sent by a motor controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusFrame {
    Feedback0,
    Feedback1,
    Targets,
    Targets1
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Gains for one closed loop slot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SlotGains {
    pub k_f: f64,
    pub k_p: f64,
    pub k_i: f64,
    pub k_d: f64,

    /// Error magnitude above which the integral accumulator is cleared.
    ///
    /// Units: sensor units
    pub integral_zone: f64,

    /// Maximum closed loop output, between 0 and 1.
    #[serde(default = "default_peak_output")]
    pub peak_output: f64
}

/// A single point handed to the motion profile executor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StreamPoint {
    /// Units: sensor units
    pub position: f64,

    /// Units: sensor units per 100 ms
    pub velocity: f64,

    pub arb_feed_fwd: f64,

    /// Target heading.
    ///
    /// Units: turn units
    pub aux_position: f64,

    pub aux_velocity: f64,

    pub aux_arb_feed_fwd: f64,

    /// Units: milliseconds
    pub time_dur_ms: u32,

    /// Gain slot used by the primary loop for this point.
    pub profile_slot_select0: u8,

    /// Gain slot used by the auxiliary loop for this point.
    pub profile_slot_select1: u8,

    pub zero_pos: bool,

    pub is_last_point: bool,

    pub use_aux_pid: bool
}

/// A write-once buffer of points, consumed by
/// [`MotorController::start_motion_profile`].
#[derive(Debug, Clone, Default, Serialize)]
pub struct PointStream {
    points: Vec<StreamPoint>
}

/// Status of a motion profile executor.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct MotionProfileStatus {
    /// Number of points buffered in the controller and not yet executed.
    pub btm_buffer_cnt: u32,

    /// The executor ran out of points while the profile was still running.
    pub is_underrun: bool,

    /// Latched version of `is_underrun`, cleared by
    /// [`MotorController::clear_motion_profile_has_underrun`].
    pub has_underrun: bool,

    /// The point being executed is the last one.
    pub is_last: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SlotGains {
    /// The same gains with the sign of every gain term flipped.
    ///
    /// The integral zone and peak output are magnitudes and are kept.
    pub fn inverted(&self) -> Self {
        Self {
            k_f: -self.k_f,
            k_p: -self.k_p,
            k_i: -self.k_i,
            k_d: -self.k_d,
            ..*self
        }
    }
}

impl PointStream {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            points: Vec::with_capacity(capacity)
        }
    }

    /// Append a point to the end of the stream.
    pub fn write(&mut self, point: StreamPoint) {
        self.points.push(point);
    }

    pub fn points(&self) -> &[StreamPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

impl PidLoop {
    /// Index of the loop in the vendor API.
    pub fn index(self) -> usize {
        match self {
            PidLoop::Primary => 0,
            PidLoop::Auxiliary => 1
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Check a device's firmware against the minimum supported version.
///
/// A stale firmware does not stop the device from being used, it is reported
/// and the device is marked as not OK.
pub fn check_firmware_version(name: &str, version: u16, min_version: u16) -> bool {
    if version < min_version {
        warn!(
            "{} has too old of firmware (may not work): found {}, minimum {}",
            name, version, min_version
        );
        false
    }
    else {
        true
    }
}

fn default_peak_output() -> f64 {
    1.0
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_inverted_gains() {
        let gains = SlotGains {
            k_f: 0.1,
            k_p: 2.0,
            k_i: 0.01,
            k_d: 20.0,
            integral_zone: 50.0,
            peak_output: 0.8
        };

        let inv = gains.inverted();
        assert_eq!(inv.k_f, -0.1);
        assert_eq!(inv.k_p, -2.0);
        assert_eq!(inv.k_i, -0.01);
        assert_eq!(inv.k_d, -20.0);
        assert_eq!(inv.integral_zone, 50.0);
        assert_eq!(inv.peak_output, 0.8);
        assert_eq!(inv.inverted(), gains);
    }

    #[test]
    fn test_check_firmware_version() {
        assert!(check_firmware_version("[TalonSRX:1]", 0x1400, 0x1400));
        assert!(check_firmware_version("[TalonSRX:1]", 0x1401, 0x1400));
        assert!(!check_firmware_version("[TalonSRX:1]", 0x0300, 0x1400));
    }
}
