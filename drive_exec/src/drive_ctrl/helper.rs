//! Joystick input shaping
//!
//! Converts throttle and wheel axes into a left/right power pair. The
//! [`CheesyDriveHelper`] is a curvature style shaper: the wheel is passed
//! through a sine non-linearity, sudden wheel changes are boosted by a
//! negative inertia term, and in quick turn mode the robot rotates in place.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Serialize;
use std::f64::consts::FRAC_PI_2;

// Internal
use util::maths::{handle_deadband, limit};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

const THROTTLE_DEADBAND: f64 = 0.02;
const WHEEL_DEADBAND: f64 = 0.02;

// ---- HIGH GEAR ----

const HIGH_WHEEL_NON_LINEARITY: f64 = 0.65;
const HIGH_NEG_INERTIA_SCALAR: f64 = 4.0;
const HIGH_SENSITIVITY: f64 = 0.65;

// ---- LOW GEAR ----

const LOW_WHEEL_NON_LINEARITY: f64 = 0.5;
const LOW_NEG_INERTIA_THRESHOLD: f64 = 0.65;
const LOW_NEG_INERTIA_TURN_SCALAR: f64 = 3.5;
const LOW_NEG_INERTIA_CLOSE_SCALAR: f64 = 4.0;
const LOW_NEG_INERTIA_FAR_SCALAR: f64 = 5.0;
const LOW_SENSITIVITY: f64 = 0.65;

// ---- QUICK STOP ----

const QUICK_STOP_DEADBAND: f64 = 0.5;
const QUICK_STOP_WEIGHT: f64 = 0.1;
const QUICK_STOP_SCALAR: f64 = 5.0;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// Shapes operator input into per side power.
///
/// Both outputs must lie in `[-1, 1]`. Implementations may keep state
/// between calls, which is why the controller seeds a helper with a neutral
/// call before first use.
pub trait DriveHelper {
    fn drive(
        &mut self,
        throttle: f64,
        wheel: f64,
        quick_turn: bool,
        high_gear: bool
    ) -> DriveSignal;
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Left and right percent output demands.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct DriveSignal {
    pub left: f64,
    pub right: f64
}

/// Curvature style input shaper.
#[derive(Debug, Clone, Default)]
pub struct CheesyDriveHelper {
    old_wheel: f64,
    quick_stop_accumulator: f64,
    neg_inertia_accumulator: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl DriveSignal {
    pub fn new(left: f64, right: f64) -> Self {
        Self { left, right }
    }

    /// The signal to send when the front of the robot is swapped to the
    /// back.
    pub fn inverted(&self) -> Self {
        Self {
            left: -self.right,
            right: -self.left
        }
    }
}

impl<F> DriveHelper for F
where
    F: FnMut(f64, f64, bool, bool) -> DriveSignal
{
    fn drive(
        &mut self,
        throttle: f64,
        wheel: f64,
        quick_turn: bool,
        high_gear: bool
    ) -> DriveSignal {
        self(throttle, wheel, quick_turn, high_gear)
    }
}

impl CheesyDriveHelper {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DriveHelper for CheesyDriveHelper {
    fn drive(
        &mut self,
        throttle: f64,
        wheel: f64,
        quick_turn: bool,
        high_gear: bool
    ) -> DriveSignal {
        let mut wheel = handle_deadband(wheel, WHEEL_DEADBAND);
        let throttle = handle_deadband(throttle, THROTTLE_DEADBAND);

        let neg_inertia = wheel - self.old_wheel;
        self.old_wheel = wheel;

        // Wheel non-linearity, applied more times in low gear
        let (non_linearity, passes) = if high_gear {
            (HIGH_WHEEL_NON_LINEARITY, 2)
        }
        else {
            (LOW_WHEEL_NON_LINEARITY, 3)
        };
        let denominator = (FRAC_PI_2 * non_linearity).sin();
        for _ in 0..passes {
            wheel = (FRAC_PI_2 * non_linearity * wheel).sin() / denominator;
        }

        let (neg_inertia_scalar, sensitivity) = if high_gear {
            (HIGH_NEG_INERTIA_SCALAR, HIGH_SENSITIVITY)
        }
        else if wheel * neg_inertia > 0.0 {
            // Turning further
            (LOW_NEG_INERTIA_TURN_SCALAR, LOW_SENSITIVITY)
        }
        else if wheel.abs() > LOW_NEG_INERTIA_THRESHOLD {
            (LOW_NEG_INERTIA_FAR_SCALAR, LOW_SENSITIVITY)
        }
        else {
            (LOW_NEG_INERTIA_CLOSE_SCALAR, LOW_SENSITIVITY)
        };

        self.neg_inertia_accumulator += neg_inertia * neg_inertia_scalar;
        wheel += self.neg_inertia_accumulator;
        self.neg_inertia_accumulator = decay(self.neg_inertia_accumulator);

        let linear_power = throttle;
        let over_power;
        let angular_power;

        if quick_turn {
            if linear_power.abs() < QUICK_STOP_DEADBAND {
                self.quick_stop_accumulator = (1.0 - QUICK_STOP_WEIGHT)
                    * self.quick_stop_accumulator
                    + QUICK_STOP_WEIGHT * limit(wheel, 1.0) * QUICK_STOP_SCALAR;
            }
            over_power = 1.0;
            angular_power = wheel;
        }
        else {
            over_power = 0.0;
            angular_power = throttle.abs() * wheel * sensitivity
                - self.quick_stop_accumulator;
            self.quick_stop_accumulator = decay(self.quick_stop_accumulator);
        }

        let mut left = linear_power + angular_power;
        let mut right = linear_power - angular_power;

        // Move power saturating one side over to the other
        if left > 1.0 {
            right -= over_power * (left - 1.0);
            left = 1.0;
        }
        else if right > 1.0 {
            left -= over_power * (right - 1.0);
            right = 1.0;
        }
        else if left < -1.0 {
            right += over_power * (-1.0 - left);
            left = -1.0;
        }
        else if right < -1.0 {
            left += over_power * (-1.0 - right);
            right = -1.0;
        }

        DriveSignal {
            left: limit(left, 1.0),
            right: limit(right, 1.0)
        }
    }
}

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Move an accumulator one unit towards zero, or to zero if within one unit.
fn decay(accumulator: f64) -> f64 {
    if accumulator > 1.0 {
        accumulator - 1.0
    }
    else if accumulator < -1.0 {
        accumulator + 1.0
    }
    else {
        0.0
    }
}
