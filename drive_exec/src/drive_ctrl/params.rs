//! Parameters structure for the drivetrain controller

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the drivetrain controller and the devices it owns.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- EQUIPMENT ----

    /// Oldest motor controller firmware which is considered OK.
    pub min_motor_firmware_version: u16,

    /// Oldest heading sensor firmware which is considered OK.
    pub min_gyro_firmware_version: u16,

    /// Demands below this magnitude are treated as neutral by the motor
    /// controllers.
    ///
    /// Units: percent output, 0 to 1
    pub neutral_deadband: f64,

    // ---- MANUAL DRIVING ----

    /// Scale applied to joystick axes before shaping.
    #[serde(default = "default_joystick_coefficient")]
    pub joystick_coefficient: f64,

    // ---- CONTROL LOOP ----

    /// Minimum period of one control cycle.
    ///
    /// Units: milliseconds
    pub cycle_period_ms: u32
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("The neutral deadband must be between 0 and 0.25, got {0}")]
    InvalidDeadband(f64),

    #[error("The joystick coefficient must be finite, got {0}")]
    InvalidJoystickCoefficient(f64),

    #[error("The control cycle period must be non-zero")]
    ZeroCyclePeriod
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {

    /// Determines if the parameters are valid.
    pub fn validate(&self) -> Result<(), ParamsError> {
        if !(0.0..=0.25).contains(&self.neutral_deadband) {
            return Err(ParamsError::InvalidDeadband(self.neutral_deadband));
        }

        if !self.joystick_coefficient.is_finite() {
            return Err(ParamsError::InvalidJoystickCoefficient(
                self.joystick_coefficient
            ));
        }

        if self.cycle_period_ms == 0 {
            return Err(ParamsError::ZeroCyclePeriod);
        }

        Ok(())
    }
}

fn default_joystick_coefficient() -> f64 {
    1.0
}

#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params {
        min_motor_firmware_version: 0x1400,
        min_gyro_firmware_version: 0x1400,
        neutral_deadband: 0.04,
        joystick_coefficient: 1.0,
        cycle_period_ms: 20
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_param_file() {
        let p: Params = util::params::load_from_str(
            include_str!("../../../params/drive_ctrl.toml")
        ).unwrap();

        assert_eq!(p.validate(), Ok(()));
        assert_eq!(p.cycle_period_ms, 20);
    }

    #[test]
    fn test_default_coefficient() {
        let p: Params = util::params::load_from_str(
            "min_motor_firmware_version = 1\n\
             min_gyro_firmware_version = 1\n\
             neutral_deadband = 0.04\n\
             cycle_period_ms = 20\n"
        ).unwrap();

        assert_eq!(p.joystick_coefficient, 1.0);
    }

    #[test]
    fn test_invalid() {
        let mut p = test_params();
        p.neutral_deadband = 0.5;
        assert_eq!(p.validate(), Err(ParamsError::InvalidDeadband(0.5)));

        let mut p = test_params();
        p.cycle_period_ms = 0;
        assert_eq!(p.validate(), Err(ParamsError::ZeroCyclePeriod));

        let mut p = test_params();
        p.joystick_coefficient = std::f64::NAN;
        assert!(p.validate().is_err());
    }
}
