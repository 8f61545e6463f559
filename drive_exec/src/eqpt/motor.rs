//! Motor controller wrapper

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use std::fmt;

// Internal
use super::{
    check_firmware_version,
    CriticalDevice, Identified, MotorController, NeutralMode, PoweredDevice
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A motor controller which has been through setup.
///
/// Setup restores the factory configuration, clears faults, configures the
/// neutral deadband and commands zero output, so a `Motor` always starts in
/// a known state.
#[derive(Debug, Clone)]
pub struct Motor<M: MotorController> {
    device: M,
    firmware_ok: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M: MotorController> Motor<M> {
    /// Wrap and set up a motor controller.
    pub fn new(device: M, min_firmware_version: u16, neutral_deadband: f64) -> Self {
        let firmware_ok = check_firmware_version(
            &device.describe(),
            device.firmware_version(),
            min_firmware_version
        );

        device.config_factory_default();
        device.clear_sticky_faults();
        device.clear_motion_profile_has_underrun();
        device.config_neutral_deadband(neutral_deadband);
        device.set_percent_output(0.0);

        debug!("{} set up", device.describe());

        Self {
            device,
            firmware_ok
        }
    }

    /// The underlying device handle.
    pub fn device(&self) -> &M {
        &self.device
    }

    /// Returns true if the firmware met the minimum version at setup.
    pub fn is_firmware_ok(&self) -> bool {
        self.firmware_ok
    }

    /// Returns true if the locally attached encoder is present.
    pub fn is_encoder_ok(&self) -> bool {
        self.device.is_sensor_present()
    }
}

impl<M: MotorController> CriticalDevice for Motor<M> {
    fn is_ok(&self) -> bool {
        !self.device.has_any_fault() && self.firmware_ok
    }
}

impl<M: MotorController> PoweredDevice for Motor<M> {
    fn set_percent_output(&self, value: f64) {
        self.device.set_percent_output(value);
    }

    fn set_neutral_mode(&self, mode: NeutralMode) {
        self.device.set_neutral_mode(mode);
    }
}

impl<M: MotorController> Identified for Motor<M> {
    fn device_id(&self) -> u8 {
        self.device.device_id()
    }

    fn device_kind(&self) -> &'static str {
        self.device.device_kind()
    }
}

impl<M: MotorController> fmt::Display for Motor<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eqpt::sim::SimMotor;

    #[test]
    fn test_setup() {
        let sim = SimMotor::new(4);
        sim.state_mut().output = 0.7;
        sim.state_mut().sticky_faults = true;

        let motor = Motor::new(sim.clone(), 0x0100, 0.04);

        let state = sim.state();
        assert!(state.factory_defaulted);
        assert!(!state.sticky_faults);
        assert_eq!(state.neutral_deadband, 0.04);
        assert_eq!(state.output, 0.0);
        assert!(motor.is_ok());
        assert_eq!(motor.to_string(), "[SimMotor:4]");
    }

    #[test]
    fn test_stale_firmware_not_ok() {
        let sim = SimMotor::new(1);
        sim.state_mut().firmware_version = 0x0001;

        let motor = Motor::new(sim, 0x0100, 0.04);
        assert!(!motor.is_firmware_ok());
        assert!(!motor.is_ok());
    }

    #[test]
    fn test_fault_not_ok() {
        let sim = SimMotor::new(1);
        let motor = Motor::new(sim.clone(), 0x0100, 0.04);
        assert!(motor.is_ok());

        sim.state_mut().fault = true;
        assert!(!motor.is_ok());
    }
}
