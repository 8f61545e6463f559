//! Heading sensor wrapper

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use std::fmt;

use super::{check_firmware_version, CriticalDevice, HeadingSensor, Identified};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A heading sensor with its firmware checked.
#[derive(Debug, Clone)]
pub struct Gyro<G: HeadingSensor> {
    device: G,
    firmware_ok: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<G: HeadingSensor> Gyro<G> {
    pub fn new(device: G, min_firmware_version: u16) -> Self {
        let firmware_ok = check_firmware_version(
            &device.describe(),
            device.firmware_version(),
            min_firmware_version
        );

        Self {
            device,
            firmware_ok
        }
    }

    /// The underlying device handle.
    pub fn device(&self) -> &G {
        &self.device
    }

    /// Current yaw in degrees.
    pub fn yaw_deg(&self) -> f64 {
        self.device.yaw_deg()
    }

    /// Reset the yaw reference.
    pub fn zero_yaw(&self) {
        self.device.zero_yaw();
    }
}

impl<G: HeadingSensor> CriticalDevice for Gyro<G> {
    fn is_ok(&self) -> bool {
        !self.device.has_any_fault() && self.firmware_ok
    }
}

impl<G: HeadingSensor> Identified for Gyro<G> {
    fn device_id(&self) -> u8 {
        self.device.device_id()
    }

    fn device_kind(&self) -> &'static str {
        self.device.device_kind()
    }
}

impl<G: HeadingSensor> fmt::Display for Gyro<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eqpt::sim::SimGyro;

    #[test]
    fn test_zero_yaw() {
        let sim = SimGyro::new(9);
        sim.set_yaw(45.0);

        let gyro = Gyro::new(sim.clone(), 0);
        assert_eq!(gyro.yaw_deg(), 45.0);

        gyro.zero_yaw();
        assert_eq!(gyro.yaw_deg(), 0.0);
        assert_eq!(sim.state().zero_count, 1);
    }

    #[test]
    fn test_health() {
        let sim = SimGyro::new(9);
        sim.state_mut().firmware_version = 2;

        assert!(!Gyro::new(sim.clone(), 3).is_ok());

        let gyro = Gyro::new(sim.clone(), 2);
        assert!(gyro.is_ok());

        sim.state_mut().fault = true;
        assert!(!gyro.is_ok());
    }
}
