//! # Motor groups
//!
//! A motor group is one logical side of the drivetrain: a master motor plus
//! any followers mechanically linked to it.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;

// Internal
use crate::eqpt::{
    CriticalDevice, Identified, Motor, MotorController, NeutralMode, PoweredDevice
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// One master and zero or more followers driven as a single output.
///
/// Followers mirror the master and are not separately commanded.
#[derive(Debug)]
pub struct MotorGroup<M: MotorController> {
    master: Motor<M>,
    followers: Vec<Motor<M>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M: MotorController> MotorGroup<M> {
    /// Build a group, wiring every follower to follow the master.
    pub fn new(master: Motor<M>, followers: Vec<Motor<M>>) -> Self {
        for f in followers.iter() {
            f.device().follow(master.device_id());
            debug!("{} following {}", f, master);
        }

        Self {
            master,
            followers
        }
    }

    pub fn master(&self) -> &Motor<M> {
        &self.master
    }

    pub fn followers(&self) -> &[Motor<M>] {
        &self.followers
    }

    /// Returns true if the master's encoder is present.
    pub fn is_encoder_ok(&self) -> bool {
        self.master.is_encoder_ok()
    }

    /// Put every motor in the group in coast mode.
    pub fn coast(&self) {
        self.set_neutral_mode(NeutralMode::Coast);
    }

    /// Put every motor in the group in brake mode.
    pub fn brake(&self) {
        self.set_neutral_mode(NeutralMode::Brake);
    }

    /// Command the master, and so the whole group, in percent output mode.
    pub fn set_percent_output(&self, value: f64) {
        self.master.set_percent_output(value);
    }

    fn set_neutral_mode(&self, mode: NeutralMode) {
        self.master.set_neutral_mode(mode);
        for f in self.followers.iter() {
            f.set_neutral_mode(mode);
        }
    }
}

impl<M: MotorController> CriticalDevice for MotorGroup<M> {
    /// The group is OK only if every motor in it is OK and the master's
    /// encoder is present.
    fn is_ok(&self) -> bool {
        self.master.is_ok()
            && self.followers.iter().all(|f| f.is_ok())
            && self.master.is_encoder_ok()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::eqpt::sim::SimMotor;

    fn group() -> (MotorGroup<SimMotor>, SimMotor, SimMotor, SimMotor) {
        let master = SimMotor::new(1);
        let f0 = SimMotor::new(2);
        let f1 = SimMotor::new(3);

        let group = MotorGroup::new(
            Motor::new(master.clone(), 0, 0.04),
            vec![
                Motor::new(f0.clone(), 0, 0.04),
                Motor::new(f1.clone(), 0, 0.04)
            ]
        );

        (group, master, f0, f1)
    }

    #[test]
    fn test_followers_follow_master() {
        let (group, master, f0, f1) = group();

        assert_eq!(master.state().following, None);
        assert_eq!(f0.state().following, Some(1));
        assert_eq!(f1.state().following, Some(1));
        assert_eq!(group.followers().len(), 2);
    }

    #[test]
    fn test_output_goes_to_master() {
        let (group, master, f0, _) = group();

        group.set_percent_output(0.3);
        assert_eq!(master.state().output, 0.3);
        assert_eq!(f0.state().output, 0.0);
    }

    #[test]
    fn test_neutral_mode_applies_to_all() {
        let (group, master, f0, f1) = group();

        group.brake();
        for m in [&master, &f0, &f1].iter() {
            assert_eq!(m.state().neutral_mode, NeutralMode::Brake);
        }

        group.coast();
        for m in [&master, &f0, &f1].iter() {
            assert_eq!(m.state().neutral_mode, NeutralMode::Coast);
        }
    }

    #[test]
    fn test_health() {
        let (group, master, _, f1) = group();
        assert!(group.is_ok());

        f1.state_mut().fault = true;
        assert!(!group.is_ok());
        f1.state_mut().fault = false;

        master.state_mut().sensor_present = false;
        assert!(!group.is_encoder_ok());
        assert!(!group.is_ok());
    }

    #[test]
    fn test_master_only_group() {
        let master = SimMotor::new(7);
        let group = MotorGroup::new(Motor::new(master, 0, 0.04), Vec::new());

        assert!(group.followers().is_empty());
        assert!(group.is_ok());
    }
}
