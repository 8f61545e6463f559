//! # Simulated equipment
//!
//! Devices which record what they are told and step loaded motion profiles
//! in software. Used by the executable when no hardware is attached and as
//! test doubles.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use std::cell::{Cell, Ref, RefCell, RefMut};
use std::rc::Rc;

// Internal
use super::*;

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Firmware version reported by simulated devices unless overridden.
pub const SIM_FIRMWARE_VERSION: u16 = 0x1400;

/// Default free speed of a simulated motor at full output.
///
/// Units: sensor units per millisecond
pub const SIM_FREE_SPEED: f64 = 4.0;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Handle to a simulated motor controller.
#[derive(Debug, Clone)]
pub struct SimMotor {
    id: u8,
    state: Rc<RefCell<SimMotorState>>
}

/// Everything a simulated motor controller has been told.
#[derive(Debug, Clone)]
pub struct SimMotorState {
    pub output: f64,
    pub neutral_mode: NeutralMode,
    pub following: Option<u8>,

    pub firmware_version: u16,
    pub fault: bool,
    pub sticky_faults: bool,
    pub sensor_present: bool,

    pub factory_defaulted: bool,
    pub neutral_deadband: f64,

    /// Selected sensor position of each loop, indexed by [`PidLoop::index`].
    pub sensor_positions: [f64; 2],
    pub quadrature_position: f64,

    pub feedback_sensors: [Option<FeedbackDevice>; 2],
    pub feedback_coefficients: [f64; 2],
    pub remote_filters: [Option<(u8, RemoteSensorSource)>; 2],
    pub sensor_terms: [Option<FeedbackDevice>; 2],
    pub slots: [SlotGains; NUM_GAIN_SLOTS as usize],
    pub status_frame_periods: Vec<(StatusFrame, u8)>,

    pub profile: Option<SimProfile>,
    /// Copy of the most recently started point stream.
    pub last_stream: Option<PointStream>,
    pub profiles_started: u32,
    pub underrun: bool,
    pub has_underrun: bool,

    /// Units: sensor units per millisecond at full output
    pub free_speed: f64
}

/// A point stream being executed by a simulated motor.
#[derive(Debug, Clone)]
pub struct SimProfile {
    stream: PointStream,
    cursor: usize,
    point_elapsed_ms: u32,
    pub min_buffered_points: u32
}

/// Handle to a simulated heading sensor.
#[derive(Debug, Clone)]
pub struct SimGyro {
    id: u8,
    state: Rc<RefCell<SimGyroState>>
}

#[derive(Debug, Clone)]
pub struct SimGyroState {
    pub yaw_deg: f64,
    pub firmware_version: u16,
    pub fault: bool,
    pub zero_count: u32
}

/// Handle to a simulated shifter.
#[derive(Debug, Clone)]
pub struct SimShifter {
    high: Rc<Cell<bool>>
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl SimMotor {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            state: Rc::new(RefCell::new(SimMotorState::default()))
        }
    }

    pub fn state(&self) -> Ref<'_, SimMotorState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, SimMotorState> {
        self.state.borrow_mut()
    }

    /// Advance the simulation by `dt_ms`.
    ///
    /// A running profile moves the sensors to the active point, otherwise the
    /// primary sensor integrates the percent output.
    pub fn step(&self, dt_ms: u32) {
        let mut guard = self.state.borrow_mut();
        let s = &mut *guard;

        match s.profile.as_mut() {
            Some(profile) => {
                if let Some(point) = profile.advance(dt_ms) {
                    s.sensor_positions = [point.position, point.aux_position];
                }
            },
            None => {
                let delta = s.output * s.free_speed * dt_ms as f64;
                s.sensor_positions[0] += delta;
                s.quadrature_position += delta;
            }
        }
    }
}

impl Default for SimMotorState {
    fn default() -> Self {
        Self {
            output: 0.0,
            neutral_mode: NeutralMode::Coast,
            following: None,
            firmware_version: SIM_FIRMWARE_VERSION,
            fault: false,
            sticky_faults: false,
            sensor_present: true,
            factory_defaulted: false,
            neutral_deadband: 0.0,
            sensor_positions: [0.0; 2],
            quadrature_position: 0.0,
            feedback_sensors: [None; 2],
            feedback_coefficients: [1.0; 2],
            remote_filters: [None; 2],
            sensor_terms: [None; 2],
            slots: [SlotGains::default(); NUM_GAIN_SLOTS as usize],
            status_frame_periods: Vec::new(),
            profile: None,
            last_stream: None,
            profiles_started: 0,
            underrun: false,
            has_underrun: false,
            free_speed: SIM_FREE_SPEED
        }
    }
}

impl PoweredDevice for SimMotor {
    fn set_percent_output(&self, value: f64) {
        self.state.borrow_mut().output = value;
    }

    fn set_neutral_mode(&self, mode: NeutralMode) {
        self.state.borrow_mut().neutral_mode = mode;
    }
}

impl Identified for SimMotor {
    fn device_id(&self) -> u8 {
        self.id
    }

    fn device_kind(&self) -> &'static str {
        "SimMotor"
    }
}

impl MotorController for SimMotor {
    fn firmware_version(&self) -> u16 {
        self.state.borrow().firmware_version
    }

    fn has_any_fault(&self) -> bool {
        self.state.borrow().fault
    }

    fn is_sensor_present(&self) -> bool {
        self.state.borrow().sensor_present
    }

    fn config_factory_default(&self) {
        self.state.borrow_mut().factory_defaulted = true;
    }

    fn clear_sticky_faults(&self) {
        self.state.borrow_mut().sticky_faults = false;
    }

    fn clear_motion_profile_has_underrun(&self) {
        self.state.borrow_mut().has_underrun = false;
    }

    fn config_neutral_deadband(&self, deadband: f64) {
        self.state.borrow_mut().neutral_deadband = deadband;
    }

    fn follow(&self, master_id: u8) {
        self.state.borrow_mut().following = Some(master_id);
    }

    fn selected_sensor_position(&self, pid_loop: PidLoop) -> f64 {
        self.state.borrow().sensor_positions[pid_loop.index()]
    }

    fn set_selected_sensor_position(&self, position: f64, pid_loop: PidLoop) {
        self.state.borrow_mut().sensor_positions[pid_loop.index()] = position;
    }

    fn set_quadrature_position(&self, position: f64, _timeout_ms: u32) {
        self.state.borrow_mut().quadrature_position = position;
    }

    fn config_selected_feedback_sensor(&self, device: FeedbackDevice, pid_loop: PidLoop) {
        self.state.borrow_mut().feedback_sensors[pid_loop.index()] = Some(device);
    }

    fn config_selected_feedback_coefficient(&self, coefficient: f64, pid_loop: PidLoop) {
        self.state.borrow_mut().feedback_coefficients[pid_loop.index()] = coefficient;
    }

    fn config_remote_feedback_filter(
        &self,
        device_id: u8,
        source: RemoteSensorSource,
        ordinal: u8
    ) {
        if let Some(filter) = self.state.borrow_mut()
            .remote_filters
            .get_mut(ordinal as usize)
        {
            *filter = Some((device_id, source));
        }
    }

    fn config_sensor_term(&self, term: SensorTerm, device: FeedbackDevice) {
        let idx = match term {
            SensorTerm::Sum0 => 0,
            SensorTerm::Sum1 => 1
        };
        self.state.borrow_mut().sensor_terms[idx] = Some(device);
    }

    fn config_slot(&self, slot: u8, gains: &SlotGains) {
        if let Some(s) = self.state.borrow_mut().slots.get_mut(slot as usize) {
            *s = *gains;
        }
    }

    fn set_status_frame_period(&self, frame: StatusFrame, period_ms: u8) {
        self.state.borrow_mut().status_frame_periods.push((frame, period_ms));
    }

    fn start_motion_profile(&self, stream: PointStream, min_buffered_points: u32) {
        let mut s = self.state.borrow_mut();
        s.last_stream = Some(stream.clone());
        s.profile = Some(SimProfile::new(stream, min_buffered_points));
        s.profiles_started += 1;
    }

    fn is_motion_profile_finished(&self) -> bool {
        match self.state.borrow().profile {
            Some(ref p) => p.is_finished(),
            None => false
        }
    }

    fn motion_profile_status(&self) -> MotionProfileStatus {
        let s = self.state.borrow();

        let (btm_buffer_cnt, is_last) = match s.profile {
            Some(ref p) => (p.remaining() as u32, p.remaining() == 1),
            None => (0, false)
        };

        MotionProfileStatus {
            btm_buffer_cnt,
            is_underrun: s.underrun,
            has_underrun: s.has_underrun || s.underrun,
            is_last
        }
    }

    fn clear_motion_profile_trajectories(&self) {
        self.state.borrow_mut().profile = None;
    }
}

impl SimProfile {
    fn new(stream: PointStream, min_buffered_points: u32) -> Self {
        Self {
            stream,
            cursor: 0,
            point_elapsed_ms: 0,
            min_buffered_points
        }
    }

    /// Advance through the stream, returning the active point or `None` once
    /// the stream is exhausted.
    fn advance(&mut self, dt_ms: u32) -> Option<StreamPoint> {
        let points = self.stream.points();

        if self.cursor >= points.len() {
            return None;
        }

        self.point_elapsed_ms += dt_ms;

        while self.cursor < points.len()
            && self.point_elapsed_ms >= points[self.cursor].time_dur_ms
        {
            self.point_elapsed_ms -= points[self.cursor].time_dur_ms;
            self.cursor += 1;
        }

        points.get(self.cursor.min(points.len() - 1)).copied()
    }

    /// Number of points not yet executed.
    pub fn remaining(&self) -> usize {
        self.stream.len().saturating_sub(self.cursor)
    }

    pub fn is_finished(&self) -> bool {
        self.remaining() == 0
    }
}

impl SimGyro {
    pub fn new(id: u8) -> Self {
        Self {
            id,
            state: Rc::new(RefCell::new(SimGyroState {
                yaw_deg: 0.0,
                firmware_version: SIM_FIRMWARE_VERSION,
                fault: false,
                zero_count: 0
            }))
        }
    }

    pub fn state(&self) -> Ref<'_, SimGyroState> {
        self.state.borrow()
    }

    pub fn state_mut(&self) -> RefMut<'_, SimGyroState> {
        self.state.borrow_mut()
    }
}

impl Identified for SimGyro {
    fn device_id(&self) -> u8 {
        self.id
    }

    fn device_kind(&self) -> &'static str {
        "SimPigeon"
    }
}

impl HeadingSensor for SimGyro {
    fn firmware_version(&self) -> u16 {
        self.state.borrow().firmware_version
    }

    fn has_any_fault(&self) -> bool {
        self.state.borrow().fault
    }

    fn yaw_deg(&self) -> f64 {
        self.state.borrow().yaw_deg
    }

    fn set_yaw(&self, yaw_deg: f64) {
        self.state.borrow_mut().yaw_deg = yaw_deg;
    }

    fn zero_yaw(&self) {
        let mut s = self.state.borrow_mut();
        s.yaw_deg = 0.0;
        s.zero_count += 1;
    }
}

impl SimShifter {
    pub fn new(high: bool) -> Self {
        Self {
            high: Rc::new(Cell::new(high))
        }
    }

    pub fn set_high(&self, high: bool) {
        self.high.set(high);
    }
}

impl Shifter for SimShifter {
    fn is_high(&self) -> bool {
        self.high.get()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn point(position: f64, time_dur_ms: u32, is_last_point: bool) -> StreamPoint {
        StreamPoint {
            position,
            aux_position: -position,
            time_dur_ms,
            is_last_point,
            ..Default::default()
        }
    }

    #[test]
    fn test_profile_steps_to_completion() {
        let motor = SimMotor::new(1);

        let mut stream = PointStream::with_capacity(3);
        stream.write(point(10.0, 10, false));
        stream.write(point(20.0, 10, false));
        stream.write(point(30.0, 10, true));

        motor.start_motion_profile(stream, 2);
        assert!(!motor.is_motion_profile_finished());
        assert_eq!(motor.motion_profile_status().btm_buffer_cnt, 3);

        motor.step(10);
        assert_eq!(motor.selected_sensor_position(PidLoop::Primary), 20.0);
        assert_eq!(motor.selected_sensor_position(PidLoop::Auxiliary), -20.0);

        motor.step(10);
        assert!(motor.motion_profile_status().is_last);

        motor.step(10);
        assert!(motor.is_motion_profile_finished());
        assert_eq!(motor.selected_sensor_position(PidLoop::Primary), 30.0);
    }

    #[test]
    fn test_cleared_profile_not_finished() {
        let motor = SimMotor::new(1);

        let mut stream = PointStream::with_capacity(1);
        stream.write(point(1.0, 0, true));
        motor.start_motion_profile(stream, 1);
        motor.clear_motion_profile_trajectories();

        assert!(!motor.is_motion_profile_finished());
        assert_eq!(motor.state().profiles_started, 1);
        assert!(motor.state().last_stream.is_some());
    }

    #[test]
    fn test_output_integrates_without_profile() {
        let motor = SimMotor::new(1);
        motor.set_percent_output(0.5);
        motor.step(20);

        assert_eq!(
            motor.selected_sensor_position(PidLoop::Primary),
            0.5 * SIM_FREE_SPEED * 20.0
        );
    }
}
