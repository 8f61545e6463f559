//! Implementations for the motion profile manager

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::{debug, info, warn};
use std::cell::Cell;

// Internal
use super::{Params, Trajectory};
use crate::{
    eqpt::{
        FeedbackDevice, HeadingSensor, MotorController, PidLoop, PointStream,
        RemoteSensorSource, SensorTerm, StatusFrame, StreamPoint, CONFIG_TIMEOUT_MS
    },
    follower::{FollowTarget, Follower, FollowerFactory}
};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Executes one trajectory on the master motor controller's dual closed
/// loop.
///
/// The trajectory is converted into a point stream on construction. The
/// stream is handed to the controller on [`MpManager::start_mp`] and cannot
/// be replayed, a new manager must be built to run the trajectory again.
#[derive(Debug)]
pub struct MpManager<M: MotorController, G: HeadingSensor> {
    master: M,
    gyro: G,
    params: Params,
    invert_gyro: bool,

    zero_heading: bool,

    stream: Option<PointStream>,
    num_points: usize,

    /// Completion as it stood when the profile was ended.
    done_at_end: Option<bool>,

    underrun_reported: Cell<bool>
}

/// How a trajectory is applied to the drivetrain.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ProfileOptions {
    /// Flip the sign of the heading gains, for a heading sensor mounted
    /// upside down.
    pub invert_gyro: bool,

    /// Mirror the path left to right.
    pub flipped: bool,

    /// Drive the path in the opposite direction to the one it was generated
    /// for.
    pub reverse: bool,

    /// Zero the heading sensor when the profile starts.
    pub zero_heading: bool
}

/// Builds [`MpManager`]s as the drivetrain's followers.
#[derive(Debug, Clone)]
pub struct MpFollowerFactory {
    params: Params,
    invert_gyro: bool
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl<M: MotorController, G: HeadingSensor> MpManager<M, G> {

    /// Configure the sensor fusion used by every profile.
    ///
    /// The left master's encoder is exposed to the right master as remote
    /// sensor 0 and the heading sensor as remote sensor 1. The right master
    /// then runs its primary loop on the average of both encoders and its
    /// auxiliary loop on the heading.
    pub fn config_sensor_fusion(left: &M, right: &M, gyro: &G, params: &Params) {
        // Left master only publishes its encoder
        left.config_selected_feedback_sensor(FeedbackDevice::QuadEncoder, PidLoop::Primary);
        left.set_status_frame_period(StatusFrame::Feedback0, params.status_frame_period_ms);

        // Remote sensors of the right master
        right.config_remote_feedback_filter(
            left.device_id(),
            RemoteSensorSource::MotorSelectedSensor,
            0
        );
        right.config_remote_feedback_filter(
            gyro.device_id(),
            RemoteSensorSource::PigeonYaw,
            1
        );

        // Primary loop: (left + right) / 2
        right.config_sensor_term(SensorTerm::Sum0, FeedbackDevice::RemoteSensor0);
        right.config_sensor_term(SensorTerm::Sum1, FeedbackDevice::QuadEncoder);
        right.config_selected_feedback_sensor(FeedbackDevice::SensorSum, PidLoop::Primary);
        right.config_selected_feedback_coefficient(0.5, PidLoop::Primary);

        // Auxiliary loop: heading
        right.config_selected_feedback_sensor(FeedbackDevice::RemoteSensor1, PidLoop::Auxiliary);
        right.config_selected_feedback_coefficient(
            params.turn_units_per_degree,
            PidLoop::Auxiliary
        );

        right.config_slot(params.primary_slot, &params.primary_gains);
        right.config_slot(params.aux_slot, &params.aux_gains);

        debug!(
            "Sensor fusion configured: {} primary = ({} + own encoder) / 2, auxiliary = {} yaw",
            right.describe(), left.describe(), gyro.describe()
        );
    }

    /// Load a trajectory and configure the master's closed loop for it.
    pub fn new(
        trajectory: &Trajectory,
        master: M,
        gyro: G,
        params: &Params,
        options: ProfileOptions
    ) -> Self {
        let stream = Self::load_stream(trajectory, options.flipped, options.reverse, params);

        let mgr = Self {
            master,
            gyro,
            params: params.clone(),
            invert_gyro: options.invert_gyro,
            zero_heading: options.zero_heading,
            num_points: stream.len(),
            stream: Some(stream),
            done_at_end: None,
            underrun_reported: Cell::new(false)
        };

        mgr.config_master();

        mgr
    }

    /// Convert a trajectory into a point stream in sensor units.
    ///
    /// Position and velocity are signed by the direction of travel and
    /// heading is negated for a flipped path. Only the final point is
    /// marked as the last.
    pub fn load_stream(
        trajectory: &Trajectory,
        flipped: bool,
        reverse: bool,
        params: &Params
    ) -> PointStream {
        let direction = if trajectory.is_forward() != reverse { 1.0 } else { -1.0 };
        let mirror = if flipped { -1.0 } else { 1.0 };
        let num_points = trajectory.len();

        let mut stream = PointStream::with_capacity(num_points);

        for (i, p) in trajectory.points().iter().enumerate() {
            stream.write(StreamPoint {
                position: direction * p.position * params.encoder_units_per_rotation,
                velocity: direction * p.velocity * params.encoder_units_per_rotation,
                arb_feed_fwd: 0.0,
                aux_position: mirror * p.heading_deg * params.turn_units_per_degree,
                aux_velocity: 0.0,
                aux_arb_feed_fwd: 0.0,
                time_dur_ms: p.duration_ms,
                profile_slot_select0: params.primary_slot,
                profile_slot_select1: params.aux_slot,
                zero_pos: false,
                is_last_point: i + 1 == num_points,
                use_aux_pid: true
            });
        }

        stream
    }

    /// Returns true if the heading gains are sign flipped.
    pub fn is_gyro_inverted(&self) -> bool {
        self.invert_gyro
    }

    /// Number of points in the loaded trajectory.
    pub fn num_points(&self) -> usize {
        self.num_points
    }

    /// Returns true if the profile has been handed to the controller.
    pub fn is_started(&self) -> bool {
        self.stream.is_none()
    }

    /// Start executing the profile.
    ///
    /// The position counter is seeded with a non-zero value, as a position
    /// of exactly zero is not handled by the controller's arc mode. The
    /// heading is zeroed if the profile was built with
    /// [`ProfileOptions::zero_heading`].
    pub fn start_mp(&mut self) {
        let stream = match self.stream.take() {
            Some(s) => s,
            None => {
                warn!("Motion profile on {} already started", self.master.describe());
                return;
            }
        };

        self.master.set_quadrature_position(
            self.params.start_position_seed,
            CONFIG_TIMEOUT_MS
        );
        if self.zero_heading {
            self.gyro.zero_yaw();
        }

        self.master.start_motion_profile(stream, self.params.min_buffered_points);

        info!(
            "Motion profile of {} points started on {}",
            self.num_points,
            self.master.describe()
        );
    }

    /// Returns true once the controller has executed the last point.
    ///
    /// Once the profile has been ended this is the completion latched at
    /// that time, as clearing the controller resets its finished flag.
    pub fn is_mp_done(&self) -> bool {
        match self.done_at_end {
            Some(done) => done,
            None => self.master.is_motion_profile_finished()
        }
    }

    /// Returns true if points are not reaching the controller fast enough.
    ///
    /// This is only reported, correcting it means leaving the control loop
    /// more time to feed the buffer.
    pub fn is_mp_underrun(&self) -> bool {
        let underrun = self.master.motion_profile_status().is_underrun;

        if underrun && !self.underrun_reported.get() {
            warn!(
                "Motion profile on {} underran, points are not being sent fast enough",
                self.master.describe()
            );
            self.underrun_reported.set(true);
        }

        underrun
    }

    /// Write the profile gains to the master.
    fn config_master(&self) {
        let aux_gains = if self.invert_gyro {
            self.params.aux_gains.inverted()
        }
        else {
            self.params.aux_gains
        };

        self.master.config_slot(self.params.primary_slot, &self.params.primary_gains);
        self.master.config_slot(self.params.aux_slot, &aux_gains);

        let period = self.params.status_frame_period_ms;
        self.master.set_status_frame_period(StatusFrame::Feedback1, period);
        self.master.set_status_frame_period(StatusFrame::Targets, period);
        self.master.set_status_frame_period(StatusFrame::Targets1, period);
    }
}

impl<M: MotorController, G: HeadingSensor> Follower for MpManager<M, G> {
    fn start(&mut self) {
        self.start_mp();
    }

    fn end(&mut self) {
        if self.done_at_end.is_none() {
            self.done_at_end = Some(self.is_mp_done());
        }

        self.master.clear_motion_profile_trajectories();
        self.master.set_percent_output(0.0);

        info!("Motion profile on {} ended", self.master.describe());
    }

    fn is_finished(&self) -> bool {
        self.is_mp_done()
    }

    fn is_underrun(&self) -> bool {
        self.is_mp_underrun()
    }
}

impl MpFollowerFactory {
    /// Create a factory.
    ///
    /// `invert_gyro` depends on how the heading sensor is mounted and must be
    /// given explicitly.
    pub fn new(params: Params, invert_gyro: bool) -> Self {
        Self {
            params,
            invert_gyro
        }
    }
}

impl<M: MotorController, G: HeadingSensor> FollowerFactory<M, G> for MpFollowerFactory {
    type Follower = MpManager<M, G>;

    fn create(
        &mut self,
        target: FollowTarget<'_, M, G>,
        trajectory: &Trajectory,
        flipped: bool,
        reverse: bool,
        zero_gyro: bool
    ) -> Self::Follower {
        MpManager::new(
            trajectory,
            target.master().clone(),
            target.gyro.device().clone(),
            &self.params,
            ProfileOptions {
                invert_gyro: self.invert_gyro,
                flipped,
                reverse,
                zero_heading: zero_gyro
            }
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        eqpt::{sim::{SimGyro, SimMotor}, Gyro, Motor, NeutralMode},
        motor_group::MotorGroup,
        mp_mgr::test_params
    };

    fn trajectory(forward: bool) -> Trajectory {
        Trajectory::from_rows(
            &[
                [0.00, 0.0, 10.0, 0.0],
                [0.25, 2.5, 10.0, 1.5],
                [0.75, 5.0, 10.0, 4.0],
                [1.00, 2.5, 10.0, 5.0]
            ],
            forward,
            false
        ).unwrap()
    }

    fn manager(options: ProfileOptions) -> (MpManager<SimMotor, SimGyro>, SimMotor, SimGyro) {
        let master = SimMotor::new(2);
        let gyro = SimGyro::new(5);
        let mgr = MpManager::new(
            &trajectory(true),
            master.clone(),
            gyro.clone(),
            &test_params(),
            options
        );

        (mgr, master, gyro)
    }

    #[test]
    fn test_load_scales_and_marks_last() {
        let params = test_params();
        let stream = MpManager::<SimMotor, SimGyro>::load_stream(
            &trajectory(true), false, false, &params
        );
        let points = stream.points();

        assert_eq!(points.len(), 4);
        assert_eq!(points[1].position, 0.25 * 4096.0);
        assert_eq!(points[1].velocity, 2.5 * 4096.0);
        assert_eq!(points[2].aux_position, 40.0);
        assert_eq!(points[3].time_dur_ms, 10);

        for (i, p) in points.iter().enumerate() {
            assert_eq!(p.is_last_point, i == 3);
            assert_eq!(p.profile_slot_select0, params.primary_slot);
            assert_eq!(p.profile_slot_select1, params.aux_slot);
            assert!(p.use_aux_pid);
            assert!(!p.zero_pos);
        }
    }

    #[test]
    fn test_load_backwards_negates() {
        let params = test_params();
        let fwd = MpManager::<SimMotor, SimGyro>::load_stream(
            &trajectory(true), false, false, &params
        );
        let bwd = MpManager::<SimMotor, SimGyro>::load_stream(
            &trajectory(false), false, false, &params
        );

        for (f, b) in fwd.points().iter().zip(bwd.points().iter()) {
            assert_eq!(b.position, -f.position);
            assert_eq!(b.velocity, -f.velocity);
            assert_eq!(b.aux_position, f.aux_position);
            assert_eq!(b.is_last_point, f.is_last_point);
        }

        // Reversing a backwards path drives it forwards
        let rev = MpManager::<SimMotor, SimGyro>::load_stream(
            &trajectory(false), false, true, &params
        );
        assert_eq!(rev.points(), fwd.points());
    }

    #[test]
    fn test_load_flipped_mirrors_heading() {
        let params = test_params();
        let plain = MpManager::<SimMotor, SimGyro>::load_stream(
            &trajectory(true), false, false, &params
        );
        let flipped = MpManager::<SimMotor, SimGyro>::load_stream(
            &trajectory(true), true, false, &params
        );

        for (p, f) in plain.points().iter().zip(flipped.points().iter()) {
            assert_eq!(f.aux_position, -p.aux_position);
            assert_eq!(f.position, p.position);
        }
    }

    #[test]
    fn test_sensor_fusion_config() {
        let left = SimMotor::new(1);
        let right = SimMotor::new(2);
        let gyro = SimGyro::new(5);
        let params = test_params();

        MpManager::config_sensor_fusion(&left, &right, &gyro, &params);

        let l = left.state();
        assert_eq!(l.feedback_sensors[0], Some(FeedbackDevice::QuadEncoder));

        let r = right.state();
        assert_eq!(r.remote_filters[0], Some((1, RemoteSensorSource::MotorSelectedSensor)));
        assert_eq!(r.remote_filters[1], Some((5, RemoteSensorSource::PigeonYaw)));
        assert_eq!(r.sensor_terms[0], Some(FeedbackDevice::RemoteSensor0));
        assert_eq!(r.sensor_terms[1], Some(FeedbackDevice::QuadEncoder));
        assert_eq!(r.feedback_sensors[0], Some(FeedbackDevice::SensorSum));
        assert_eq!(r.feedback_coefficients[0], 0.5);
        assert_eq!(r.feedback_sensors[1], Some(FeedbackDevice::RemoteSensor1));
        assert_eq!(r.feedback_coefficients[1], params.turn_units_per_degree);
        assert_eq!(r.slots[0], params.primary_gains);
        assert_eq!(r.slots[1], params.aux_gains);
    }

    #[test]
    fn test_gyro_inversion_flips_aux_gains() {
        let params = test_params();

        let (mgr, master, _) = manager(ProfileOptions::default());
        assert!(!mgr.is_gyro_inverted());
        assert_eq!(master.state().slots[1], params.aux_gains);

        let (mgr, master, _) = manager(ProfileOptions {
            invert_gyro: true,
            ..Default::default()
        });
        assert!(mgr.is_gyro_inverted());
        assert_eq!(master.state().slots[0], params.primary_gains);
        assert_eq!(master.state().slots[1].k_p, -params.aux_gains.k_p);
        assert_eq!(master.state().slots[1].k_i, -params.aux_gains.k_i);
        assert_eq!(master.state().slots[1].k_d, -params.aux_gains.k_d);
        assert_eq!(master.state().slots[1].integral_zone, params.aux_gains.integral_zone);
    }

    #[test]
    fn test_start_seeds_and_runs_once() {
        let (mut mgr, master, gyro) = manager(ProfileOptions {
            zero_heading: true,
            ..Default::default()
        });
        gyro.set_yaw(30.0);

        assert!(!mgr.is_started());
        mgr.start_mp();
        assert!(mgr.is_started());

        {
            let s = master.state();
            assert_eq!(s.quadrature_position, test_params().start_position_seed);
            assert_ne!(s.quadrature_position, 0.0);
            assert_eq!(s.profiles_started, 1);
            assert_eq!(s.profile.as_ref().map(|p| p.min_buffered_points), Some(20));
            assert_eq!(s.last_stream.as_ref().map(|s| s.len()), Some(4));
        }
        assert_eq!(gyro.yaw_deg(), 0.0);
        assert_eq!(gyro.state().zero_count, 1);

        // The stream is consumed by the first start
        mgr.start_mp();
        assert_eq!(master.state().profiles_started, 1);
        assert_eq!(gyro.state().zero_count, 1);
    }

    #[test]
    fn test_start_keeps_heading() {
        let (mut mgr, master, gyro) = manager(ProfileOptions::default());
        gyro.set_yaw(30.0);

        mgr.start_mp();
        assert_eq!(master.state().profiles_started, 1);
        assert_eq!(gyro.yaw_deg(), 30.0);
        assert_eq!(gyro.state().zero_count, 0);
    }

    #[test]
    fn test_done_and_underrun_follow_hardware() {
        let (mut mgr, master, _) = manager(ProfileOptions::default());
        assert!(!mgr.is_mp_done());

        mgr.start();
        master.step(20);
        assert!(!mgr.is_finished());

        master.state_mut().underrun = true;
        assert!(mgr.is_mp_underrun());
        assert!(mgr.is_underrun());
        master.state_mut().underrun = false;
        assert!(!mgr.is_mp_underrun());

        master.step(20);
        assert!(mgr.is_mp_done());
    }

    #[test]
    fn test_end_clears_profile() {
        let (mut mgr, master, _) = manager(ProfileOptions::default());
        mgr.start();
        master.state_mut().output = 0.4;

        mgr.end();
        assert!(master.state().profile.is_none());
        assert_eq!(master.state().output, 0.0);
        assert!(!mgr.is_finished());
    }

    #[test]
    fn test_end_latches_completion() {
        let (mut mgr, master, _) = manager(ProfileOptions::default());
        mgr.start();
        master.step(40);
        assert!(mgr.is_finished());

        mgr.end();
        assert!(!master.is_motion_profile_finished());
        assert!(mgr.is_finished());
        assert!(mgr.is_mp_done());

        // A second end keeps the first latch
        mgr.end();
        assert!(mgr.is_finished());
    }

    #[test]
    fn test_factory_binds_right_master() {
        let left_sim = SimMotor::new(1);
        let right_sim = SimMotor::new(2);
        let gyro_sim = SimGyro::new(5);

        let left = MotorGroup::new(Motor::new(left_sim.clone(), 0, 0.0), Vec::new());
        let right = MotorGroup::new(Motor::new(right_sim.clone(), 0, 0.0), Vec::new());
        let gyro = Gyro::new(gyro_sim, 0);

        let mut factory = MpFollowerFactory::new(test_params(), true);
        let mut follower = factory.create(
            FollowTarget { left: &left, right: &right, gyro: &gyro },
            &trajectory(true),
            true,
            false,
            true
        );
        gyro.device().set_yaw(12.0);
        follower.start();

        assert!(follower.is_gyro_inverted());
        assert_eq!(gyro.yaw_deg(), 0.0);
        assert_eq!(right_sim.state().profiles_started, 1);
        assert_eq!(left_sim.state().profiles_started, 0);
        assert_eq!(left_sim.state().neutral_mode, NeutralMode::Coast);

        let stream = right_sim.state().last_stream.clone().unwrap();
        assert_eq!(stream.points()[2].aux_position, -40.0);
    }
}
