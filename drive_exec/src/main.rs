//! Main drivetrain executable entry point.
//!
//! # Architecture
//!
//! The executable runs the drivetrain against simulated equipment:
//!
//!     - Initialise the session, logging and parameters
//!     - Build the drivetrain
//!     - Main loop, paced by the thread rate controller:
//!         - Manual driving phase
//!         - Trajectory following phase, until the follower finishes
//!         - Simulated equipment step
//!
//! A trajectory may be given as the only argument, as a path to a JSON file.
//! Otherwise a straight line trajectory is generated.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use color_eyre::{Report, eyre::{WrapErr, eyre}};
use log::{debug, info, warn};
use std::env;
use std::time::Duration;

// Internal
use drive_lib::{
    drive_ctrl::{self, CheesyDriveHelper, DriveCtrl, DriveMode},
    eqpt::{
        sim::{SimGyro, SimMotor, SimShifter},
        CriticalDevice, Gyro, Motor
    },
    motor_group::MotorGroup,
    mp_mgr::{self, MpFollowerFactory, Trajectory, TrajectoryError}
};
use util::{
    logger::{logger_init, LevelFilter},
    maths::signed_square,
    session::Session,
    time::{ElapsedTimer, ThreadRateControl}
};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of cycles spent driving manually before the trajectory starts.
const MANUAL_PHASE_CYCLES: u32 = 50;

/// Raw throttle axis value used in the manual phase (forward is negative).
const MANUAL_THROTTLE: f64 = -0.6;

/// Raw turn axis value used in the manual phase.
const MANUAL_TURN: f64 = 0.1;

/// Length of the generated trajectory.
///
/// Units: rotations
const STRAIGHT_LINE_DISTANCE_ROT: f64 = 2.0;

/// Duration of the generated trajectory.
///
/// Units: milliseconds
const STRAIGHT_LINE_DURATION_MS: u32 = 2000;

/// Duration of each point of the generated trajectory.
///
/// Units: milliseconds
const STRAIGHT_LINE_POINT_MS: u32 = 10;

/// Extra cycles allowed for the follower to finish beyond the trajectory
/// duration.
const FOLLOW_MARGIN_CYCLES: u64 = 50;

// ---------------------------------------------------------------------------
// FUNCTIONS
// ---------------------------------------------------------------------------

/// Executable main function, entry point.
fn main() -> Result<(), Report> {

    // ---- EARLY INITIALISATION ----

    let session = Session::new(
        "drive_exec",
        "sessions"
    ).wrap_err("Failed to create the session")?;

    logger_init(LevelFilter::Trace, &session)
        .wrap_err("Failed to initialise logging")?;

    info!("Drivetrain Executable\n");
    info!("Session directory: {:?}\n", session.session_root);

    // ---- LOAD PARAMETERS ----

    let drive_params: drive_ctrl::Params = util::params::load("drive_ctrl.toml")
        .wrap_err("Could not load drive_ctrl params")?;
    drive_params.validate()
        .wrap_err("Invalid drive_ctrl params")?;

    let mp_params: mp_mgr::Params = util::params::load("mp_mgr.toml")
        .wrap_err("Could not load mp_mgr params")?;
    mp_params.validate()
        .wrap_err("Invalid mp_mgr params")?;

    info!("Parameters loaded");

    // ---- LOAD TRAJECTORY ----

    let args: Vec<String> = env::args().collect();

    debug!("CLI arguments: {:?}", args);

    let trajectory = match args.len() {
        1 => {
            info!("No trajectory provided, a straight line will be followed");
            straight_line(
                STRAIGHT_LINE_DISTANCE_ROT,
                STRAIGHT_LINE_DURATION_MS,
                STRAIGHT_LINE_POINT_MS
            ).wrap_err("Failed to generate the straight line trajectory")?
        },
        2 => {
            info!("Loading trajectory from \"{}\"", &args[1]);
            let json = std::fs::read_to_string(&args[1])
                .wrap_err("Failed to read the trajectory file")?;
            serde_json::from_str::<Trajectory>(&json)
                .wrap_err("Failed to parse the trajectory file")?
        },
        n => return Err(eyre!(
            "Expected either zero or one argument, found {}", n - 1
        ))
    };

    info!(
        "Trajectory contains {} points and lasts {:.02} s\n",
        trajectory.len(),
        trajectory.duration_ms() as f64 / 1000.0
    );

    // ---- INITIALISE EQUIPMENT ----

    let left_sim = [SimMotor::new(1), SimMotor::new(2)];
    let right_sim = [SimMotor::new(3), SimMotor::new(4)];
    let gyro_sim = SimGyro::new(10);

    let motor = |m: &SimMotor| Motor::new(
        m.clone(),
        drive_params.min_motor_firmware_version,
        drive_params.neutral_deadband
    );

    let left = MotorGroup::new(motor(&left_sim[0]), vec![motor(&left_sim[1])]);
    let right = MotorGroup::new(motor(&right_sim[0]), vec![motor(&right_sim[1])]);
    let gyro = Gyro::new(gyro_sim, drive_params.min_gyro_firmware_version);

    let mut drive = DriveCtrl::new(
        left,
        right,
        gyro,
        CheesyDriveHelper::new(),
        MpFollowerFactory::new(mp_params.clone(), false),
        &drive_params,
        &mp_params
    ).with_shifter(SimShifter::new(true));

    drive.brake();
    drive.zero_encoders();

    if drive.is_ok() {
        info!("Drivetrain OK\n");
    }
    else {
        warn!("Drivetrain is not OK, continuing in a degraded state\n");
    }

    // ---- MAIN LOOP ----

    let period_ms = drive_params.cycle_period_ms;
    let max_follow_cycles = trajectory.duration_ms() / period_ms as u64
        + FOLLOW_MARGIN_CYCLES;

    let run_timer = ElapsedTimer::new();
    let mut rate = ThreadRateControl::new();
    let mut num_cycles: u64 = 0;
    let mut num_follow_cycles: u64 = 0;
    let mut num_overruns: u64 = 0;
    let mut num_underruns: u64 = 0;

    info!("Beginning main loop\n");

    rate.start();

    loop {
        // ---- DRIVE ----

        if num_cycles < MANUAL_PHASE_CYCLES as u64 {
            let high_gear = drive.is_high_gear();
            drive.arcade_drive(
                signed_square(MANUAL_THROTTLE),
                signed_square(MANUAL_TURN),
                high_gear
            );
        }
        else {
            if drive.mode() != DriveMode::ProfileFollowing {
                info!(
                    "Manual phase complete, distance {:.0} sensor units",
                    drive.distance()
                );
                drive.start_mp(&trajectory);
            }

            num_follow_cycles += 1;

            if drive.is_mp_underrun() {
                num_underruns += 1;
            }

            if drive.is_mp_done() {
                info!("Trajectory complete after {} cycles", num_follow_cycles);
                break;
            }

            if num_follow_cycles > max_follow_cycles {
                warn!(
                    "Trajectory not complete after {} cycles, stopping",
                    num_follow_cycles
                );
                break;
            }
        }

        if !drive.is_ok() {
            warn!("Drivetrain health check failed on cycle {}", num_cycles);
        }

        // ---- SIMULATION ----

        for m in left_sim.iter().chain(right_sim.iter()) {
            m.step(period_ms);
        }

        // ---- CYCLE MANAGEMENT ----

        let cycle_dur = rate.thread_rate_control(period_ms);

        if cycle_dur > Duration::from_millis(period_ms as u64) {
            warn!(
                "Cycle overran by {:.06} s",
                cycle_dur.as_secs_f64() - period_ms as f64 / 1000.0
            );
            num_overruns += 1;
        }

        num_cycles += 1;
    }

    drive.stop_mp();
    drive.coast();

    info!(
        "End of execution: {} cycles in {:.02} s, {} overruns, {} underrun cycles, heading {:.02} deg",
        num_cycles,
        run_timer.elapsed_seconds(),
        num_overruns,
        num_underruns,
        drive.gyro().yaw_deg()
    );

    Ok(())
}

/// Generate a straight line trajectory with a triangular velocity profile.
fn straight_line(
    distance_rot: f64,
    duration_ms: u32,
    point_ms: u32
) -> Result<Trajectory, TrajectoryError> {
    let num_points = (duration_ms / point_ms).max(1) as usize;
    let half = num_points as f64 / 2.0;

    // Peak velocity so the area under the triangle is the distance
    let peak_vel = distance_rot / (duration_ms as f64 / 1000.0 / 2.0);

    let mut position = 0.0;
    let rows: Vec<[f64; 4]> = (0..num_points)
        .map(|i| {
            let frac = 1.0 - ((i as f64 + 0.5) - half).abs() / half;
            let velocity = peak_vel * frac;
            position += velocity * point_ms as f64 / 1000.0;

            // Velocity is expressed per 100 ms
            [position, velocity / 10.0, point_ms as f64, 0.0]
        })
        .collect();

    Trajectory::from_rows(&rows, true, false)
}
