//! General time utility functions
//!
//! Provides the [`ElapsedTimer`] stopwatch and the [`ThreadRateControl`]
//! scheduler used to give every control cycle a fixed minimum period.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use chrono;
use log::trace;
use std::thread;
use std::time::{Duration, Instant};

// ---------------------------------------------------------------------------
// CONSTANTS
// ---------------------------------------------------------------------------

/// Number of nanoseconds in a second
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// ---------------------------------------------------------------------------
// TRAITS
// ---------------------------------------------------------------------------

/// A one-shot alarm which a thread can block on.
///
/// Implementors own a scarce timing resource. [`ThreadRateControl`] calls
/// [`Alarm::release`] exactly once, when it is dropped.
pub trait Alarm {
    /// Program the alarm to fire at `deadline`.
    fn update_alarm(&mut self, deadline: Instant);

    /// Block the calling thread until the alarm fires.
    ///
    /// Returns immediately if the alarm is not armed or its deadline has
    /// already passed.
    fn wait_for_alarm(&mut self);

    /// Stop the alarm and free the underlying resource.
    fn release(&mut self);
}

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Monotonic stopwatch.
#[derive(Debug, Clone, Copy)]
pub struct ElapsedTimer {
    start: Instant
}

/// An [`Alarm`] backed by the operating system's sleep primitive.
#[derive(Debug, Default)]
pub struct SleepAlarm {
    deadline: Option<Instant>,
    released: bool
}

/// Loop rate controller.
///
/// Call [`ThreadRateControl::start`] once before the loop, then
/// [`ThreadRateControl::thread_rate_control`] at the end of every cycle.
pub struct ThreadRateControl<A: Alarm = SleepAlarm> {
    alarm: A,
    timer: ElapsedTimer
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl ElapsedTimer {
    /// Create a new timer started at the current instant.
    pub fn new() -> Self {
        Self {
            start: Instant::now()
        }
    }

    /// Reset the reference instant to now.
    pub fn start(&mut self) {
        self.start = Instant::now();
    }

    /// Time elapsed since the timer was last started.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Time elapsed since the timer was last started in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed().as_secs_f64()
    }
}

impl Default for ElapsedTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Alarm for SleepAlarm {
    fn update_alarm(&mut self, deadline: Instant) {
        if self.released {
            return;
        }
        self.deadline = Some(deadline);
    }

    fn wait_for_alarm(&mut self) {
        if let Some(deadline) = self.deadline.take() {
            let now = Instant::now();
            if deadline > now {
                thread::sleep(deadline - now);
            }
        }
    }

    fn release(&mut self) {
        self.deadline = None;
        self.released = true;
    }
}

impl ThreadRateControl<SleepAlarm> {
    /// Create a new rate controller using the OS sleep alarm.
    pub fn new() -> Self {
        Self::with_alarm(SleepAlarm::default())
    }
}

impl Default for ThreadRateControl<SleepAlarm> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: Alarm> ThreadRateControl<A> {
    /// Create a new rate controller which owns the given alarm.
    pub fn with_alarm(alarm: A) -> Self {
        Self {
            alarm,
            timer: ElapsedTimer::new()
        }
    }

    /// Start rate control, marking the beginning of the first cycle.
    pub fn start(&mut self) {
        self.timer.start();
    }

    /// Block until at least `min_period_ms` has passed since the previous
    /// cycle boundary, then mark a new cycle boundary.
    ///
    /// If the cycle has already overrun the call returns immediately, no
    /// attempt is made to catch up on later cycles.
    ///
    /// Returns the time the cycle took before any wait.
    pub fn thread_rate_control(&mut self, min_period_ms: u32) -> Duration {
        let cycle_dur = self.timer.elapsed();

        if let Some(remaining) = Duration::from_millis(min_period_ms as u64)
            .checked_sub(cycle_dur)
        {
            if remaining > Duration::from_secs(0) {
                self.alarm.update_alarm(Instant::now() + remaining);
                self.alarm.wait_for_alarm();
            }
        }
        else {
            trace!(
                "Cycle overran {} ms period by {:.06} s",
                min_period_ms,
                cycle_dur.as_secs_f64() - min_period_ms as f64 / 1000.0
            );
        }

        self.timer.start();

        cycle_dur
    }
}

impl<A: Alarm> Drop for ThreadRateControl<A> {
    fn drop(&mut self) {
        self.alarm.release();
    }
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Convert a duration into a number of seconds, or `None` if overflow
pub fn duration_to_seconds(duration: chrono::Duration) -> Option<f64> {
    duration.num_nanoseconds()
        .map(|ns| ns as f64 / NANOS_PER_SECOND as f64)
}

#[cfg(test)]
mod test {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records how the rate controller drives its alarm.
    #[derive(Default)]
    struct AlarmLog {
        updates: u32,
        waits: u32,
        releases: u32
    }

    struct LoggingAlarm(Rc<RefCell<AlarmLog>>);

    impl Alarm for LoggingAlarm {
        fn update_alarm(&mut self, _deadline: Instant) {
            self.0.borrow_mut().updates += 1;
        }

        fn wait_for_alarm(&mut self) {
            self.0.borrow_mut().waits += 1;
        }

        fn release(&mut self) {
            self.0.borrow_mut().releases += 1;
        }
    }

    #[test]
    fn test_elapsed_timer_restart() {
        let mut timer = ElapsedTimer::new();
        thread::sleep(Duration::from_millis(5));
        assert!(timer.elapsed() >= Duration::from_millis(5));

        timer.start();
        assert!(timer.elapsed() < Duration::from_millis(5));
    }

    #[test]
    fn test_short_cycle_is_stretched() {
        let mut trc = ThreadRateControl::new();
        trc.start();

        // Prime one boundary, then time a full cycle
        trc.thread_rate_control(20);
        let boundary = Instant::now();
        thread::sleep(Duration::from_millis(5));
        trc.thread_rate_control(20);

        assert!(boundary.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_overrun_cycle_is_not_stretched() {
        let mut trc = ThreadRateControl::new();
        trc.start();

        let boundary = Instant::now();
        thread::sleep(Duration::from_millis(30));
        let cycle_dur = trc.thread_rate_control(10);

        assert!(cycle_dur >= Duration::from_millis(30));
        // Generous bound, the only wait here is the 30 ms body
        assert!(boundary.elapsed() < Duration::from_millis(60));
    }

    #[test]
    fn test_overrun_does_not_arm_alarm() {
        let log = Rc::new(RefCell::new(AlarmLog::default()));
        let mut trc = ThreadRateControl::with_alarm(LoggingAlarm(log.clone()));
        trc.start();

        thread::sleep(Duration::from_millis(3));
        trc.thread_rate_control(1);
        assert_eq!(log.borrow().updates, 0);
        assert_eq!(log.borrow().waits, 0);

        trc.thread_rate_control(1000);
        assert_eq!(log.borrow().updates, 1);
        assert_eq!(log.borrow().waits, 1);
    }

    #[test]
    fn test_alarm_released_once_on_drop() {
        let log = Rc::new(RefCell::new(AlarmLog::default()));
        {
            let mut trc = ThreadRateControl::with_alarm(LoggingAlarm(log.clone()));
            trc.start();
            trc.thread_rate_control(1);
            trc.thread_rate_control(1);
            assert_eq!(log.borrow().releases, 0);
        }
        assert_eq!(log.borrow().releases, 1);
    }

    #[test]
    fn test_duration_to_seconds() {
        assert_eq!(
            duration_to_seconds(chrono::Duration::milliseconds(1500)),
            Some(1.5)
        );
    }
}
