//! Trajectories produced by an offline trajectory generator

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use thiserror::Error;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A single setpoint of a trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrajPoint {
    /// Distance along the path.
    ///
    /// Units: rotations
    pub position: f64,

    /// Units: rotations per 100 ms
    pub velocity: f64,

    /// Time this point is held for.
    ///
    /// Units: milliseconds
    pub duration_ms: u32,

    /// Units: degrees
    pub heading_deg: f64
}

/// An immutable, non-empty sequence of trajectory points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "TrajectorySpec")]
pub struct Trajectory {
    points: Vec<TrajPoint>,
    forward: bool,
    flipped: bool
}

/// Unvalidated form of a [`Trajectory`], as found in trajectory files.
#[derive(Debug, Clone, Deserialize)]
pub struct TrajectorySpec {
    pub points: Vec<TrajPoint>,

    #[serde(default = "default_forward")]
    pub forward: bool,

    /// Mirror the path left to right.
    #[serde(default)]
    pub flipped: bool
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum TrajectoryError {
    #[error("A trajectory must contain at least one point")]
    Empty,

    #[error("Point {0} of the trajectory contains a non-finite value")]
    NonFinite(usize),

    #[error("Point {0} of the trajectory has a negative duration")]
    NegativeDuration(usize)
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Trajectory {
    pub fn new(
        points: Vec<TrajPoint>,
        forward: bool,
        flipped: bool
    ) -> Result<Self, TrajectoryError> {
        if points.is_empty() {
            return Err(TrajectoryError::Empty);
        }

        for (i, p) in points.iter().enumerate() {
            if !(p.position.is_finite() && p.velocity.is_finite() && p.heading_deg.is_finite()) {
                return Err(TrajectoryError::NonFinite(i));
            }
        }

        Ok(Self {
            points,
            forward,
            flipped
        })
    }

    /// Build a trajectory from generator rows of
    /// `[position, velocity, duration_ms, heading_deg]`.
    ///
    /// The duration is truncated to whole milliseconds.
    pub fn from_rows(
        rows: &[[f64; 4]],
        forward: bool,
        flipped: bool
    ) -> Result<Self, TrajectoryError> {
        for (i, r) in rows.iter().enumerate() {
            if !r[2].is_finite() {
                return Err(TrajectoryError::NonFinite(i));
            }
            if r[2] < 0.0 {
                return Err(TrajectoryError::NegativeDuration(i));
            }
        }

        Self::new(
            rows.iter()
                .map(|r| TrajPoint {
                    position: r[0],
                    velocity: r[1],
                    duration_ms: r[2] as u32,
                    heading_deg: r[3]
                })
                .collect(),
            forward,
            flipped
        )
    }

    pub fn points(&self) -> &[TrajPoint] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false, trajectories are never empty.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// True if the path is driven forwards.
    pub fn is_forward(&self) -> bool {
        self.forward
    }

    /// True if the path is mirrored left to right.
    pub fn is_flipped(&self) -> bool {
        self.flipped
    }

    /// Total duration of the trajectory in milliseconds.
    pub fn duration_ms(&self) -> u64 {
        self.points.iter().map(|p| p.duration_ms as u64).sum()
    }
}

impl TryFrom<TrajectorySpec> for Trajectory {
    type Error = TrajectoryError;

    fn try_from(spec: TrajectorySpec) -> Result<Self, Self::Error> {
        Self::new(spec.points, spec.forward, spec.flipped)
    }
}

fn default_forward() -> bool {
    true
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_rejected() {
        assert_eq!(
            Trajectory::new(Vec::new(), true, false),
            Err(TrajectoryError::Empty)
        );
    }

    #[test]
    fn test_non_finite_rejected() {
        let rows = [
            [0.0, 0.0, 10.0, 0.0],
            [1.0, std::f64::NAN, 10.0, 0.0]
        ];
        assert_eq!(
            Trajectory::from_rows(&rows, true, false),
            Err(TrajectoryError::NonFinite(1))
        );

        let rows = [[0.0, 0.0, std::f64::INFINITY, 0.0]];
        assert_eq!(
            Trajectory::from_rows(&rows, true, false),
            Err(TrajectoryError::NonFinite(0))
        );
    }

    #[test]
    fn test_negative_duration_rejected() {
        let rows = [
            [0.0, 0.0, 10.0, 0.0],
            [0.5, 1.0, 10.0, 0.0],
            [1.0, 0.0, -10.0, 0.0]
        ];
        assert_eq!(
            Trajectory::from_rows(&rows, true, false),
            Err(TrajectoryError::NegativeDuration(2))
        );

        // Sub-millisecond negatives would otherwise truncate to zero
        let rows = [[0.0, 0.0, -0.5, 0.0]];
        assert_eq!(
            Trajectory::from_rows(&rows, true, false),
            Err(TrajectoryError::NegativeDuration(0))
        );
    }

    #[test]
    fn test_from_rows() {
        let rows = [
            [0.0, 0.5, 10.0, 0.0],
            [0.1, 1.0, 10.9, 2.5]
        ];
        let traj = Trajectory::from_rows(&rows, false, true).unwrap();

        assert_eq!(traj.len(), 2);
        assert!(!traj.is_forward());
        assert!(traj.is_flipped());
        assert_eq!(traj.points()[1].duration_ms, 10);
        assert_eq!(traj.points()[1].heading_deg, 2.5);
        assert_eq!(traj.duration_ms(), 20);
    }

    #[test]
    fn test_deserialise() {
        let traj: Trajectory = serde_json::from_str(r#"{
            "points": [
                {"position": 0.0, "velocity": 0.0, "duration_ms": 10, "heading_deg": 0.0},
                {"position": 0.2, "velocity": 2.0, "duration_ms": 10, "heading_deg": 1.0}
            ],
            "flipped": true
        }"#).unwrap();

        assert!(traj.is_forward());
        assert!(traj.is_flipped());
        assert_eq!(traj.len(), 2);

        let empty = serde_json::from_str::<Trajectory>(r#"{"points": []}"#);
        assert!(empty.is_err());
    }
}
