//! Parameters structure for the motion profile manager

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use serde::Deserialize;
use thiserror::Error;

// Internal
use crate::eqpt::{SlotGains, NUM_GAIN_SLOTS};

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// Parameters for the motion profile manager and the sensor fusion it relies
/// on.
#[derive(Debug, Clone, Deserialize)]
pub struct Params {

    // ---- UNIT CONVERSIONS ----

    /// Encoder units in one unit of trajectory position.
    ///
    /// Units: sensor units / rotation
    pub encoder_units_per_rotation: f64,

    /// Heading sensor turn units in one degree.
    ///
    /// Units: turn units / degree
    pub turn_units_per_degree: f64,

    // ---- CLOSED LOOP ----

    /// Gain slot used by the primary (position) loop.
    pub primary_slot: u8,

    /// Gain slot used by the auxiliary (heading) loop.
    pub aux_slot: u8,

    /// Gains of the primary (position) loop.
    pub primary_gains: SlotGains,

    /// Gains of the auxiliary (heading) loop.
    pub aux_gains: SlotGains,

    // ---- EXECUTION ----

    /// Period of the feedback and target status frames used by the closed
    /// loop.
    ///
    /// Units: milliseconds
    pub status_frame_period_ms: u8,

    /// Number of points which must be buffered in the controller before it
    /// starts executing a profile.
    pub min_buffered_points: u32,

    /// Value written to the position counter when a profile starts. Must not
    /// be zero.
    ///
    /// Units: sensor units
    pub start_position_seed: f64
}

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, Error, PartialEq)]
pub enum ParamsError {
    #[error("Unit conversion {0} must be positive and finite")]
    InvalidConversion(&'static str),

    #[error("Gain slot {0} is out of range")]
    SlotOutOfRange(u8),

    #[error("The primary and auxiliary loops must use different gain slots (both {0})")]
    SharedSlot(u8),

    #[error("At least one point must be buffered before a profile starts")]
    NoBufferedPoints,

    #[error("The start position seed must be non-zero")]
    ZeroPositionSeed
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl Params {

    /// Determines if the parameters are valid.
    pub fn validate(&self) -> Result<(), ParamsError> {
        let conversions = [
            ("encoder_units_per_rotation", self.encoder_units_per_rotation),
            ("turn_units_per_degree", self.turn_units_per_degree)
        ];
        for (name, value) in conversions.iter() {
            if !value.is_finite() || *value <= 0.0 {
                return Err(ParamsError::InvalidConversion(name));
            }
        }

        for slot in [self.primary_slot, self.aux_slot].iter() {
            if *slot >= NUM_GAIN_SLOTS {
                return Err(ParamsError::SlotOutOfRange(*slot));
            }
        }

        if self.primary_slot == self.aux_slot {
            return Err(ParamsError::SharedSlot(self.primary_slot));
        }

        if self.min_buffered_points == 0 {
            return Err(ParamsError::NoBufferedPoints);
        }

        if self.start_position_seed == 0.0 {
            return Err(ParamsError::ZeroPositionSeed);
        }

        Ok(())
    }
}

/// Parameters used by tests across the crate.
#[cfg(test)]
pub(crate) fn test_params() -> Params {
    Params {
        encoder_units_per_rotation: 4096.0,
        turn_units_per_degree: 3600.0 / 360.0,
        primary_slot: 0,
        aux_slot: 1,
        primary_gains: SlotGains {
            k_f: 0.2,
            k_p: 1.5,
            k_i: 0.0,
            k_d: 15.0,
            integral_zone: 400.0,
            peak_output: 1.0
        },
        aux_gains: SlotGains {
            k_f: 0.0,
            k_p: 2.0,
            k_i: 0.001,
            k_d: 4.0,
            integral_zone: 400.0,
            peak_output: 1.0
        },
        status_frame_period_ms: 5,
        min_buffered_points: 20,
        start_position_seed: 100.0
    }
}
