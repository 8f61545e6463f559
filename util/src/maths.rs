//! Utility maths functions

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use num_traits::Float;

/// Clamp a value into the range `[min, max]`.
pub fn clamp<T>(value: T, min: T, max: T) -> T
where
    T: Float
{
    if value > max {
        max
    }
    else if value < min {
        min
    }
    else {
        value
    }
}

/// Limit a value into the symmetric range `[-limit, limit]`.
pub fn limit<T>(value: T, limit: T) -> T
where
    T: Float
{
    clamp(value, -limit, limit)
}

/// Return zero if the magnitude of `value` is inside the deadband, otherwise
/// return `value` unchanged.
pub fn handle_deadband<T>(value: T, deadband: T) -> T
where
    T: Float
{
    if value.abs() > deadband.abs() {
        value
    }
    else {
        T::zero()
    }
}

/// Square a value while preserving its sign.
pub fn signed_square<T>(value: T) -> T
where
    T: Float
{
    value * value.abs()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clamp() {
        assert_eq!(clamp(2.0f64, -1.0, 0.5), 0.5);
        assert_eq!(clamp(-2.0f64, -1.0, 0.5), -1.0);
        assert_eq!(clamp(0.25f32, -1.0, 0.5), 0.25);
    }

    #[test]
    fn test_limit() {
        assert_eq!(limit(1.5f64, 1.0), 1.0);
        assert_eq!(limit(-1.5f64, 1.0), -1.0);
        assert_eq!(limit(0.25f64, 1.0), 0.25);
    }

    #[test]
    fn test_handle_deadband() {
        assert_eq!(handle_deadband(0.01f64, 0.02), 0.0);
        assert_eq!(handle_deadband(-0.01f64, 0.02), 0.0);
        assert_eq!(handle_deadband(0.5f64, 0.02), 0.5);
        assert_eq!(handle_deadband(-0.5f64, 0.02), -0.5);
    }

    #[test]
    fn test_signed_square() {
        assert_eq!(signed_square(0.5f64), 0.25);
        assert_eq!(signed_square(-0.5f64), -0.25);
        assert_eq!(signed_square(0f64), 0.0);
    }
}
