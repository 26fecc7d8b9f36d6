//! Numeric conversion helpers centralizing safe numeric casts.

use num_traits::cast::cast;

/// Round a f64 and clamp it to the u64 range, returning 0 for NaN or negative values.
#[must_use]
pub fn round_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    let clamped = value.min(max).round();
    cast::<f64, u64>(clamped).unwrap_or(u64::MAX)
}

/// Floor a f64 and clamp it to the u64 range, returning 0 for NaN or negative values.
#[must_use]
pub fn floor_f64_to_u64(value: f64) -> u64 {
    if value.is_nan() || value <= 0.0 {
        return 0;
    }
    let max = cast::<u64, f64>(u64::MAX).unwrap_or(f64::MAX);
    let clamped = value.min(max).floor();
    cast::<f64, u64>(clamped).unwrap_or(u64::MAX)
}

/// Convert u64 to f64 while allowing precision loss in a single location.
#[must_use]
pub fn u64_to_f64(value: u64) -> f64 {
    cast::<u64, f64>(value).unwrap_or(0.0)
}

/// Convert a count to f64, used for averaging over collections.
#[must_use]
pub fn usize_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}
