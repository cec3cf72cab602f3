/// Normalizes a raw sensor reading against a zero/max calibration pair.
///
/// `value_bits` and `calibration_bits` let the raw reading and the
/// calibration constants use different bit widths (e.g. a 10-bit
/// accelerometer reading against an 8-bit EEPROM calibration byte); the
/// narrower operand is left-shifted up to match the wider one before the
/// subtraction so both sides compare at the same scale.
#[allow(clippy::cast_sign_loss, clippy::cast_possible_wrap)] // Numbers will not be that large
pub fn normalize<TValue, TResult>(
    value: TValue,
    value_bits: usize,
    zero: TValue,
    max: TValue,
    calibration_bits: usize,
) -> TResult
where
    TValue: std::ops::Shl<usize, Output = TValue> + Into<TResult> + Copy,
    TResult: std::ops::Sub<Output = TResult> + std::ops::Div<Output = TResult> + Copy,
{
    let missing_calibration_bits =
        isize::max(0, value_bits as isize - calibration_bits as isize) as usize;
    let missing_value_bits =
        isize::max(0, calibration_bits as isize - value_bits as isize) as usize;

    let value = value << missing_value_bits;
    let zero = zero << missing_calibration_bits;
    let max = max << missing_calibration_bits;

    (Into::<TResult>::into(value) - Into::<TResult>::into(zero))
        / (Into::<TResult>::into(max) - Into::<TResult>::into(zero))
}

/// Remaps `value` from the `[in_min, in_max]` range to `[out_min, out_max]`.
///
/// Used for axes whose calibration is a simple `(min, center, max)` byte
/// triple rather than a zero/gravity pair, e.g. the Nunchuk's analog
/// stick.
#[must_use]
pub fn remap(value: f32, in_min: f32, in_max: f32, out_min: f32, out_max: f32) -> f32 {
    if (in_max - in_min).abs() < f32::EPSILON {
        return out_min;
    }
    out_min + (value - in_min) * (out_max - out_min) / (in_max - in_min)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_same_bit_width() {
        let result: f32 = normalize(512u16, 10, 512, 576, 10);
        assert!((result - 0.0).abs() < 1e-6);
        let result: f32 = normalize(576u16, 10, 512, 576, 10);
        assert!((result - 1.0).abs() < 1e-6);
    }

    #[test]
    fn remap_clamps_degenerate_range() {
        assert!((remap(5.0, 10.0, 10.0, 0.0, 1.0) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn remap_basic() {
        assert!((remap(50.0, 0.0, 100.0, 0.0, 1.0) - 0.5).abs() < 1e-6);
    }
}
