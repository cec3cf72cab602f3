//! Per-device protocol state and the consumer-facing snapshot types
//! derived from it.
//!
//! Grounded on `spec.md` §3 and, for the value-type/mutable-state split,
//! on the teacher's `AccelerometerData`/`AccelerometerCalibration` split
//! in `device.rs` (a plain data struct mirrored by a calibration struct
//! that knows how to normalize it).

use crate::wire::extension::{
    ClassicButtons, ClassicRaw, MotionPlusCalibration, MotionPlusRaw, NunchukCalibration,
    NunchukRaw,
};
use crate::wire::input::StatusFlags;

/// `(x, y, z)` triple, used both for raw/calibrated accelerometer samples
/// and for MotionPlus angular velocity.
pub type Vec3 = (f32, f32, f32);

pub const ACCEL_ZERO_DEFAULT: (u16, u16, u16) = (512, 512, 512);
pub const ACCEL_GRAVITY_DEFAULT: (u16, u16, u16) = (576, 576, 576);

/// Converts a raw accelerometer triple to `Vec3` without applying
/// calibration, for the forwarded-raw-sample shape of `MotionSample`.
#[must_use]
pub fn raw_accel_to_vec3(raw: (u16, u16, u16)) -> Vec3 {
    (f32::from(raw.0), f32::from(raw.1), f32::from(raw.2))
}

/// Core accelerometer calibration. Seeded with the documented defaults
/// and never replaced by a per-device EEPROM read (`DESIGN.md`, §3 of
/// `SPEC_FULL.md`).
#[derive(Debug, Clone, Copy)]
pub struct AccelCalibration {
    pub zero: (u16, u16, u16),
    pub gravity: (u16, u16, u16),
}

impl Default for AccelCalibration {
    fn default() -> Self {
        Self {
            zero: ACCEL_ZERO_DEFAULT,
            gravity: ACCEL_GRAVITY_DEFAULT,
        }
    }
}

impl AccelCalibration {
    /// `(raw - zero) / (gravity - zero)`, component-wise.
    #[must_use]
    pub fn apply(&self, raw: (u16, u16, u16)) -> Vec3 {
        let axis = |raw: u16, zero: u16, gravity: u16| {
            (f32::from(raw) - f32::from(zero)) / (f32::from(gravity) - f32::from(zero))
        };
        (
            axis(raw.0, self.zero.0, self.gravity.0),
            axis(raw.1, self.zero.1, self.gravity.1),
            axis(raw.2, self.zero.2, self.gravity.2),
        )
    }
}

/// One tracked IR dot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IrDot {
    pub visible: bool,
    pub raw: (u16, u16),
    pub normalized: (f32, f32),
    pub size: u32,
}

impl IrDot {
    const INVISIBLE: Self = Self {
        visible: false,
        raw: (0, 0),
        normalized: (0.0, 0.0),
        size: 0,
    };
}

impl Default for IrDot {
    fn default() -> Self {
        Self::INVISIBLE
    }
}

/// IR camera reporting mode. The wire format only distinguishes two
/// precision tiers (basic, shared with extension bytes; extended,
/// standalone) — `spec.md` §3's third `Full` tag collapses into
/// `Extended` here, documented in `DESIGN.md`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IrMode {
    #[default]
    Disabled,
    Basic,
    Extended,
}

/// Up to four tracked IR dots plus the pair the consumer should treat as
/// "the" tracked pair (position/distance derived from it).
#[derive(Debug, Clone, Default)]
pub struct IrCamera {
    pub mode: IrMode,
    pub dots: [IrDot; 4],
    pub tracked_pair: Option<(usize, usize)>,
}

impl IrCamera {
    /// Midpoint of the tracked pair, if both are visible.
    #[must_use]
    pub fn middle(&self) -> Option<(f32, f32)> {
        let (a, b) = self.tracked_pair?;
        let (ax, ay) = self.dots[a].normalized;
        let (bx, by) = self.dots[b].normalized;
        Some((0.5 * (ax + bx), 0.5 * (ay + by)))
    }

    /// Distance between the tracked pair, if both are visible.
    #[must_use]
    pub fn distance(&self) -> Option<f32> {
        let (a, b) = self.tracked_pair?;
        let (ax, ay) = self.dots[a].normalized;
        let (bx, by) = self.dots[b].normalized;
        Some(((ax - bx).powi(2) + (ay - by).powi(2)).sqrt())
    }

    /// Replaces the dot set, re-pairing the tracked indices.
    ///
    /// If the previously tracked pair is still fully visible, the pair is
    /// kept. Otherwise re-pairs to the two visible dots whose positions
    /// are closest to the previous pair's positions (smallest total
    /// movement), falling back to the first two visible dots found.
    pub fn update(&mut self, dots: [IrDot; 4]) {
        let previous = self.tracked_pair.map(|(a, b)| (self.dots[a], self.dots[b]));
        self.dots = dots;

        if let Some((a, b)) = self.tracked_pair {
            if self.dots[a].visible && self.dots[b].visible {
                return;
            }
        }

        let visible: Vec<usize> = (0..4).filter(|&i| self.dots[i].visible).collect();
        self.tracked_pair = match (previous, visible.as_slice()) {
            (_, []) | (_, [_]) => None,
            (Some((prev_a, prev_b)), candidates) => Some(best_pair(candidates, &self.dots, prev_a, prev_b)),
            (None, candidates) => Some((candidates[0], candidates[1])),
        };
    }
}

fn distance_sq(a: (f32, f32), b: (f32, f32)) -> f32 {
    (a.0 - b.0).powi(2) + (a.1 - b.1).powi(2)
}

fn best_pair(candidates: &[usize], dots: &[IrDot; 4], prev_a: IrDot, prev_b: IrDot) -> (usize, usize) {
    let mut best = (candidates[0], candidates.get(1).copied().unwrap_or(candidates[0]));
    let mut best_cost = f32::MAX;
    for (i, &ci) in candidates.iter().enumerate() {
        for &cj in &candidates[i + 1..] {
            let direct = distance_sq(dots[ci].normalized, prev_a.normalized)
                + distance_sq(dots[cj].normalized, prev_b.normalized);
            let swapped = distance_sq(dots[ci].normalized, prev_b.normalized)
                + distance_sq(dots[cj].normalized, prev_a.normalized);
            let cost = direct.min(swapped);
            if cost < best_cost {
                best_cost = cost;
                best = (ci, cj);
            }
        }
    }
    best
}

/// Extension state, unified into a single tagged sum per `spec.md` §9
/// design note #1.
#[derive(Debug, Clone)]
pub enum Extension {
    None,
    Nunchuk { calibration: NunchukCalibration, data: NunchukSample },
    Classic { data: ClassicSample },
    MotionPlus { calibration: MotionPlusCalibration, data: MotionPlusSample },
    NunchukPassthrough {
        nunchuk_calibration: NunchukCalibration,
        motion_plus_calibration: MotionPlusCalibration,
        nunchuk: NunchukSample,
        motion_plus: MotionPlusSample,
    },
    ClassicPassthrough {
        motion_plus_calibration: MotionPlusCalibration,
        classic: ClassicSample,
        motion_plus: MotionPlusSample,
    },
}

impl Default for Extension {
    fn default() -> Self {
        Self::None
    }
}

/// Calibrated Nunchuk reading.
#[derive(Debug, Clone, Copy)]
pub struct NunchukSample {
    pub stick: (f32, f32),
    pub accel: Vec3,
    pub c_pressed: bool,
    pub z_pressed: bool,
}

impl NunchukSample {
    #[must_use]
    pub fn from_raw(raw: &NunchukRaw, calibration: &NunchukCalibration) -> Self {
        let (x, y, z) = calibration.accel(raw.accel);
        Self {
            stick: calibration.stick(raw.stick),
            accel: (x, y, z),
            c_pressed: raw.c_pressed,
            z_pressed: raw.z_pressed,
        }
    }
}

/// Calibrated Classic Controller reading.
#[derive(Debug, Clone, Copy)]
pub struct ClassicSample {
    pub left_stick: (f32, f32),
    pub right_stick: (f32, f32),
    pub left_trigger: f32,
    pub right_trigger: f32,
    pub buttons: ClassicButtons,
}

impl ClassicSample {
    #[must_use]
    pub fn from_raw(raw: &ClassicRaw) -> Self {
        use crate::wire::extension::{classic_stick_axis, classic_trigger_axis};
        Self {
            left_stick: (classic_stick_axis(raw.left_stick.0), classic_stick_axis(raw.left_stick.1)),
            right_stick: (classic_stick_axis(raw.right_stick.0), classic_stick_axis(raw.right_stick.1)),
            left_trigger: classic_trigger_axis(raw.left_trigger),
            right_trigger: classic_trigger_axis(raw.right_trigger),
            buttons: raw.buttons,
        }
    }
}

/// Calibrated MotionPlus angular velocity, in degrees/second.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionPlusSample {
    pub yaw: f64,
    pub roll: f64,
    pub pitch: f64,
}

impl MotionPlusSample {
    #[must_use]
    pub fn from_raw(raw: &MotionPlusRaw, calibration: &MotionPlusCalibration) -> Self {
        let (yaw, roll, pitch) = calibration.angular_velocity(raw);
        Self { yaw, roll, pitch }
    }
}

/// Raw accelerometer sample plus the previous one, the shape
/// `spec.md` §3/§1 describes as forwarded to an external motion-fusion
/// consumer (`MotionSample`), with the zero-vectors for unused channels
/// that consumer expects when no gyro/magnetometer data is present.
#[derive(Debug, Clone, Copy, Default)]
pub struct MotionSample {
    pub acceleration: Vec3,
    pub acceleration_prev: Vec3,
    pub gyro: Vec3,
    pub magnetometer: Vec3,
}

impl MotionSample {
    /// `|Δaccel|` between this sample and the previous one (`spec.md`
    /// §3/§4.B: the consumer derives motion fusion from this, not the
    /// engine).
    #[must_use]
    pub fn delta_magnitude(&self) -> f32 {
        let (ax, ay, az) = self.acceleration;
        let (px, py, pz) = self.acceleration_prev;
        ((ax - px).powi(2) + (ay - py).powi(2) + (az - pz).powi(2)).sqrt()
    }
}

/// Full engine-internal mutable state for one device.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub extension_connected: bool,
    pub rumble: bool,
    pub ir: bool,
    pub battery: u8,
    pub buttons: u16,
    pub flags: StatusFlags,
    pub acceleration: Vec3,
    pub acceleration_prev: Vec3,
    pub acceleration_raw: (u16, u16, u16),
    pub acceleration_raw_prev: (u16, u16, u16),
    pub calibration: AccelCalibration,
    pub ir_camera: IrCamera,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            extension_connected: false,
            rumble: false,
            ir: false,
            battery: 0,
            buttons: 0,
            flags: StatusFlags::empty(),
            acceleration: (0.0, 0.0, 0.0),
            acceleration_prev: (0.0, 0.0, 0.0),
            acceleration_raw: ACCEL_ZERO_DEFAULT,
            acceleration_raw_prev: ACCEL_ZERO_DEFAULT,
            calibration: AccelCalibration::default(),
            ir_camera: IrCamera::default(),
        }
    }
}

/// Consumer-facing snapshot: a plain, `Clone`-able copy decoupled from
/// `EngineState` so consumers never observe mid-update tearing
/// (`spec.md` §4.E).
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub buttons: u16,
    pub flags: StatusFlags,
    pub battery: u8,
    pub roll: f32,
    pub motion: MotionSample,
    pub ir_camera: IrCamera,
    pub extension: Extension,
}

impl Snapshot {
    /// `roll = atan2(acc.z, acc.x) - pi/2` (`spec.md` §4.B; computed at
    /// the supervisor level, not inside the engine).
    #[must_use]
    pub fn roll_from_acceleration(acceleration: Vec3) -> f32 {
        acceleration.2.atan2(acceleration.0) - std::f32::consts::FRAC_PI_2
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accel_calibration_zero_point() {
        let calibration = AccelCalibration::default();
        let (x, y, z) = calibration.apply((512, 512, 512));
        assert!((x).abs() < 1e-6);
        assert!((y).abs() < 1e-6);
        assert!((z).abs() < 1e-6);
    }

    #[test]
    fn accel_calibration_full_gravity() {
        let calibration = AccelCalibration::default();
        let (x, _, _) = calibration.apply((576, 512, 512));
        assert!((x - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ir_camera_keeps_pair_when_both_visible() {
        let mut camera = IrCamera::default();
        let mut dots = [IrDot::default(); 4];
        dots[0] = IrDot { visible: true, raw: (0, 0), normalized: (0.0, 0.0), size: 0 };
        dots[1] = IrDot { visible: true, raw: (100, 100), normalized: (0.1, 0.1), size: 0 };
        camera.update(dots);
        assert_eq!(camera.tracked_pair, Some((0, 1)));
        camera.update(dots);
        assert_eq!(camera.tracked_pair, Some((0, 1)));
    }

    #[test]
    fn ir_camera_repairs_on_dropout() {
        let mut camera = IrCamera::default();
        let mut dots = [IrDot::default(); 4];
        dots[0] = IrDot { visible: true, raw: (0, 0), normalized: (0.0, 0.0), size: 0 };
        dots[1] = IrDot { visible: true, raw: (100, 100), normalized: (0.1, 0.1), size: 0 };
        camera.update(dots);

        // Dot 1 drops out; dot 2 appears close to dot 1's old position.
        let mut dots2 = [IrDot::default(); 4];
        dots2[0] = dots[0];
        dots2[2] = IrDot { visible: true, raw: (105, 105), normalized: (0.105, 0.105), size: 0 };
        camera.update(dots2);
        assert_eq!(camera.tracked_pair, Some((0, 2)));
    }

    #[test]
    fn roll_is_zero_when_flat_on_x_axis() {
        let roll = Snapshot::roll_from_acceleration((1.0, 0.0, 0.0));
        assert!((roll - (0.0_f32.atan2(1.0) - std::f32::consts::FRAC_PI_2)).abs() < 1e-6);
    }
}
