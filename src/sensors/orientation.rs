// Attitude and altitude estimation for the 10-DOF sensor board
//
// Pitch/roll come from the gravity vector seen by the accelerometer, heading from the
// magnetometer, altitude from the barometer. Everything here is closed-form trig on the
// latest sample; nothing is filtered or integrated over time.

use std::f32::consts::{FRAC_PI_2, PI};
use tracing::debug;

use super::{RawSample3, SensorError, SensorSource};

/// Average sea level pressure in hPa
pub const SEALEVEL_HPA: f32 = 1013.25;

/// International barometric formula exponent
const BAROMETRIC_EXPONENT: f32 = 0.190223;

/// Standard temperature lapse rate in K/m
const LAPSE_RATE: f32 = 0.0065;

const CELSIUS_TO_KELVIN: f32 = 273.15;

const PA_PER_HPA: f32 = 100.0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OrientationError {
    #[error("Degenerate {sensor} input: all axes read zero")]
    DegenerateInput { sensor: &'static str },

    #[error("Invalid pressure {0} hPa (must be positive)")]
    InvalidPressure(f32),
}

pub type Result<T> = std::result::Result<T, OrientationError>;

/// A condition that left part of an estimate unavailable
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum EstimateError {
    #[error("Sensor error: {0}")]
    Sensor(#[from] SensorError),

    #[error("Orientation error: {0}")]
    Orientation(#[from] OrientationError),
}

/// Pitch, roll and heading in degrees
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Attitude {
    pub pitch: f32,
    pub roll: f32,
    pub heading: f32,
}

fn require_nonzero(sample: &RawSample3, sensor: &'static str) -> Result<()> {
    if sample.is_zero() {
        Err(OrientationError::DegenerateInput { sensor })
    } else {
        Ok(())
    }
}

/// Pitch and roll in degrees from the accelerometer alone
///
/// Pitch uses the two-axis form `-atan2(y, sqrt(x^2 + z^2))`. Roll is
/// `atan2(x, sign(z) * sqrt(y^2 + z^2))`, folded back into [-90, 90] when the board is
/// upside down.
///
/// # Returns
/// `(pitch, roll)` in degrees
pub fn accel_orientation(accel: &RawSample3) -> Result<(f32, f32)> {
    require_nonzero(accel, "accelerometer")?;

    let RawSample3 { x, y, z } = *accel;
    let sign_of_z = if z > 0.0 { 1.0 } else { -1.0 };

    let pitch = -y.atan2((x * x + z * z).sqrt());
    let roll = fold_half_turn(x.atan2(sign_of_z * (y * y + z * z).sqrt()));

    Ok((pitch.to_degrees(), roll.to_degrees()))
}

/// Map an angle in (-180, 180] degrees onto [-90, 90] by adding or removing a half turn
fn fold_half_turn(angle: f32) -> f32 {
    if angle > FRAC_PI_2 {
        angle - PI
    } else if angle < -FRAC_PI_2 {
        angle + PI
    } else {
        angle
    }
}

/// Heading in degrees from magnetic north, uncompensated (only valid when level)
pub fn mag_heading(mag: &RawSample3) -> Result<f32> {
    require_nonzero(mag, "magnetometer")?;
    Ok(mag.y.atan2(mag.x).to_degrees())
}

/// Tilt-compensated compass: fuses accelerometer and magnetometer into pitch, roll
/// and heading (degrees)
///
/// Pitch here is the single-axis form `-atan2(y, z)`, which differs from
/// [`accel_orientation`]. Both are kept.
pub fn fused_orientation(accel: &RawSample3, mag: &RawSample3) -> Result<Attitude> {
    require_nonzero(accel, "accelerometer")?;
    require_nonzero(mag, "magnetometer")?;

    // Pitch from accel only
    let pitch = -accel.y.atan2(accel.z);
    let (sin_p, cos_p) = (-pitch).sin_cos();

    // Roll from pitch and accel. The denominator vanishes when gravity lies along x.
    let denom = accel.y * sin_p + accel.z * cos_p;
    let roll = if denom == 0.0 {
        if accel.x > 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 }
    } else {
        (-accel.x / denom).atan()
    };
    let (sin_r, cos_r) = roll.sin_cos();

    let heading = (mag.z * sin_p - mag.y * cos_p)
        .atan2(mag.x * cos_r + mag.y * sin_r * sin_p + mag.z * sin_r * cos_p);

    Ok(Attitude {
        pitch: pitch.to_degrees(),
        roll: roll.to_degrees(),
        heading: heading.to_degrees(),
    })
}

/// Approximate altitude above sea level in meters
///
/// # Arguments
/// * `pressure` - Barometric pressure in hPa
/// * `temperature` - Air temperature in degrees C
pub fn altitude(pressure: f32, temperature: f32) -> Result<f32> {
    altitude_with_reference(SEALEVEL_HPA, pressure, temperature)
}

/// Altitude relative to a custom sea level reference (hPa)
pub fn altitude_with_reference(sea_level_hpa: f32, pressure: f32, temperature: f32) -> Result<f32> {
    if pressure <= 0.0 || !pressure.is_finite() {
        return Err(OrientationError::InvalidPressure(pressure));
    }

    Ok(((sea_level_hpa / pressure).powf(BAROMETRIC_EXPONENT) - 1.0)
        * (temperature + CELSIUS_TO_KELVIN)
        / LAPSE_RATE)
}

/// Everything derived from one sensor poll.
///
/// Each part is computed on its own, so a bad magnetometer still leaves tilt and
/// altitude available. Parts that could not be computed are `None` and the reason
/// is listed in `conditions`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Estimate {
    /// Tilt-compensated attitude
    pub attitude: Option<Attitude>,
    /// Accelerometer-only `(pitch, roll)` (two-axis pitch form)
    pub tilt: Option<(f32, f32)>,
    /// Uncompensated magnetometer heading
    pub mag_heading: Option<f32>,
    pub altitude_m: Option<f32>,
    /// Angular rate passthrough in rad/s
    pub gyro: Option<RawSample3>,
    pub conditions: Vec<EstimateError>,
}

impl Estimate {
    /// True when nothing at all could be derived
    pub fn is_empty(&self) -> bool {
        self.attitude.is_none()
            && self.tilt.is_none()
            && self.mag_heading.is_none()
            && self.altitude_m.is_none()
            && self.gyro.is_none()
    }

    pub fn is_complete(&self) -> bool {
        self.conditions.is_empty()
    }
}

/// Keep the value, or note why it is missing
fn record<T, E: Into<EstimateError>>(
    conditions: &mut Vec<EstimateError>,
    result: std::result::Result<T, E>,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            conditions.push(e.into());
            None
        }
    }
}

/// Estimator bound to a sea level pressure reference
#[derive(Debug, Clone, Copy)]
pub struct OrientationEstimator {
    sea_level_hpa: f32,
}

impl Default for OrientationEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl OrientationEstimator {
    pub fn new() -> Self {
        Self::with_sea_level(SEALEVEL_HPA)
    }

    /// Use a local sea level pressure (QNH) instead of the standard atmosphere
    pub fn with_sea_level(sea_level_hpa: f32) -> Self {
        Self { sea_level_hpa }
    }

    pub fn sea_level_hpa(&self) -> f32 {
        self.sea_level_hpa
    }

    /// Altitude from a pressure in hPa
    pub fn altitude(&self, pressure: f32, temperature: f32) -> Result<f32> {
        altitude_with_reference(self.sea_level_hpa, pressure, temperature)
    }

    /// Poll every sensor once and derive whatever the readings allow.
    ///
    /// Accel and mag are read back to back so the fused heading uses a matched pair.
    /// A failed read or unusable reading only drops the parts that depend on it.
    pub fn estimate<S: SensorSource>(&self, source: &mut S) -> Estimate {
        let mut conditions = Vec::new();

        let accel = record(&mut conditions, source.read_accel());
        let mag = record(&mut conditions, source.read_mag());
        let gyro = record(&mut conditions, source.read_gyro());
        let pressure_pa = record(&mut conditions, source.read_pressure());
        let temperature = record(&mut conditions, source.read_temperature());

        let tilt = accel.and_then(|a| record(&mut conditions, accel_orientation(&a)));
        let heading = mag.and_then(|m| record(&mut conditions, mag_heading(&m)));

        // Both inputs were already checked above; don't report them twice
        let attitude = match (accel, mag) {
            (Some(a), Some(m)) if tilt.is_some() && heading.is_some() => {
                record(&mut conditions, fused_orientation(&a, &m))
            }
            _ => None,
        };

        let altitude_m = match (pressure_pa, temperature) {
            (Some(p), Some(t)) => record(&mut conditions, self.altitude(p / PA_PER_HPA, t)),
            _ => None,
        };

        debug!(
            "Estimate: attitude={:?} tilt={:?} alt={:?} conditions={}",
            attitude,
            tilt,
            altitude_m,
            conditions.len()
        );

        Estimate {
            attitude,
            tilt,
            mag_heading: heading,
            altitude_m,
            gyro,
            conditions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sensors::Result as SensorResult;

    const G: f32 = 9.80665;

    fn close(a: f32, b: f32, tol: f32) -> bool {
        (a - b).abs() <= tol
    }

    #[test]
    fn test_accel_orientation_level() {
        let (pitch, roll) = accel_orientation(&RawSample3::new(0.0, 0.0, G)).unwrap();
        assert!(close(pitch, 0.0, 1e-4));
        assert!(close(roll, 0.0, 1e-4));
    }

    #[test]
    fn test_accel_orientation_tilted() {
        // Gravity split evenly between y and z: 45 degrees nose down
        let (pitch, roll) = accel_orientation(&RawSample3::new(0.0, 1.0, 1.0)).unwrap();
        assert!(close(pitch, -45.0, 1e-3), "pitch = {}", pitch);
        assert!(close(roll, 0.0, 1e-3));

        // Gravity split between x and z: 45 degrees roll
        let (pitch, roll) = accel_orientation(&RawSample3::new(1.0, 0.0, 1.0)).unwrap();
        assert!(close(pitch, 0.0, 1e-3));
        assert!(close(roll, 45.0, 1e-3), "roll = {}", roll);
    }

    #[test]
    fn test_accel_orientation_range() {
        // Sweep samples with z != 0, including upside down
        let values = [-9.8, -3.0, -0.5, 0.0, 0.5, 3.0, 9.8];
        for &x in &values {
            for &y in &values {
                for &z in &[-9.8f32, -1.0, -0.01, 0.01, 1.0, 9.8] {
                    let (pitch, roll) = accel_orientation(&RawSample3::new(x, y, z)).unwrap();
                    assert!(
                        (-90.0..=90.0).contains(&pitch),
                        "pitch {} out of range for ({}, {}, {})",
                        pitch,
                        x,
                        y,
                        z
                    );
                    assert!(
                        (-90.0..=90.0).contains(&roll),
                        "roll {} out of range for ({}, {}, {})",
                        roll,
                        x,
                        y,
                        z
                    );
                }
            }
        }
    }

    #[test]
    fn test_accel_orientation_gravity_along_x() {
        // y = z = 0: roll takes the side of x
        let (_, roll) = accel_orientation(&RawSample3::new(G, 0.0, 0.0)).unwrap();
        assert!(close(roll, 90.0, 1e-4), "roll = {}", roll);

        let (_, roll) = accel_orientation(&RawSample3::new(-G, 0.0, 0.0)).unwrap();
        assert!(close(roll, -90.0, 1e-4), "roll = {}", roll);
    }

    #[test]
    fn test_accel_orientation_upside_down_folds() {
        // Upside down and rolled 45 degrees
        let (_, roll) = accel_orientation(&RawSample3::new(1.0, 0.0, -1.0)).unwrap();
        assert!(close(roll, -45.0, 1e-3), "roll = {}", roll);

        let (_, roll) = accel_orientation(&RawSample3::new(0.0, 0.0, -G)).unwrap();
        assert!(close(roll, 0.0, 1e-4), "roll = {}", roll);
    }

    #[test]
    fn test_zero_vectors_are_degenerate() {
        let zero = RawSample3::default();
        let mag = RawSample3::new(20.0, 0.0, -40.0);

        assert_eq!(
            accel_orientation(&zero),
            Err(OrientationError::DegenerateInput {
                sensor: "accelerometer"
            })
        );
        assert!(mag_heading(&zero).is_err());
        assert!(fused_orientation(&zero, &mag).is_err());
        assert!(fused_orientation(&RawSample3::new(0.0, 0.0, G), &zero).is_err());
    }

    #[test]
    fn test_mag_heading() {
        assert!(close(mag_heading(&RawSample3::new(20.0, 0.0, -40.0)).unwrap(), 0.0, 1e-4));
        assert!(close(mag_heading(&RawSample3::new(0.0, 20.0, -40.0)).unwrap(), 90.0, 1e-4));
        assert!(close(mag_heading(&RawSample3::new(-20.0, 0.0, 0.0)).unwrap(), 180.0, 1e-4));
    }

    #[test]
    fn test_fused_orientation_level() {
        let accel = RawSample3::new(0.0, 0.0, G);

        let att = fused_orientation(&accel, &RawSample3::new(20.0, 0.0, -40.0)).unwrap();
        assert!(close(att.pitch, 0.0, 1e-4));
        assert!(close(att.roll, 0.0, 1e-4));
        assert!(close(att.heading, 0.0, 1e-4));

        // Level board: the fused heading is atan2(-y, x)
        let att = fused_orientation(&accel, &RawSample3::new(0.0, 20.0, -40.0)).unwrap();
        assert!(close(att.heading, -90.0, 1e-3), "heading = {}", att.heading);
    }

    #[test]
    fn test_fused_orientation_roll_singularity() {
        // Gravity entirely along x: y and z are zero, so the roll denominator is exactly zero
        let mag = RawSample3::new(20.0, 5.0, -40.0);

        let att = fused_orientation(&RawSample3::new(G, 0.0, 0.0), &mag).unwrap();
        assert!(close(att.roll, 90.0, 1e-4), "roll = {}", att.roll);
        assert!(att.heading.is_finite());

        let att = fused_orientation(&RawSample3::new(-G, 0.0, 0.0), &mag).unwrap();
        assert!(close(att.roll, -90.0, 1e-4), "roll = {}", att.roll);
        assert!(att.heading.is_finite());
    }

    #[test]
    fn test_fused_orientation_pitch_differs_from_tilt_pitch() {
        // Pitched and rolled at once: the single-axis and two-axis pitches diverge
        let accel = RawSample3::new(3.0, 4.0, 8.0);
        let mag = RawSample3::new(20.0, 0.0, -40.0);

        let att = fused_orientation(&accel, &mag).unwrap();
        let (tilt_pitch, _) = accel_orientation(&accel).unwrap();

        let expected_fused = -(4.0f32.atan2(8.0)).to_degrees();
        let expected_tilt = -(4.0f32.atan2((9.0f32 + 64.0).sqrt())).to_degrees();
        assert!(close(att.pitch, expected_fused, 1e-3));
        assert!(close(tilt_pitch, expected_tilt, 1e-3));
        assert!((att.pitch - tilt_pitch).abs() > 1.0);
    }

    #[test]
    fn test_altitude_sea_level() {
        let alt = altitude(1013.25, 15.0).unwrap();
        assert!(close(alt, 0.0, 1e-3), "alt = {}", alt);
    }

    #[test]
    fn test_altitude_lower_pressure_is_higher() {
        let alt = altitude(900.0, 15.0).unwrap();
        println!("900 hPa at 15 C: {} m", alt);
        assert!(alt > 1000.0 && alt < 1020.0);

        // Above the reference pressure the altitude is negative
        assert!(altitude(1030.0, 15.0).unwrap() < 0.0);
    }

    #[test]
    fn test_altitude_invalid_pressure() {
        assert_eq!(altitude(0.0, 15.0), Err(OrientationError::InvalidPressure(0.0)));
        assert!(altitude(-10.0, 15.0).is_err());
        assert!(altitude(f32::NAN, 15.0).is_err());
    }

    #[test]
    fn test_estimator_custom_reference() {
        let estimator = OrientationEstimator::with_sea_level(1020.0);
        assert_eq!(estimator.sea_level_hpa(), 1020.0);
        assert!(close(estimator.altitude(1020.0, 10.0).unwrap(), 0.0, 1e-3));
    }

    struct FixedSource {
        accel: RawSample3,
        mag: RawSample3,
        pressure_pa: f32,
    }

    impl FixedSource {
        fn level() -> Self {
            Self {
                accel: RawSample3::new(0.0, 0.0, G),
                mag: RawSample3::new(0.0, 20.0, -40.0),
                pressure_pa: 101_325.0,
            }
        }
    }

    impl SensorSource for FixedSource {
        fn read_accel(&mut self) -> SensorResult<RawSample3> {
            Ok(self.accel)
        }
        fn read_mag(&mut self) -> SensorResult<RawSample3> {
            Ok(self.mag)
        }
        fn read_gyro(&mut self) -> SensorResult<RawSample3> {
            Ok(RawSample3::new(0.0, 0.0, 0.5))
        }
        fn read_pressure(&mut self) -> SensorResult<f32> {
            Ok(self.pressure_pa)
        }
        fn read_temperature(&mut self) -> SensorResult<f32> {
            Ok(15.0)
        }
    }

    #[test]
    fn test_estimate_from_source() {
        let est = OrientationEstimator::new().estimate(&mut FixedSource::level());
        assert!(est.is_complete());

        let attitude = est.attitude.unwrap();
        assert!(close(attitude.pitch, 0.0, 1e-4));
        assert!(close(attitude.heading, -90.0, 1e-3));
        assert!(close(est.mag_heading.unwrap(), 90.0, 1e-3));
        let alt = est.altitude_m.unwrap();
        assert!(close(alt, 0.0, 1e-2), "alt = {}", alt);
        assert_eq!(est.gyro.unwrap().z, 0.5);
    }

    #[test]
    fn test_estimate_zero_mag_keeps_tilt_and_altitude() {
        let mut source = FixedSource {
            mag: RawSample3::default(),
            ..FixedSource::level()
        };
        let est = OrientationEstimator::new().estimate(&mut source);

        assert_eq!(est.attitude, None);
        assert_eq!(est.mag_heading, None);
        assert_eq!(
            est.conditions,
            vec![EstimateError::Orientation(OrientationError::DegenerateInput {
                sensor: "magnetometer"
            })]
        );

        let (pitch, roll) = est.tilt.unwrap();
        assert!(close(pitch, 0.0, 1e-4));
        assert!(close(roll, 0.0, 1e-4));
        assert!(close(est.altitude_m.unwrap(), 0.0, 1e-2));
        assert!(!est.is_empty());
    }

    #[test]
    fn test_estimate_bad_pressure_keeps_attitude() {
        let mut source = FixedSource {
            pressure_pa: 0.0,
            ..FixedSource::level()
        };
        let est = OrientationEstimator::new().estimate(&mut source);

        assert!(est.attitude.is_some());
        assert!(est.tilt.is_some());
        assert_eq!(est.altitude_m, None);
        assert_eq!(
            est.conditions,
            vec![EstimateError::Orientation(OrientationError::InvalidPressure(0.0))]
        );
    }

    #[test]
    fn test_estimate_zero_accel_keeps_heading() {
        let mut source = FixedSource {
            accel: RawSample3::default(),
            ..FixedSource::level()
        };
        let est = OrientationEstimator::new().estimate(&mut source);

        assert_eq!(est.attitude, None);
        assert_eq!(est.tilt, None);
        assert!(close(est.mag_heading.unwrap(), 90.0, 1e-3));
        assert!(est.altitude_m.is_some());
        assert_eq!(est.conditions.len(), 1);
    }

    #[test]
    fn test_estimate_without_sample_is_empty() {
        let est = OrientationEstimator::new().estimate(&mut crate::sensors::LatestSample::new());
        assert!(est.is_empty());
        assert!(
            est.conditions
                .iter()
                .all(|c| *c == EstimateError::Sensor(SensorError::NoSample))
        );
        assert_eq!(est.conditions.len(), 5);
    }
}
