// Sensor side of the rover
//
// Provides:
// - Raw 3-axis sample type shared by accelerometer, magnetometer and gyroscope
// - SensorSource capability trait implemented by hardware adapters
// - LatestSample: a SensorSource fed by IMU samples from the hardware process
// - Orientation/altitude estimation

pub mod orientation;

use serde::{Deserialize, Serialize};

use crate::messages::ImuSample;

pub use orientation::{
    Attitude, Estimate, EstimateError, OrientationError, OrientationEstimator, SEALEVEL_HPA,
};

/// One reading from a 3-axis sensor in physical units
/// (m/s^2 for the accelerometer, uT for the magnetometer, rad/s for the gyroscope)
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawSample3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl RawSample3 {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    /// True when all three axes read exactly zero (no usable reference vector)
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }

    pub fn as_array(&self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl From<[f32; 3]> for RawSample3 {
    fn from(v: [f32; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }
}

/// Error types for reading from a sensor source
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SensorError {
    #[error("No sensor sample received yet")]
    NoSample,
}

pub type Result<T> = std::result::Result<T, SensorError>;

/// Capability interface over the board's sensors.
///
/// Implementations own whatever transport reaches the hardware; the
/// estimation code never touches the bus itself.
pub trait SensorSource {
    /// Acceleration in m/s^2
    fn read_accel(&mut self) -> Result<RawSample3>;

    /// Magnetic field in uT
    fn read_mag(&mut self) -> Result<RawSample3>;

    /// Angular rate in rad/s
    fn read_gyro(&mut self) -> Result<RawSample3>;

    /// Barometric pressure in Pa
    fn read_pressure(&mut self) -> Result<f32>;

    /// Barometer die temperature in degrees C
    fn read_temperature(&mut self) -> Result<f32>;
}

/// Sensor source backed by the most recent IMU sample published by the
/// hardware process. Newer samples replace older ones.
#[derive(Debug, Default)]
pub struct LatestSample {
    sample: Option<ImuSample>,
}

impl LatestSample {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, sample: ImuSample) {
        self.sample = Some(sample);
    }

    pub fn has_sample(&self) -> bool {
        self.sample.is_some()
    }

    fn current(&self) -> Result<&ImuSample> {
        self.sample.as_ref().ok_or(SensorError::NoSample)
    }
}

impl SensorSource for LatestSample {
    fn read_accel(&mut self) -> Result<RawSample3> {
        Ok(RawSample3::from(self.current()?.accel))
    }

    fn read_mag(&mut self) -> Result<RawSample3> {
        Ok(RawSample3::from(self.current()?.mag))
    }

    fn read_gyro(&mut self) -> Result<RawSample3> {
        Ok(RawSample3::from(self.current()?.gyro))
    }

    fn read_pressure(&mut self) -> Result<f32> {
        Ok(self.current()?.pressure_pa)
    }

    fn read_temperature(&mut self) -> Result<f32> {
        Ok(self.current()?.temperature_c)
    }
}
