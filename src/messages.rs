// Message types exchanged over zenoh (JSON encoded)

use serde::{Deserialize, Serialize};

use crate::motor::pwm::DUTY_ZERO;
use crate::sensors::Estimate;

// Command from teleop/scripts -> runtime
// Velocities are normalized: |x| + |y| + |wheel_to_cog * theta| <= 1 is full speed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseCommand {
    pub x_vel: f32,
    pub y_vel: f32,
    pub theta_vel: f32,
}

/// Raw sample from the sensor board, published by the hardware process
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImuSample {
    /// m/s^2
    pub accel: [f32; 3],
    /// uT
    pub mag: [f32; 3],
    /// rad/s
    pub gyro: [f32; 3],
    pub pressure_pa: f32,
    pub temperature_c: f32,
}

/// What one wheel was last told to do
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct WheelOutput {
    pub speed: f32,
    pub duty_percent: f32,
}

// Actuation output from runtime -> hardware process
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq)]
pub struct WheelActuation {
    pub front_left: WheelOutput,
    pub front_right: WheelOutput,
    pub back_left: WheelOutput,
    pub back_right: WheelOutput,
}

impl WheelActuation {
    /// All four wheels at the stop duty cycle
    pub fn stopped() -> Self {
        let stop = WheelOutput {
            speed: 0.0,
            duty_percent: DUTY_ZERO,
        };
        Self {
            front_left: stop,
            front_right: stop,
            back_left: stop,
            back_right: stop,
        }
    }
}

/// Attitude and altitude published by the runtime (degrees, meters, rad/s)
///
/// Parts that could not be derived from the latest sample are `null`, with the
/// reasons in `conditions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttitudeTelemetry {
    pub pitch: Option<f32>,
    pub roll: Option<f32>,
    pub heading: Option<f32>,
    pub tilt_pitch: Option<f32>,
    pub tilt_roll: Option<f32>,
    pub mag_heading: Option<f32>,
    pub altitude_m: Option<f32>,
    pub gyro: Option<[f32; 3]>,
    pub conditions: Vec<String>,
}

impl From<&Estimate> for AttitudeTelemetry {
    fn from(est: &Estimate) -> Self {
        Self {
            pitch: est.attitude.map(|a| a.pitch),
            roll: est.attitude.map(|a| a.roll),
            heading: est.attitude.map(|a| a.heading),
            tilt_pitch: est.tilt.map(|(pitch, _)| pitch),
            tilt_roll: est.tilt.map(|(_, roll)| roll),
            mag_heading: est.mag_heading,
            altitude_m: est.altitude_m,
            gyro: est.gyro.map(|g| g.as_array()),
            conditions: est.conditions.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Health status published by runtime
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeHealth {
    Ok,
    CmdStale,
    /// Commands are arriving but part of them can't be realized by the chassis
    Degraded,
}
