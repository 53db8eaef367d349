// Four-wheel inverse kinematics for the rover chassis
// Converts a body-frame velocity command (linear x/y, angular) into per-wheel speed
// commands in [-1, 1].

use serde::{Deserialize, Serialize};

use crate::messages::BaseCommand;
use crate::vector::Vec2;

/// Distance from wheel to center of gravity in x plus the distance in y (lumped)
pub const WHEEL_TO_COG: f32 = 1.0;

/// Wheel speed commands are fractions of full speed
pub const MAX_WHEEL_SPEED: f32 = 1.0;

/// Drivetrain fitted to the chassis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum WheelType {
    /// Plain wheels/legs driven as a skid-steer; cannot strafe
    #[serde(rename = "leg")]
    #[value(name = "leg")]
    Skid,
    /// Mecanum wheels; can realize force along x
    Mecanum,
}

impl WheelType {
    /// Whether this drivetrain can realize the x component of a linear command
    pub fn supports_lateral(self) -> bool {
        match self {
            WheelType::Skid => false,
            WheelType::Mecanum => true,
        }
    }
}

/// Fixed chassis geometry and drivetrain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChassisConfig {
    pub wheel_to_cog: f32,
    pub wheel_type: WheelType,
}

impl Default for ChassisConfig {
    fn default() -> Self {
        Self::new(WHEEL_TO_COG, WheelType::Skid)
    }
}

impl ChassisConfig {
    pub fn new(wheel_to_cog: f32, wheel_type: WheelType) -> Self {
        Self {
            wheel_to_cog,
            wheel_type,
        }
    }

    /// Build from the two half-track distances (wheel to center of gravity along each axis)
    pub fn from_half_tracks(longitudinal: f32, lateral: f32, wheel_type: WheelType) -> Self {
        Self::new(longitudinal + lateral, wheel_type)
    }
}

/// Body-frame velocity command. Linear components and angular rate are normalized so
/// that a combined magnitude of 1 is full speed.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct VelocityCommand {
    pub linear: Vec2,
    pub angular: f32,
}

impl VelocityCommand {
    pub fn new(linear: Vec2, angular: f32) -> Self {
        Self { linear, angular }
    }

    pub fn stop() -> Self {
        Self::default()
    }

    pub fn is_finite(&self) -> bool {
        self.linear.is_finite() && self.angular.is_finite()
    }
}

impl From<&BaseCommand> for VelocityCommand {
    fn from(cmd: &BaseCommand) -> Self {
        Self::new(Vec2::new(cmd.x_vel, cmd.y_vel), cmd.theta_vel)
    }
}

/// Wheel positions on the chassis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WheelId {
    FrontLeft = 0,
    FrontRight = 1,
    BackLeft = 2,
    BackRight = 3,
}

impl WheelId {
    pub const ALL: [WheelId; 4] = [
        WheelId::FrontLeft,
        WheelId::FrontRight,
        WheelId::BackLeft,
        WheelId::BackRight,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            WheelId::FrontLeft => "front_left",
            WheelId::FrontRight => "front_right",
            WheelId::BackLeft => "back_left",
            WheelId::BackRight => "back_right",
        }
    }
}

/// Speed commands for the four wheels, each a fraction of full speed
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WheelSpeeds {
    pub front_left: f32,
    pub front_right: f32,
    pub back_left: f32,
    pub back_right: f32,
}

impl WheelSpeeds {
    pub fn new(front_left: f32, front_right: f32, back_left: f32, back_right: f32) -> Self {
        Self {
            front_left,
            front_right,
            back_left,
            back_right,
        }
    }

    pub fn zero() -> Self {
        Self::default()
    }

    /// Returns speeds as array [front_left, front_right, back_left, back_right]
    pub fn as_array(&self) -> [f32; 4] {
        [
            self.front_left,
            self.front_right,
            self.back_left,
            self.back_right,
        ]
    }

    pub fn get(&self, wheel: WheelId) -> f32 {
        self.as_array()[wheel.index()]
    }

    /// Clamp each wheel independently to [-1, 1]
    pub fn clamped(&self) -> Self {
        let [fl, fr, bl, br] = self
            .as_array()
            .map(|s| s.clamp(-MAX_WHEEL_SPEED, MAX_WHEEL_SPEED));
        Self::new(fl, fr, bl, br)
    }
}

/// Conditions under which a command was not realized as requested
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DriveCondition {
    /// The chassis cannot strafe; the x component was dropped
    DegradedCommand { discarded_x: f32 },
    /// The command contained NaN or infinity; the wheels were stopped
    NonFiniteCommand,
}

/// Result of decomposing a command: the wheel speeds plus anything worth warning about
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposition {
    pub speeds: WheelSpeeds,
    pub condition: Option<DriveCondition>,
}

/// Convert a body velocity command to wheel speeds
///
/// # Arguments
/// * `command` - Linear velocity (x, y) and angular velocity, normalized
/// * `config` - Chassis geometry and drivetrain
///
/// # Returns
/// Wheel speeds in [-1, 1] and an optional condition (degraded or rejected command)
pub fn decompose(command: VelocityCommand, config: &ChassisConfig) -> Decomposition {
    if !command.is_finite() {
        return Decomposition {
            speeds: WheelSpeeds::zero(),
            condition: Some(DriveCondition::NonFiniteCommand),
        };
    }

    let mut linear = command.linear;
    let mut angular = command.angular;
    let mut condition = None;

    // Drivetrains that can't strafe ignore x
    if !config.wheel_type.supports_lateral() && linear.x != 0.0 {
        condition = Some(DriveCondition::DegradedCommand {
            discarded_x: linear.x,
        });
        linear.x = 0.0;
    }

    let r = config.wheel_to_cog;

    // Scale the whole command down if any wheel could exceed full speed. Uniform
    // scaling keeps the ratio between translation and rotation.
    let combined = linear.x.abs() + linear.y.abs() + (r * angular).abs();
    if combined > MAX_WHEEL_SPEED {
        linear /= combined;
        angular /= combined;
    }

    let rot = r * angular;
    let speeds = WheelSpeeds {
        front_left: linear.x - linear.y - rot,
        front_right: linear.x + linear.y + rot,
        back_left: linear.x + linear.y - rot,
        back_right: linear.x - linear.y + rot,
    };

    Decomposition {
        speeds: speeds.clamped(),
        condition,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mecanum(r: f32) -> ChassisConfig {
        ChassisConfig::new(r, WheelType::Mecanum)
    }

    fn assert_speeds(actual: WheelSpeeds, expected: [f32; 4]) {
        for (a, e) in actual.as_array().iter().zip(expected.iter()) {
            assert!(
                (a - e).abs() < 1e-5,
                "expected {:?}, got {:?}",
                expected,
                actual
            );
        }
    }

    #[test]
    fn test_zero_velocity() {
        let out = decompose(VelocityCommand::stop(), &ChassisConfig::default());
        assert_eq!(out.speeds, WheelSpeeds::zero());
        assert_eq!(out.condition, None);
    }

    #[test]
    fn test_pure_lateral_mixing() {
        let out = decompose(VelocityCommand::new(Vec2::new(0.0, 1.0), 0.0), &mecanum(1.0));
        assert_speeds(out.speeds, [-1.0, 1.0, 1.0, -1.0]);
        assert_eq!(out.condition, None);
    }

    #[test]
    fn test_rotation_only() {
        // Left wheels one way, right wheels the other
        let out = decompose(VelocityCommand::new(Vec2::ZERO, 0.5), &mecanum(1.0));
        println!("Rotation: {:?}", out.speeds);
        assert_speeds(out.speeds, [-0.5, 0.5, -0.5, 0.5]);
    }

    #[test]
    fn test_saturation_scales_uniformly() {
        // combined = 0.8 + 0.8 + 0.8 = 2.4 > 1
        let out = decompose(VelocityCommand::new(Vec2::new(0.8, 0.8), 0.8), &mecanum(1.0));
        println!("Saturated: {:?}", out.speeds);

        // Raw mix is [-0.8, 2.4, 0.8, 0.8], scaled by 1/2.4
        let raw = [-0.8f32, 2.4, 0.8, 0.8];
        assert_speeds(out.speeds, raw.map(|w| w / 2.4));
        for s in out.speeds.as_array() {
            assert!((-1.0..=1.0).contains(&s));
        }
    }

    #[test]
    fn test_saturation_preserves_direction() {
        let out = decompose(VelocityCommand::new(Vec2::new(0.0, 3.0), 1.0), &mecanum(1.0));
        // y:angular stays 3:1 after scaling by 1/4
        assert_speeds(out.speeds, [-1.0, 1.0, 0.5, -0.5]);
    }

    #[test]
    fn test_below_saturation_untouched() {
        let out = decompose(VelocityCommand::new(Vec2::new(0.2, 0.3), 0.1), &mecanum(1.0));
        assert_speeds(out.speeds, [-0.2, 0.6, 0.4, 0.0]);
    }

    #[test]
    fn test_wheel_to_cog_scales_rotation() {
        let config = mecanum(0.25);
        let out = decompose(VelocityCommand::new(Vec2::ZERO, 2.0), &config);
        assert_speeds(out.speeds, [-0.5, 0.5, -0.5, 0.5]);

        let halves = ChassisConfig::from_half_tracks(0.15, 0.10, WheelType::Mecanum);
        assert!((halves.wheel_to_cog - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_skid_discards_x() {
        let config = ChassisConfig::new(1.0, WheelType::Skid);
        let out = decompose(VelocityCommand::new(Vec2::new(0.5, 0.5), 0.0), &config);

        assert_eq!(
            out.condition,
            Some(DriveCondition::DegradedCommand { discarded_x: 0.5 })
        );
        // Same as a pure y command
        assert_speeds(out.speeds, [-0.5, 0.5, 0.5, -0.5]);
    }

    #[test]
    fn test_skid_without_x_is_not_degraded() {
        let config = ChassisConfig::new(1.0, WheelType::Skid);
        let out = decompose(VelocityCommand::new(Vec2::new(0.0, 0.5), 0.2), &config);
        assert_eq!(out.condition, None);
    }

    #[test]
    fn test_non_finite_command_stops() {
        let out = decompose(VelocityCommand::new(Vec2::new(f32::NAN, 0.0), 0.0), &mecanum(1.0));
        assert_eq!(out.speeds, WheelSpeeds::zero());
        assert_eq!(out.condition, Some(DriveCondition::NonFiniteCommand));

        let out = decompose(VelocityCommand::new(Vec2::ZERO, f32::INFINITY), &mecanum(1.0));
        assert_eq!(out.condition, Some(DriveCondition::NonFiniteCommand));
    }

    #[test]
    fn test_clamped() {
        let speeds = WheelSpeeds::new(1.5, -2.0, 0.3, -0.3).clamped();
        assert_eq!(speeds.as_array(), [1.0, -1.0, 0.3, -0.3]);
        assert_eq!(speeds.get(WheelId::FrontRight), -1.0);
        assert_eq!(speeds.get(WheelId::BackLeft), 0.3);
    }

    #[test]
    fn test_wheel_type_serde() {
        assert_eq!(serde_json::to_string(&WheelType::Skid).unwrap(), "\"leg\"");
        assert_eq!(serde_json::to_string(&WheelType::Mecanum).unwrap(), "\"mecanum\"");
        let parsed: WheelType = serde_json::from_str("\"leg\"").unwrap();
        assert_eq!(parsed, WheelType::Skid);
    }
}
