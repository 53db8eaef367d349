// Motor control module for the four-wheel rover base
//
// Provides:
// - Skid/mecanum inverse kinematics (body velocity -> wheel speeds)
// - 50Hz PWM duty cycle mapping and per-wheel motors
// - High-level rover API

pub mod kinematics;
pub mod pwm;
mod rover;

pub use kinematics::{
    ChassisConfig, Decomposition, DriveCondition, VelocityCommand, WheelId, WheelSpeeds, WheelType,
    decompose,
};
pub use pwm::{ActuatorError, Motor, PwmChannel, VirtualPwm, speed_to_duty_cycle};
pub use rover::Rover;
