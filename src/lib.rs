// Control runtime for a four-wheeled rover
//
// - sensors: attitude/altitude fusion from accelerometer, magnetometer and barometer
// - motor: wheel kinematics, PWM duty mapping and the four-motor rover
// - runtime: fixed-rate control loop over zenoh with a command watchdog

pub mod config;
pub mod messages;
pub mod motor;
pub mod runtime;
pub mod sensors;
pub mod vector;
