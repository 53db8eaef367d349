// Four-wheel rover drive
//
// Combines the chassis kinematics with one PWM motor per wheel to provide a simple API
// for driving the base.

use std::mem::discriminant;
use tracing::{debug, info, warn};

use super::kinematics::{
    ChassisConfig, Decomposition, DriveCondition, VelocityCommand, WheelId, WheelSpeeds, decompose,
};
use super::pwm::{Motor, PwmChannel, Result};
use crate::messages::{WheelActuation, WheelOutput};

/// Four wheel motors driven from body velocity commands
pub struct Rover<P: PwmChannel> {
    motors: [Motor<P>; 4], // indexed by WheelId
    chassis: ChassisConfig,
    last_condition: Option<DriveCondition>,
}

impl<P: PwmChannel> Rover<P> {
    /// Create from already started motors, ordered
    /// [front_left, front_right, back_left, back_right]
    pub fn new(chassis: ChassisConfig, motors: [Motor<P>; 4]) -> Self {
        info!(
            "Rover ready: {:?} wheels, wheel_to_cog={}",
            chassis.wheel_type, chassis.wheel_to_cog
        );
        Self {
            motors,
            chassis,
            last_condition: None,
        }
    }

    /// Start a motor on each channel. Channels and inversion flags are ordered
    /// [front_left, front_right, back_left, back_right].
    pub fn with_channels(chassis: ChassisConfig, channels: [P; 4], invert: [bool; 4]) -> Result<Self> {
        let [fl, fr, bl, br] = channels;
        let motors = [
            Motor::new(fl, invert[WheelId::FrontLeft.index()])?,
            Motor::new(fr, invert[WheelId::FrontRight.index()])?,
            Motor::new(bl, invert[WheelId::BackLeft.index()])?,
            Motor::new(br, invert[WheelId::BackRight.index()])?,
        ];
        Ok(Self::new(chassis, motors))
    }

    /// Send a body velocity command to the wheels
    ///
    /// Returns the decomposition so callers can see whether the command was degraded.
    pub fn set_velocities(&mut self, command: VelocityCommand) -> Result<Decomposition> {
        let out = decompose(command, &self.chassis);
        self.report_condition(out.condition);
        self.set_wheel_speeds(out.speeds)?;
        Ok(out)
    }

    /// Warn when a condition first appears rather than on every tick
    fn report_condition(&mut self, condition: Option<DriveCondition>) {
        let changed = match (&self.last_condition, &condition) {
            (None, None) => false,
            (Some(a), Some(b)) => discriminant(a) != discriminant(b),
            _ => true,
        };

        if changed {
            match condition {
                Some(DriveCondition::DegradedCommand { discarded_x }) => warn!(
                    "{:?} wheels cannot move along x, ignoring x component ({})",
                    self.chassis.wheel_type, discarded_x
                ),
                Some(DriveCondition::NonFiniteCommand) => {
                    warn!("Non-finite velocity command, stopping wheels")
                }
                None => info!("Drive commands realized as requested again"),
            }
        }
        self.last_condition = condition;
    }

    /// Send speeds to all four wheels
    ///
    /// If any wheel rejects its speed, every wheel is told to stop before the error is
    /// returned, so the chassis is never left half-commanded.
    pub fn set_wheel_speeds(&mut self, speeds: WheelSpeeds) -> Result<()> {
        debug!(
            "Setting wheel speeds: fl={:.3}, fr={:.3}, bl={:.3}, br={:.3}",
            speeds.front_left, speeds.front_right, speeds.back_left, speeds.back_right
        );

        for wheel in WheelId::ALL {
            if let Err(e) = self.motors[wheel.index()].set_speed(speeds.get(wheel)) {
                warn!("Failed to drive {} wheel: {}, stopping all wheels", wheel.name(), e);
                self.stop_each();
                return Err(e);
            }
        }
        Ok(())
    }

    /// Zero every wheel that still accepts commands
    fn stop_each(&mut self) {
        for wheel in WheelId::ALL {
            if let Err(e) = self.motors[wheel.index()].set_speed(0.0) {
                debug!("Could not stop {} wheel: {}", wheel.name(), e);
            }
        }
    }

    /// Set a single wheel's speed in [-1, 1]
    pub fn set_wheel_speed(&mut self, wheel: WheelId, speed: f32) -> Result<()> {
        self.motors[wheel.index()].set_speed(speed)
    }

    /// Stop all wheels
    pub fn stop(&mut self) -> Result<()> {
        debug!("Stopping all wheels");
        self.set_wheel_speeds(WheelSpeeds::zero())
    }

    /// Stop PWM on every wheel. All channels are attempted; the first failure is returned.
    pub fn cleanup(&mut self) -> Result<()> {
        info!("Releasing wheel PWM channels");
        let mut first_err = None;
        for motor in &mut self.motors {
            if let Err(e) = motor.cleanup() {
                first_err.get_or_insert(e);
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    pub fn motor(&self, wheel: WheelId) -> &Motor<P> {
        &self.motors[wheel.index()]
    }

    pub fn chassis(&self) -> &ChassisConfig {
        &self.chassis
    }

    /// Snapshot of the last commanded speed and duty cycle on each wheel
    pub fn actuation(&self) -> WheelActuation {
        let output = |wheel: WheelId| {
            let motor = self.motor(wheel);
            WheelOutput {
                speed: motor.speed(),
                duty_percent: motor.duty_percent(),
            }
        };

        WheelActuation {
            front_left: output(WheelId::FrontLeft),
            front_right: output(WheelId::FrontRight),
            back_left: output(WheelId::BackLeft),
            back_right: output(WheelId::BackRight),
        }
    }
}

impl<P: PwmChannel> Drop for Rover<P> {
    fn drop(&mut self) {
        // Stop wheels before the motors release their channels
        if self.motors.iter().all(|m| m.is_active()) {
            if let Err(e) = self.stop() {
                warn!("Failed to stop wheels on drop: {}", e);
            }
        }
    }
}
