// 50Hz PWM motor control for speed controllers / continuous servos
//
// A normalized speed in [-1, 1] maps linearly onto a 5-10% duty cycle
// (1-2ms pulse in a 20ms period), with 7.5% as stop.

use tracing::{debug, warn};

/// PWM frequency in Hz
pub const PWM_FREQ_HZ: f32 = 50.0;
/// Minimum pulse width as percent of the period (full reverse)
pub const DUTY_MIN: f32 = 5.0;
/// Maximum pulse width as percent of the period (full forward)
pub const DUTY_MAX: f32 = 10.0;
/// Motor stops at this duty cycle
pub const DUTY_ZERO: f32 = 7.5;

/// Error types for PWM actuation
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActuatorError {
    #[error("Invalid duty cycle {0}% (must be within 0-100)")]
    InvalidDutyCycle(f32),

    #[error("Invalid PWM frequency {0} Hz")]
    InvalidFrequency(f32),

    #[error("PWM channel {channel} is not running")]
    NotRunning { channel: String },
}

pub type Result<T> = std::result::Result<T, ActuatorError>;

/// Duty cycle (percent of the period) for a speed between -1 (full backwards)
/// and 1 (full forwards). Out of range speeds are clamped.
pub fn speed_to_duty_cycle(speed: f32) -> f32 {
    let speed = speed.clamp(-1.0, 1.0);
    (speed + 1.0) / 2.0 * (DUTY_MAX - DUTY_MIN) + DUTY_MIN
}

/// A single PWM output owned by one motor
pub trait PwmChannel {
    /// Start generating PWM at the given duty cycle (percent) and frequency
    fn start(&mut self, duty_percent: f32, frequency_hz: f32) -> Result<()>;

    /// Change the duty cycle of a running channel
    fn set_duty_cycle(&mut self, duty_percent: f32) -> Result<()>;

    /// Stop the output and release the channel
    fn stop(&mut self) -> Result<()>;
}

fn check_duty(duty_percent: f32) -> Result<()> {
    if !(0.0..=100.0).contains(&duty_percent) {
        return Err(ActuatorError::InvalidDutyCycle(duty_percent));
    }
    Ok(())
}

/// PWM channel without hardware behind it.
///
/// The duty cycle is latched so it can be forwarded elsewhere (the runtime publishes
/// it to the hardware process) or inspected in tests.
#[derive(Debug, Clone)]
pub struct VirtualPwm {
    name: String,
    duty_percent: f32,
    frequency_hz: f32,
    running: bool,
}

impl VirtualPwm {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duty_percent: 0.0,
            frequency_hz: 0.0,
            running: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duty_percent(&self) -> f32 {
        self.duty_percent
    }

    pub fn frequency_hz(&self) -> f32 {
        self.frequency_hz
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl PwmChannel for VirtualPwm {
    fn start(&mut self, duty_percent: f32, frequency_hz: f32) -> Result<()> {
        check_duty(duty_percent)?;
        if !(frequency_hz > 0.0 && frequency_hz.is_finite()) {
            return Err(ActuatorError::InvalidFrequency(frequency_hz));
        }
        self.duty_percent = duty_percent;
        self.frequency_hz = frequency_hz;
        self.running = true;
        Ok(())
    }

    fn set_duty_cycle(&mut self, duty_percent: f32) -> Result<()> {
        if !self.running {
            return Err(ActuatorError::NotRunning {
                channel: self.name.clone(),
            });
        }
        check_duty(duty_percent)?;
        self.duty_percent = duty_percent;
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.running = false;
        self.duty_percent = 0.0;
        Ok(())
    }
}

/// One wheel motor on its own PWM channel.
///
/// The channel is started at the stop duty cycle on construction and stopped by
/// `cleanup()` or when the motor is dropped.
#[derive(Debug)]
pub struct Motor<P: PwmChannel> {
    pwm: P,
    invert: bool,
    speed: f32,
    duty_percent: f32,
    active: bool,
}

impl<P: PwmChannel> Motor<P> {
    pub fn new(mut pwm: P, invert: bool) -> Result<Self> {
        pwm.start(DUTY_ZERO, PWM_FREQ_HZ)?;
        Ok(Self {
            pwm,
            invert,
            speed: 0.0,
            duty_percent: DUTY_ZERO,
            active: true,
        })
    }

    /// Set speed from -1.0 (full backwards) through 0 (stop) to 1.0 (full forwards)
    pub fn set_speed(&mut self, speed: f32) -> Result<()> {
        let speed = speed.clamp(-1.0, 1.0);
        let output = if self.invert { -speed } else { speed };
        let duty = speed_to_duty_cycle(output);

        self.pwm.set_duty_cycle(duty)?;
        self.speed = speed;
        self.duty_percent = duty;
        Ok(())
    }

    /// Last commanded speed (before inversion)
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Last duty cycle written to the channel, 0 once the channel is stopped
    pub fn duty_percent(&self) -> f32 {
        self.duty_percent
    }

    pub fn is_inverted(&self) -> bool {
        self.invert
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    /// Stop PWM on this motor's channel. Safe to call more than once.
    pub fn cleanup(&mut self) -> Result<()> {
        if self.active {
            self.pwm.stop()?;
            self.active = false;
            self.speed = 0.0;
            self.duty_percent = 0.0;
            debug!("PWM channel stopped");
        }
        Ok(())
    }
}

impl<P: PwmChannel> Drop for Motor<P> {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            warn!("Failed to stop PWM channel on drop: {}", e);
        }
    }
}
