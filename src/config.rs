// Timeouts, topics, chassis and sensor defaults, plus the CLI that overrides them
use clap::Parser;
use std::time::Duration;

use crate::motor::{ChassisConfig, WheelId, WheelType};
use crate::sensors::SEALEVEL_HPA;

// Runtime loop frequency
pub const LOOP_HZ: u64 = 50;

// Command timeout for watchdog
pub const CMD_TIMEOUT: Duration = Duration::from_millis(250);

// Zenoh topics
pub const TOPIC_CMD_BASE: &str = "rover/cmd/base"; // commands
pub const TOPIC_HW_IMU: &str = "rover/hw/imu"; // raw sensor samples
pub const TOPIC_RT_WHEELS: &str = "rover/rt/wheels"; // actuation
pub const TOPIC_ATTITUDE: &str = "rover/state/attitude"; // fused attitude/altitude
pub const TOPIC_HEALTH: &str = "rover/state/health"; // health status

// Chassis configuration
pub const WHEEL_TO_COG: f32 = crate::motor::kinematics::WHEEL_TO_COG;
pub const WHEEL_TYPE: WheelType = WheelType::Skid;

// PWM pin per wheel: front_left, front_right, back_left, back_right
pub const WHEEL_PINS: [&str; 4] = ["P9_14", "P9_16", "P8_13", "P8_19"];

// Per-wheel direction inversion, same order as WHEEL_PINS
pub const WHEEL_INVERT: [bool; 4] = [false, false, false, false];

/// Four-wheel rover control runtime
#[derive(Debug, Clone, Parser)]
#[command(name = "rover-runtime", version, about)]
pub struct RuntimeArgs {
    /// Control loop rate in Hz
    #[arg(long, default_value_t = LOOP_HZ)]
    pub loop_hz: u64,

    /// Stop the wheels when no command arrives for this many milliseconds
    #[arg(long, default_value_t = CMD_TIMEOUT.as_millis() as u64)]
    pub cmd_timeout_ms: u64,

    /// Drivetrain fitted to the chassis
    #[arg(long, value_enum, default_value_t = WHEEL_TYPE)]
    pub wheel_type: WheelType,

    /// Wheel to center-of-gravity distance (x plus y)
    #[arg(long, default_value_t = WHEEL_TO_COG)]
    pub wheel_to_cog: f32,

    /// Sea level pressure reference in hPa
    #[arg(long, default_value_t = SEALEVEL_HPA)]
    pub sea_level_hpa: f32,

    /// Wheels whose direction is reversed (front_left, front_right, back_left, back_right)
    #[arg(long, value_delimiter = ',')]
    pub invert: Vec<String>,

    #[arg(long, default_value = TOPIC_CMD_BASE)]
    pub topic_cmd: String,

    #[arg(long, default_value = TOPIC_HW_IMU)]
    pub topic_imu: String,

    #[arg(long, default_value = TOPIC_RT_WHEELS)]
    pub topic_wheels: String,

    #[arg(long, default_value = TOPIC_ATTITUDE)]
    pub topic_attitude: String,

    #[arg(long, default_value = TOPIC_HEALTH)]
    pub topic_health: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Loop rate must be between 1 and 1000 Hz, got {0}")]
    LoopRate(u64),

    #[error("wheel_to_cog must be a positive distance, got {0}")]
    WheelToCog(f32),

    #[error("Sea level pressure must be positive, got {0} hPa")]
    SeaLevel(f32),

    #[error("Unknown wheel name '{0}'")]
    UnknownWheel(String),
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub loop_hz: u64,
    pub cmd_timeout: Duration,
    pub chassis: ChassisConfig,
    pub sea_level_hpa: f32,
    pub wheel_invert: [bool; 4],
    pub topic_cmd: String,
    pub topic_imu: String,
    pub topic_wheels: String,
    pub topic_attitude: String,
    pub topic_health: String,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            loop_hz: LOOP_HZ,
            cmd_timeout: CMD_TIMEOUT,
            chassis: ChassisConfig::new(WHEEL_TO_COG, WHEEL_TYPE),
            sea_level_hpa: SEALEVEL_HPA,
            wheel_invert: WHEEL_INVERT,
            topic_cmd: TOPIC_CMD_BASE.to_string(),
            topic_imu: TOPIC_HW_IMU.to_string(),
            topic_wheels: TOPIC_RT_WHEELS.to_string(),
            topic_attitude: TOPIC_ATTITUDE.to_string(),
            topic_health: TOPIC_HEALTH.to_string(),
        }
    }
}

impl RuntimeConfig {
    pub fn tick_period(&self) -> Duration {
        Duration::from_millis(1000 / self.loop_hz)
    }
}

impl TryFrom<RuntimeArgs> for RuntimeConfig {
    type Error = ConfigError;

    fn try_from(args: RuntimeArgs) -> Result<Self, Self::Error> {
        if !(1..=1000).contains(&args.loop_hz) {
            return Err(ConfigError::LoopRate(args.loop_hz));
        }
        if !(args.wheel_to_cog > 0.0 && args.wheel_to_cog.is_finite()) {
            return Err(ConfigError::WheelToCog(args.wheel_to_cog));
        }
        if !(args.sea_level_hpa > 0.0 && args.sea_level_hpa.is_finite()) {
            return Err(ConfigError::SeaLevel(args.sea_level_hpa));
        }

        let mut wheel_invert = WHEEL_INVERT;
        for name in &args.invert {
            let wheel = WheelId::ALL
                .into_iter()
                .find(|w| w.name() == name.as_str())
                .ok_or_else(|| ConfigError::UnknownWheel(name.clone()))?;
            wheel_invert[wheel.index()] = true;
        }

        Ok(Self {
            loop_hz: args.loop_hz,
            cmd_timeout: Duration::from_millis(args.cmd_timeout_ms),
            chassis: ChassisConfig::new(args.wheel_to_cog, args.wheel_type),
            sea_level_hpa: args.sea_level_hpa,
            wheel_invert,
            topic_cmd: args.topic_cmd,
            topic_imu: args.topic_imu,
            topic_wheels: args.topic_wheels,
            topic_attitude: args.topic_attitude,
            topic_health: args.topic_health,
        })
    }
}
