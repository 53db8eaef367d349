// Fixed-rate control loop with watchdog
// Note: the watchdog stops the wheels when commands stop arriving, e.g. if teleop crashes
// Each tick: drain commands and IMU samples, drive the wheels, publish actuation,
// attitude and health.

use std::time::{Duration, Instant};
use tokio::time::interval;
use tracing::{debug, error, info, warn};

// local imports
use crate::config::{RuntimeConfig, WHEEL_PINS};
use crate::messages::{AttitudeTelemetry, BaseCommand, ImuSample, RuntimeHealth, WheelActuation};
use crate::motor::{ActuatorError, PwmChannel, Rover, VelocityCommand, VirtualPwm};
use crate::sensors::{EstimateError, LatestSample, OrientationEstimator};

pub struct Runtime<P: PwmChannel> {
    rover: Rover<P>,
    estimator: OrientationEstimator,
    sensors: LatestSample,
    latest_cmd: Option<BaseCommand>,
    cmd_received_at: Instant,
    cmd_timeout: Duration,
    health: RuntimeHealth,
    estimate_conditions: Vec<EstimateError>,
}

impl<P: PwmChannel> Runtime<P> {
    pub fn new(rover: Rover<P>, estimator: OrientationEstimator, cmd_timeout: Duration) -> Self {
        Self {
            rover,
            estimator,
            sensors: LatestSample::new(),
            latest_cmd: None,
            cmd_received_at: Instant::now(),
            cmd_timeout,
            health: RuntimeHealth::CmdStale, // Start stale until first cmd
            estimate_conditions: Vec::new(),
        }
    }

    pub fn health(&self) -> RuntimeHealth {
        self.health
    }

    pub fn rover(&self) -> &Rover<P> {
        &self.rover
    }

    /// Process incoming command
    pub fn on_command(&mut self, cmd: BaseCommand) {
        debug!("Received command: {:?}", &cmd);
        self.latest_cmd = Some(cmd);
        self.cmd_received_at = Instant::now();
    }

    /// Keep the newest sensor sample
    pub fn on_imu_sample(&mut self, sample: ImuSample) {
        self.sensors.update(sample);
    }

    fn set_health(&mut self, health: RuntimeHealth) {
        if health != self.health {
            info!("Health: {:?} -> {:?}", self.health, health);
        }
        self.health = health;
    }

    /// Drive the wheels from the latest command, or stop them if the watchdog fired
    pub fn compute_actuation(&mut self) -> Result<WheelActuation, ActuatorError> {
        let cmd_age = self.cmd_received_at.elapsed();

        if cmd_age > self.cmd_timeout || self.latest_cmd.is_none() {
            // Watchdog triggered (or no command ever received) - stop the robot
            if self.health != RuntimeHealth::CmdStale && self.latest_cmd.is_some() {
                warn!("Command stale ({:?} old), stopping robot", cmd_age);
            }
            self.rover.stop()?;
            self.set_health(RuntimeHealth::CmdStale);
        } else if let Some(ref cmd) = self.latest_cmd {
            let out = self.rover.set_velocities(VelocityCommand::from(cmd))?;
            let health = if out.condition.is_some() {
                RuntimeHealth::Degraded
            } else {
                RuntimeHealth::Ok
            };
            self.set_health(health);
        }

        Ok(self.rover.actuation())
    }

    /// Derive attitude and altitude from the latest sensor sample.
    ///
    /// Parts the sample can't support are left out; `None` only when there is no
    /// sample or nothing could be derived from it.
    pub fn estimate_attitude(&mut self) -> Option<AttitudeTelemetry> {
        if !self.sensors.has_sample() {
            return None;
        }

        let est = self.estimator.estimate(&mut self.sensors);
        if est.conditions != self.estimate_conditions {
            if est.conditions.is_empty() {
                info!("Attitude estimate recovered");
            }
            for condition in &est.conditions {
                warn!("Attitude estimate incomplete: {}", condition);
            }
            self.estimate_conditions = est.conditions.clone();
        }

        if est.is_empty() {
            None
        } else {
            Some(AttitudeTelemetry::from(&est))
        }
    }

    /// Stop the wheels and release their PWM channels
    pub fn shutdown(&mut self) -> Result<WheelActuation, ActuatorError> {
        self.rover.stop()?;
        let last = self.rover.actuation();
        self.rover.cleanup()?;
        Ok(last)
    }
}

pub async fn run(config: RuntimeConfig) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    info!("Opening Zenoh session...");
    let session = zenoh::open(zenoh::Config::default()).await?;

    info!("Setting up publishers and subscribers...");
    let sub_cmd = session.declare_subscriber(config.topic_cmd.as_str()).await?;
    let sub_imu = session.declare_subscriber(config.topic_imu.as_str()).await?;
    let pub_wheels = session.declare_publisher(config.topic_wheels.clone()).await?;
    let pub_attitude = session.declare_publisher(config.topic_attitude.clone()).await?;
    let pub_health = session.declare_publisher(config.topic_health.clone()).await?;

    // Duty cycles are latched here and forwarded to the hardware process
    let channels = WHEEL_PINS.map(|pin| VirtualPwm::new(pin));
    let rover = Rover::with_channels(config.chassis, channels, config.wheel_invert)?;
    let estimator = OrientationEstimator::with_sea_level(config.sea_level_hpa);
    let mut runtime = Runtime::new(rover, estimator, config.cmd_timeout);
    let mut tick = interval(config.tick_period());

    info!(
        "Runtime started: {}Hz loop, {}ms watchdog timeout",
        config.loop_hz,
        config.cmd_timeout.as_millis()
    );
    info!("Subscribed to: {}, {}", config.topic_cmd, config.topic_imu);
    info!(
        "Publishing to: {}, {}, {}",
        config.topic_wheels, config.topic_attitude, config.topic_health
    );

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = tick.tick() => {}
            _ = &mut ctrl_c => {
                info!("Ctrl+C received, shutting down");
                break;
            }
        }

        // 1. Drain all pending commands (non-blocking), keep latest
        while let Ok(Some(sample)) = sub_cmd.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<BaseCommand>(&payload) {
                Ok(cmd) => runtime.on_command(cmd),
                Err(e) => warn!("Failed to parse command: {}", e),
            }
        }

        // 2. Same for sensor samples
        while let Ok(Some(sample)) = sub_imu.try_recv() {
            let payload = sample.payload().to_bytes();
            match serde_json::from_slice::<ImuSample>(&payload) {
                Ok(imu) => runtime.on_imu_sample(imu),
                Err(e) => warn!("Failed to parse IMU sample: {}", e),
            }
        }

        // 3. Compute and publish actuation (includes watchdog logic)
        let actuation = match runtime.compute_actuation() {
            Ok(actuation) => actuation,
            Err(e) => {
                // The rover already zeroed what it could, tell the hardware process too
                error!("Actuation failed: {}, sending stop", e);
                pub_wheels
                    .put(serde_json::to_string(&WheelActuation::stopped())?)
                    .await?;
                return Err(e.into());
            }
        };
        pub_wheels.put(serde_json::to_string(&actuation)?).await?;

        // 4. Publish attitude when the latest sample is usable
        if let Some(telemetry) = runtime.estimate_attitude() {
            pub_attitude.put(serde_json::to_string(&telemetry)?).await?;
        }

        // 5. Publish health
        pub_health.put(serde_json::to_string(&runtime.health())?).await?;
    }

    // Leave the hardware process with a stop command before releasing the channels
    let last = runtime.shutdown()?;
    pub_wheels.put(serde_json::to_string(&last)?).await?;
    info!("Runtime stopped");
    Ok(())
}
